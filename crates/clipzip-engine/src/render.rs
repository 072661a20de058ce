//! Turning service payloads into host primitives.

use clipzip_client::Feature;
use clipzip_types::{Collection, Crs};
use tracing::warn;

use crate::constants::DEFAULT_DATA_CRS;
use crate::map::{DrawStyle, MapHost, MapResult, RasterEntry, RasterLayerConfig, Shape};

/// Colors for a rendering: `base` for whole geometries, `clip` for the part
/// inside the drawn area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub base: &'static str,
    pub clip: &'static str,
}

pub const FEATURE_PALETTE: Palette = Palette { base: "blue", clip: "green" };
pub const FOOTPRINT_PALETTE: Palette = Palette { base: "red", clip: "red" };

impl Palette {
    fn line(&self) -> DrawStyle {
        DrawStyle::stroke(self.base, 0.5, 1.0)
    }

    fn polygon(&self) -> DrawStyle {
        DrawStyle::filled(self.base, 1.0, 0.05)
    }

    fn clipped_line(&self) -> DrawStyle {
        DrawStyle::stroke(self.clip, 1.0, 1.5)
    }

    fn clipped_polygon(&self) -> DrawStyle {
        DrawStyle::filled(self.clip, 1.5, 0.3)
    }
}

/// Draw service features into `group`. Returns how many were drawn.
///
/// A feature whose geometry the host cannot read is skipped.
pub async fn draw_features<M: MapHost>(
    host: &M,
    group: &str,
    features: &[Feature],
    crs: Crs,
    palette: Palette,
) -> MapResult<usize> {
    let mut drawn = 0;
    for feature in features {
        let geometry = match host.from_geojson(&feature.geometry) {
            Ok(g) => g,
            Err(err) => {
                warn!(group, %err, "skipping unreadable feature geometry");
                continue;
            }
        };
        draw_shapes(host, group, &host.shapes(&geometry)?, crs, &palette.line(), &palette.polygon(), true).await?;

        if let Some(clipped) = &feature.geometry_clipped {
            match host.from_geojson(clipped) {
                Ok(g) => {
                    let shapes = host.shapes(&g)?;
                    draw_shapes(host, group, &shapes, crs, &palette.clipped_line(), &palette.clipped_polygon(), false)
                        .await?;
                }
                Err(err) => warn!(group, %err, "skipping unreadable clipped geometry"),
            }
        }
        drawn += 1;
    }
    Ok(drawn)
}

/// Draw a collection footprint given as WKT.
pub async fn draw_footprint<M: MapHost>(host: &M, group: &str, wkt: &str, crs: Crs) -> MapResult<()> {
    let geometry = host.from_wkt(wkt)?;
    let palette = FOOTPRINT_PALETTE;
    draw_shapes(host, group, &host.shapes(&geometry)?, crs, &palette.line(), &palette.polygon(), true).await
}

async fn draw_shapes<M: MapHost>(
    host: &M,
    group: &str,
    shapes: &[Shape],
    crs: Crs,
    line: &DrawStyle,
    polygon: &DrawStyle,
    markers: bool,
) -> MapResult<()> {
    for shape in shapes {
        match shape {
            Shape::Polyline(coords) => host.add_polyline(group, coords, crs, line).await?,
            Shape::Polygon(rings) => host.add_polygon(group, rings, crs, polygon).await?,
            Shape::Marker(coord) if markers => host.add_marker(group, *coord, crs).await?,
            Shape::Marker(_) => {}
        }
    }
    Ok(())
}

/// Raster layer for a coverage collection.
pub fn raster_config(collection: &Collection, service_root: &str) -> RasterLayerConfig {
    let data_crs = collection.native_crs().unwrap_or(DEFAULT_DATA_CRS);
    RasterLayerConfig {
        layer_id: collection.id.to_string(),
        name: collection.title.clone(),
        metadata_access_path: format!("{service_root}{}/{}", collection.org_schema, collection.parent_id),
        entries: vec![RasterEntry {
            layer_id: collection.short_name.clone(),
            layer_name: collection.title.clone(),
            data_projection: data_crs.epsg(),
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipzip_types::ItemType;

    #[test]
    fn test_raster_config() {
        let mut c = Collection::new("cdem_mpi__cdem", ItemType::Coverage, "Elevation");
        c.org_schema = "nrcan".into();
        c.parent_id = "cdem_mpi".into();
        c.short_name = "cdem".into();
        c.crs_list = vec![Crs(3979)];

        let config = raster_config(&c, "https://qgis.test/");
        assert_eq!(config.layer_id, "cdem_mpi__cdem");
        assert_eq!(config.metadata_access_path, "https://qgis.test/nrcan/cdem_mpi");
        assert_eq!(config.entries[0].layer_id, "cdem");
        assert_eq!(config.entries[0].data_projection, "EPSG:3979");
    }

    #[test]
    fn test_raster_default_projection() {
        let c = Collection::new("x", ItemType::Coverage, "X");
        assert_eq!(raster_config(&c, "").entries[0].data_projection, "EPSG:4326");
    }
}
