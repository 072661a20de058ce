//! Map host capabilities.
//!
//! The engine never renders anything itself. Everything it shows goes
//! through a [`MapHost`]: vector groups for features and footprints, raster
//! layers for coverages, plus the geometry conversions it needs to talk to
//! the service (WKT out, GeoJSON/WKT in, areas, reprojection).
//!
//! Geometry math is synchronous; anything that touches the rendered map is
//! async because hosts typically apply it on their own render loop.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use clipzip_types::Crs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

pub type MapResult<T> = Result<T, MapError>;

/// A position in whatever CRS the call names.
pub type Coord = [f64; 2];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MapError {
    #[error("geometry error: {0}")]
    Geometry(String),
    #[error("no vector group {0:?}")]
    UnknownGroup(String),
    #[error("no layer {0:?}")]
    UnknownLayer(String),
    #[error("layer {id:?} not ready after {waited:?}")]
    LayerTimeout { id: String, waited: Duration },
    #[error("map host error: {0}")]
    Host(String),
}

// ============================================================================
// Value types
// ============================================================================

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// True when any side of `self` crosses outside `limits`.
    pub fn exceeds(&self, limits: &Extent) -> bool {
        self.min_x < limits.min_x
            || self.min_y < limits.min_y
            || self.max_x > limits.max_x
            || self.max_y > limits.max_y
    }
}

/// How [`MapHost::zoom_to_extent`] animates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomOptions {
    /// Pixels kept free on each side (top, right, bottom, left).
    pub padding: [f64; 4],
    pub duration: Duration,
}

impl ZoomOptions {
    pub fn uniform(padding: f64, duration: Duration) -> Self {
        Self {
            padding: [padding; 4],
            duration,
        }
    }
}

/// Primitive the host can draw. Multi-geometries decompose into several.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Polyline(Vec<Coord>),
    /// Outer ring first, then holes.
    Polygon(Vec<Vec<Coord>>),
    Marker(Coord),
}

/// Stroke and fill for vector primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawStyle {
    pub stroke_color: String,
    pub stroke_opacity: f64,
    pub stroke_width: f64,
    pub fill_color: Option<String>,
    pub fill_opacity: f64,
}

impl DrawStyle {
    pub fn stroke(color: &str, opacity: f64, width: f64) -> Self {
        Self {
            stroke_color: color.to_string(),
            stroke_opacity: opacity,
            stroke_width: width,
            fill_color: None,
            fill_opacity: 0.0,
        }
    }

    pub fn filled(color: &str, width: f64, fill_opacity: f64) -> Self {
        Self {
            fill_color: Some(color.to_string()),
            fill_opacity,
            ..Self::stroke(color, 1.0, width)
        }
    }
}

/// One sub-layer of a raster service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterEntry {
    pub layer_id: String,
    pub layer_name: String,
    /// `EPSG:<code>` of the source data.
    pub data_projection: String,
}

/// What the host needs to add a raster (WMS) layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RasterLayerConfig {
    /// Host-side layer id; the collection id.
    pub layer_id: String,
    pub name: String,
    pub metadata_access_path: String,
    pub entries: Vec<RasterEntry>,
}

/// Interaction started by [`MapHost::start_drawing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DrawKind {
    Polygon,
}

// ============================================================================
// MapHost
// ============================================================================

/// Rendering and geometry capabilities the engine relies on.
#[async_trait]
pub trait MapHost: Send + Sync + 'static {
    /// Host-native geometry.
    type Geometry: Clone + fmt::Debug + Send + Sync + 'static;
    /// Handle to a live raster layer.
    type Layer: Send + Sync + 'static;

    /// Projection the map is displayed in.
    fn map_crs(&self) -> Crs;

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    fn to_wkt(&self, geometry: &Self::Geometry) -> MapResult<String>;

    fn from_wkt(&self, wkt: &str) -> MapResult<Self::Geometry>;

    fn from_geojson(&self, geojson: &serde_json::Value) -> MapResult<Self::Geometry>;

    /// Decompose into drawable primitives.
    fn shapes(&self, geometry: &Self::Geometry) -> MapResult<Vec<Shape>>;

    fn area_square_meters(&self, geometry: &Self::Geometry, crs: Crs) -> MapResult<f64>;

    fn reproject(&self, geometry: &Self::Geometry, from: Crs, to: Crs) -> MapResult<Self::Geometry>;

    fn extent(&self, geometry: &Self::Geometry) -> Extent;

    fn reproject_extent(&self, extent: Extent, from: Crs, to: Crs) -> MapResult<Extent>;

    // ------------------------------------------------------------------------
    // View and interactions
    // ------------------------------------------------------------------------

    async fn zoom_to_extent(&self, extent: Extent, options: ZoomOptions) -> MapResult<()>;

    /// Start a draw interaction whose output lands in `group`.
    async fn start_drawing(&self, group: &str, kind: DrawKind) -> MapResult<()>;

    /// Stop the draw interaction if one is running.
    async fn stop_drawing(&self) -> MapResult<()>;

    // ------------------------------------------------------------------------
    // Vector groups
    // ------------------------------------------------------------------------

    async fn create_vector_group(&self, id: &str) -> MapResult<()>;

    async fn delete_vector_group(&self, id: &str) -> MapResult<()>;

    fn has_vector_group(&self, id: &str) -> bool;

    async fn set_active_vector_group(&self, id: &str) -> MapResult<()>;

    /// Remove every geometry from a group, keeping the group.
    async fn clear_vector_group(&self, id: &str) -> MapResult<()>;

    async fn group_z_index(&self, id: &str) -> MapResult<i32>;

    async fn set_group_z_index(&self, id: &str, z: i32) -> MapResult<()>;

    async fn add_polyline(&self, group: &str, coords: &[Coord], crs: Crs, style: &DrawStyle) -> MapResult<()>;

    async fn add_polygon(&self, group: &str, rings: &[Vec<Coord>], crs: Crs, style: &DrawStyle) -> MapResult<()>;

    async fn add_marker(&self, group: &str, coord: Coord, crs: Crs) -> MapResult<()>;

    // ------------------------------------------------------------------------
    // Raster layers
    // ------------------------------------------------------------------------

    async fn add_or_update_raster_layer(&self, config: &RasterLayerConfig) -> MapResult<()>;

    async fn remove_raster_layer(&self, config: &RasterLayerConfig) -> MapResult<()>;

    /// Look a layer up without waiting. With `must_be_loaded`, a layer that
    /// exists but has not finished loading counts as absent.
    async fn find_layer(&self, id: &str, must_be_loaded: bool) -> MapResult<Option<Self::Layer>>;

    /// Restrict a layer to `extent`, or lift the restriction with `None`.
    async fn set_layer_extent(&self, layer: &Self::Layer, extent: Option<Extent>) -> MapResult<()>;

    async fn layer_z_index(&self, layer: &Self::Layer) -> MapResult<i32>;

    async fn set_layer_z_index(&self, layer: &Self::Layer, z: i32) -> MapResult<()>;

    /// Poll [`MapHost::find_layer`] until the layer shows up.
    async fn layer_when_ready(
        &self,
        id: &str,
        must_be_loaded: bool,
        poll_interval: Duration,
        timeout: Duration,
    ) -> MapResult<Self::Layer> {
        let started = Instant::now();
        loop {
            if let Some(layer) = self.find_layer(id, must_be_loaded).await? {
                return Ok(layer);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(MapError::LayerTimeout {
                    id: id.to_string(),
                    waited,
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
