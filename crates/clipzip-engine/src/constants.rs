//! Engine constants.
//!
//! Values that are not worth a config knob live here; the tunable ones are
//! the defaults of [`crate::EngineConfig`].

use std::time::Duration;

use clipzip_types::Crs;

use crate::map::Extent;

/// Vector group holding the user's drawing.
pub const DRAWING_GROUP_ID: &str = "czs_geoms";

// ============================================================================
// Stacking
// ============================================================================

/// Z-index of feature and footprint groups.
pub const Z_INDEX_VECTORS: i32 = 101;

/// Z-index of raster layers, just under the vectors.
pub const Z_INDEX_RASTERS: i32 = 100;

/// Z-index of the drawing group, above everything.
pub const Z_INDEX_DRAWING: i32 = 1000;

// ============================================================================
// Projections
// ============================================================================

/// CRS collection footprints are published in.
pub const FOOTPRINT_CRS: Crs = Crs::NAD83_CSRS;

/// Data projection assumed for rasters that declare no CRS.
pub const DEFAULT_DATA_CRS: Crs = Crs::WGS84;

/// CRS of [`MAP_LIMITS`].
pub const MAP_LIMITS_CRS: Crs = Crs::CANADA_ATLAS_LAMBERT;

/// Basemap coverage. Zooming past it shows an empty map.
pub const MAP_LIMITS: Extent = Extent {
    min_x: -2_750_565.0,
    min_y: -936_657.0,
    max_x: 3_583_872.0,
    max_y: 4_659_267.0,
};

// ============================================================================
// Timing defaults
// ============================================================================

/// Interval between job status queries.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Interval between raster readiness checks.
pub const LAYER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How long a raster layer may take to appear before giving up.
pub const LAYER_READY_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Padding (pixels, every side) when zooming to a drawing or a collection.
pub const ZOOM_PADDING: f64 = 100.0;

pub const ZOOM_DURATION: Duration = Duration::from_millis(1000);

/// Square metres per square kilometre.
pub const M2_PER_KM2: f64 = 1_000_000.0;

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_CAPACITY: usize = 256;

/// Root of the raster (WMS) service. A collection's layer lives at
/// `<root><org_schema>/<parent>`.
pub const RASTER_SERVICE_ROOT: &str = "https://qgis-stage.services.geo.ca/dev/";
