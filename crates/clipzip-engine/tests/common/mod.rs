//! In-memory map host and catalog service for engine tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clipzip_client::{
    CatalogService, ClipArea, ExtractionInputs, Feature, FeaturePage, JobResult, JobStatus,
    JobStatusKind, ServiceError, ServiceResult,
};
use clipzip_engine::{
    Coord, Delay, DrawKind, DrawStyle, Engine, EngineConfig, Extent, MapError, MapHost, MapResult,
    RasterLayerConfig, Shape, ZoomOptions,
};
use clipzip_types::{Collection, Crs, ItemType, JobId};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

pub const MAP_CRS: Crs = Crs::CANADA_ATLAS_LAMBERT;

// ============================================================================
// Geometry
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum FakeGeom {
    /// A drawn area with a known size.
    Area { wkt: String, area_m2: f64, extent: Extent },
    /// Parsed from WKT.
    Wkt(String),
    /// Parsed from GeoJSON.
    Json(Value),
}

/// A drawn area of `area_km2` square kilometres, identified by `wkt`.
pub fn area(wkt: &str, area_km2: f64) -> FakeGeom {
    FakeGeom::Area {
        wkt: wkt.to_string(),
        area_m2: area_km2 * 1_000_000.0,
        extent: Extent::new(0.0, 0.0, 10.0, 10.0),
    }
}

// ============================================================================
// Map host
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct Group {
    pub z: i32,
    pub polylines: Vec<String>,
    pub polygons: Vec<String>,
    pub markers: usize,
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub config: RasterLayerConfig,
    pub z: i32,
    pub extent: Option<Extent>,
    pub pending_polls: u32,
}

#[derive(Debug, Default)]
pub struct HostState {
    pub groups: HashMap<String, Group>,
    pub active_group: Option<String>,
    pub layers: HashMap<String, Layer>,
    pub raster_adds: usize,
    pub drawing: Option<String>,
    pub zooms: Vec<Extent>,
    /// Readiness polls a newly added layer needs before it shows up.
    pub ready_after_polls: u32,
    pub footprint_extents: HashMap<String, Extent>,
    pub fail_z_index: bool,
}

#[derive(Debug, Default)]
pub struct FakeHost {
    pub state: Mutex<HostState>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn group(&self, id: &str) -> Option<Group> {
        self.state.lock().groups.get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<Layer> {
        self.state.lock().layers.get(id).cloned()
    }

    pub fn raster_adds(&self) -> usize {
        self.state.lock().raster_adds
    }
}

fn coords(v: &Value) -> Vec<Coord> {
    v.as_array()
        .map(|pts| {
            pts.iter()
                .filter_map(|p| Some([p.get(0)?.as_f64()?, p.get(1)?.as_f64()?]))
                .collect()
        })
        .unwrap_or_default()
}

fn rings(v: &Value) -> Vec<Vec<Coord>> {
    v.as_array().map(|rs| rs.iter().map(coords).collect()).unwrap_or_default()
}

fn box_ring(e: &Extent) -> Vec<Coord> {
    vec![
        [e.min_x, e.min_y],
        [e.max_x, e.min_y],
        [e.max_x, e.max_y],
        [e.min_x, e.min_y],
    ]
}

#[async_trait]
impl MapHost for FakeHost {
    type Geometry = FakeGeom;
    type Layer = String;

    fn map_crs(&self) -> Crs {
        MAP_CRS
    }

    fn to_wkt(&self, geometry: &FakeGeom) -> MapResult<String> {
        match geometry {
            FakeGeom::Area { wkt, .. } | FakeGeom::Wkt(wkt) => Ok(wkt.clone()),
            FakeGeom::Json(_) => Err(MapError::Geometry("json has no wkt".into())),
        }
    }

    fn from_wkt(&self, wkt: &str) -> MapResult<FakeGeom> {
        if wkt.is_empty() {
            return Err(MapError::Geometry("empty wkt".into()));
        }
        Ok(FakeGeom::Wkt(wkt.to_string()))
    }

    fn from_geojson(&self, geojson: &Value) -> MapResult<FakeGeom> {
        if geojson.get("type").is_none() {
            return Err(MapError::Geometry("not geojson".into()));
        }
        Ok(FakeGeom::Json(geojson.clone()))
    }

    fn shapes(&self, geometry: &FakeGeom) -> MapResult<Vec<Shape>> {
        match geometry {
            FakeGeom::Area { extent, .. } => Ok(vec![Shape::Polygon(vec![box_ring(extent)])]),
            FakeGeom::Wkt(wkt) => Ok(vec![Shape::Polygon(vec![box_ring(&self.extent(&FakeGeom::Wkt(wkt.clone())))])]),
            FakeGeom::Json(v) => {
                let c = &v["coordinates"];
                match v["type"].as_str() {
                    Some("Point") => Ok(vec![Shape::Marker(coords(&json!([c]))[0])]),
                    Some("LineString") => Ok(vec![Shape::Polyline(coords(c))]),
                    Some("MultiLineString") => Ok(c
                        .as_array()
                        .map(|ls| ls.iter().map(|l| Shape::Polyline(coords(l))).collect())
                        .unwrap_or_default()),
                    Some("Polygon") => Ok(vec![Shape::Polygon(rings(c))]),
                    Some("MultiPolygon") => Ok(c
                        .as_array()
                        .map(|ps| ps.iter().map(|p| Shape::Polygon(rings(p))).collect())
                        .unwrap_or_default()),
                    other => Err(MapError::Geometry(format!("unsupported {other:?}"))),
                }
            }
        }
    }

    fn area_square_meters(&self, geometry: &FakeGeom, _crs: Crs) -> MapResult<f64> {
        match geometry {
            FakeGeom::Area { area_m2, .. } => Ok(*area_m2),
            _ => Ok(0.0),
        }
    }

    fn reproject(&self, geometry: &FakeGeom, _from: Crs, _to: Crs) -> MapResult<FakeGeom> {
        Ok(geometry.clone())
    }

    fn extent(&self, geometry: &FakeGeom) -> Extent {
        match geometry {
            FakeGeom::Area { extent, .. } => *extent,
            FakeGeom::Wkt(wkt) => self
                .state
                .lock()
                .footprint_extents
                .get(wkt)
                .copied()
                .unwrap_or_else(|| Extent::new(0.0, 0.0, 1.0, 1.0)),
            FakeGeom::Json(_) => Extent::default(),
        }
    }

    fn reproject_extent(&self, extent: Extent, _from: Crs, _to: Crs) -> MapResult<Extent> {
        Ok(extent)
    }

    async fn zoom_to_extent(&self, extent: Extent, _options: ZoomOptions) -> MapResult<()> {
        self.state.lock().zooms.push(extent);
        Ok(())
    }

    async fn start_drawing(&self, group: &str, _kind: DrawKind) -> MapResult<()> {
        self.state.lock().drawing = Some(group.to_string());
        Ok(())
    }

    async fn stop_drawing(&self) -> MapResult<()> {
        self.state.lock().drawing = None;
        Ok(())
    }

    async fn create_vector_group(&self, id: &str) -> MapResult<()> {
        self.state.lock().groups.entry(id.to_string()).or_default();
        Ok(())
    }

    async fn delete_vector_group(&self, id: &str) -> MapResult<()> {
        let mut state = self.state.lock();
        if state.active_group.as_deref() == Some(id) {
            state.active_group = None;
        }
        state
            .groups
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| MapError::UnknownGroup(id.to_string()))
    }

    fn has_vector_group(&self, id: &str) -> bool {
        self.state.lock().groups.contains_key(id)
    }

    async fn set_active_vector_group(&self, id: &str) -> MapResult<()> {
        self.state.lock().active_group = Some(id.to_string());
        Ok(())
    }

    async fn clear_vector_group(&self, id: &str) -> MapResult<()> {
        if let Some(group) = self.state.lock().groups.get_mut(id) {
            group.polylines.clear();
            group.polygons.clear();
            group.markers = 0;
        }
        Ok(())
    }

    async fn group_z_index(&self, id: &str) -> MapResult<i32> {
        let state = self.state.lock();
        state
            .groups
            .get(id)
            .map(|g| g.z)
            .ok_or_else(|| MapError::UnknownGroup(id.to_string()))
    }

    async fn set_group_z_index(&self, id: &str, z: i32) -> MapResult<()> {
        let mut state = self.state.lock();
        if state.fail_z_index {
            return Err(MapError::Host("z-index refused".into()));
        }
        let group = state
            .groups
            .get_mut(id)
            .ok_or_else(|| MapError::UnknownGroup(id.to_string()))?;
        group.z = z;
        Ok(())
    }

    async fn add_polyline(&self, group: &str, _coords: &[Coord], _crs: Crs, style: &DrawStyle) -> MapResult<()> {
        let mut state = self.state.lock();
        let g = state
            .groups
            .get_mut(group)
            .ok_or_else(|| MapError::UnknownGroup(group.to_string()))?;
        g.polylines.push(style.stroke_color.clone());
        Ok(())
    }

    async fn add_polygon(&self, group: &str, _rings: &[Vec<Coord>], _crs: Crs, style: &DrawStyle) -> MapResult<()> {
        let mut state = self.state.lock();
        let g = state
            .groups
            .get_mut(group)
            .ok_or_else(|| MapError::UnknownGroup(group.to_string()))?;
        g.polygons.push(style.stroke_color.clone());
        Ok(())
    }

    async fn add_marker(&self, group: &str, _coord: Coord, _crs: Crs) -> MapResult<()> {
        let mut state = self.state.lock();
        let g = state
            .groups
            .get_mut(group)
            .ok_or_else(|| MapError::UnknownGroup(group.to_string()))?;
        g.markers += 1;
        Ok(())
    }

    async fn add_or_update_raster_layer(&self, config: &RasterLayerConfig) -> MapResult<()> {
        let mut state = self.state.lock();
        let pending_polls = state.ready_after_polls;
        state.raster_adds += 1;
        state.layers.insert(
            config.layer_id.clone(),
            Layer {
                config: config.clone(),
                z: 0,
                extent: None,
                pending_polls,
            },
        );
        Ok(())
    }

    async fn remove_raster_layer(&self, config: &RasterLayerConfig) -> MapResult<()> {
        self.state.lock().layers.remove(&config.layer_id);
        Ok(())
    }

    async fn find_layer(&self, id: &str, _must_be_loaded: bool) -> MapResult<Option<String>> {
        let mut state = self.state.lock();
        let Some(layer) = state.layers.get_mut(id) else {
            return Ok(None);
        };
        if layer.pending_polls > 0 {
            layer.pending_polls -= 1;
            return Ok(None);
        }
        Ok(Some(id.to_string()))
    }

    async fn set_layer_extent(&self, layer: &String, extent: Option<Extent>) -> MapResult<()> {
        let mut state = self.state.lock();
        let l = state
            .layers
            .get_mut(layer)
            .ok_or_else(|| MapError::UnknownLayer(layer.clone()))?;
        l.extent = extent;
        Ok(())
    }

    async fn layer_z_index(&self, layer: &String) -> MapResult<i32> {
        let state = self.state.lock();
        state
            .layers
            .get(layer)
            .map(|l| l.z)
            .ok_or_else(|| MapError::UnknownLayer(layer.clone()))
    }

    async fn set_layer_z_index(&self, layer: &String, z: i32) -> MapResult<()> {
        let mut state = self.state.lock();
        if state.fail_z_index {
            return Err(MapError::Host("z-index refused".into()));
        }
        let l = state
            .layers
            .get_mut(layer)
            .ok_or_else(|| MapError::UnknownLayer(layer.clone()))?;
        l.z = z;
        Ok(())
    }
}

// ============================================================================
// Catalog service
// ============================================================================

#[derive(Default)]
pub struct FakeService {
    /// Catalog per query WKT; the `None` entry answers everything else.
    pub catalogs: Mutex<HashMap<Option<String>, Vec<Collection>>>,
    pub catalog_error: Mutex<Option<ServiceError>>,
    /// When set, each catalog query waits for one permit.
    pub catalog_gate: Option<Semaphore>,
    pub catalog_calls: AtomicUsize,

    pub features: Mutex<HashMap<String, Vec<Feature>>>,
    /// When set, each feature fetch waits for one permit.
    pub features_gate: Option<Semaphore>,
    pub feature_calls: AtomicUsize,
    pub footprints: Mutex<HashMap<String, String>>,
    pub describe_calls: AtomicUsize,

    pub submit_response: Mutex<Option<ServiceResult<JobId>>>,
    pub submitted: Mutex<Vec<ExtractionInputs>>,
    pub statuses: Mutex<VecDeque<ServiceResult<JobStatus>>>,
    pub status_calls: AtomicUsize,
    pub result_calls: AtomicUsize,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog queries block until [`FakeService::release_catalog`].
    pub fn gated() -> Self {
        Self {
            catalog_gate: Some(Semaphore::new(0)),
            ..Self::default()
        }
    }

    /// Feature fetches block until [`FakeService::release_features`].
    pub fn with_features_gate(mut self) -> Self {
        self.features_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_features(&self, n: usize) {
        if let Some(gate) = &self.features_gate {
            gate.add_permits(n);
        }
    }

    pub async fn wait_for_feature_calls(&self, n: usize) {
        while self.feature_calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }

    pub fn release_catalog(&self, n: usize) {
        if let Some(gate) = &self.catalog_gate {
            gate.add_permits(n);
        }
    }

    pub fn set_catalog(&self, wkt: Option<&str>, collections: Vec<Collection>) {
        self.catalogs.lock().insert(wkt.map(str::to_string), collections);
    }

    pub fn set_features(&self, id: &str, features: Vec<Feature>) {
        self.features.lock().insert(id.to_string(), features);
    }

    pub fn set_footprint(&self, id: &str, wkt: &str) {
        self.footprints.lock().insert(id.to_string(), wkt.to_string());
    }

    pub fn push_status(&self, status: JobStatusKind, progress: f64) {
        self.statuses.lock().push_back(Ok(JobStatus {
            status,
            progress,
            message: None,
        }));
    }

    pub async fn wait_for_catalog_calls(&self, n: usize) {
        while self.catalog_calls.load(Ordering::SeqCst) < n {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl CatalogService for FakeService {
    async fn list_collections(
        &self,
        geom_wkt: Option<&str>,
        _geom_crs: Crs,
        _lang: &str,
    ) -> ServiceResult<Vec<Collection>> {
        self.catalog_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.catalog_gate {
            gate.acquire().await.expect("catalog gate closed").forget();
        }
        if let Some(err) = self.catalog_error.lock().clone() {
            return Err(err);
        }
        let catalogs = self.catalogs.lock();
        Ok(catalogs
            .get(&geom_wkt.map(str::to_string))
            .or_else(|| catalogs.get(&None))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_collection(&self, id: &str) -> ServiceResult<Collection> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        let mut c = Collection::new(id, ItemType::Feature, id);
        c.wkt = self.footprints.lock().get(id).cloned();
        Ok(c)
    }

    async fn fetch_features(&self, id: &str, _clip: Option<&ClipArea>) -> ServiceResult<FeaturePage> {
        self.feature_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.features_gate {
            gate.acquire().await.expect("features gate closed").forget();
        }
        let features = self.features.lock().get(id).cloned().unwrap_or_default();
        Ok(FeaturePage {
            number_matched: features.len() as u64,
            number_returned: features.len() as u64,
            features,
        })
    }

    async fn submit_extraction(&self, inputs: ExtractionInputs) -> ServiceResult<JobId> {
        self.submitted.lock().push(inputs);
        self.submit_response
            .lock()
            .clone()
            .unwrap_or_else(|| Ok(JobId::new("job-1")))
    }

    async fn job_status(&self, _job_id: &JobId) -> ServiceResult<JobStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().pop_front().unwrap_or_else(|| {
            Ok(JobStatus {
                status: JobStatusKind::Accepted,
                progress: 0.0,
                message: None,
            })
        })
    }

    async fn job_result(&self, job_id: &JobId) -> ServiceResult<JobResult> {
        self.result_calls.fetch_add(1, Ordering::SeqCst);
        Ok(JobResult {
            extract_url: format!("https://downloads.test/{job_id}.zip"),
        })
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Returns immediately; polls run back to back.
pub struct NoDelay;

#[async_trait]
impl Delay for NoDelay {
    async fn sleep(&self, _duration: Duration) {
        tokio::task::yield_now().await;
    }
}

pub fn collection(id: &str, kind: ItemType, max_extract_area: f64) -> Collection {
    let mut c = Collection::new(id, kind, id.to_uppercase());
    c.theme = "T".into();
    c.parent_id = "P".into();
    c.parent_title = "Parent P".into();
    c.short_name = format!("{id}_layer");
    c.org_schema = "schema".into();
    c.crs_list = vec![Crs(3979)];
    c.max_extract_area = max_extract_area;
    c
}

pub fn line_feature() -> Feature {
    Feature {
        geometry: json!({"type": "LineString", "coordinates": [[0.0, 0.0], [5.0, 5.0]]}),
        geometry_clipped: Some(json!({"type": "LineString", "coordinates": [[0.0, 0.0], [2.0, 2.0]]})),
        properties: json!({}),
    }
}

pub fn point_feature() -> Feature {
    Feature {
        geometry: json!({"type": "Point", "coordinates": [1.0, 1.0]}),
        geometry_clipped: None,
        properties: json!({}),
    }
}

pub fn engine(host: &Arc<FakeHost>, service: &Arc<FakeService>) -> Engine<FakeHost> {
    let service: Arc<dyn CatalogService> = Arc::clone(service) as Arc<dyn CatalogService>;
    Engine::new("map-test", Arc::clone(host), service, EngineConfig::default())
        .with_job_delay(Arc::new(NoDelay))
}
