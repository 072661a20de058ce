//! The engine façade: one instance per map.
//!
//! # Entry points
//!
//! | Trigger                       | Goes to                                  |
//! |-------------------------------|------------------------------------------|
//! | map loaded / draw / modify / clear | [`Engine::request_load`] (latest wins) |
//! | collection checkbox           | [`Engine::toggle`]                       |
//! | raise / lower buttons         | [`Engine::raise`] / [`Engine::lower`]    |
//! | extract button                | [`Engine::extract`]                      |
//! | zoom-to-collection            | [`Engine::zoom_to_collection`]           |
//!
//! Operations that must record intent immediately (`request_load`, `toggle`
//! and the drawing callbacks built on them) do so when called and return a
//! future for the slow part. Nothing here returns an error: failures are
//! published as [`EngineEvent::Error`] and the operation reports a plain
//! outcome.

use std::future::Future;
use std::sync::Arc;

use clipzip_client::{CatalogService, ExtractionInputs};
use clipzip_types::{CatalogSnapshot, CollectionId, Crs, Parent};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::constants::{
    DRAWING_GROUP_ID, FOOTPRINT_CRS, MAP_LIMITS, MAP_LIMITS_CRS, Z_INDEX_DRAWING,
};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, ErrorScope, EventBus, EventFilter, Subscription};
use crate::jobs::{Delay, JobHandle, JobTracker};
use crate::map::{DrawKind, Extent, MapHost};
use crate::ordering::{LayerKind, OrderingSerializer};
use crate::reconciler::Reconciler;
use crate::state::{EngineState, ViewedKind};
use crate::supersession::{GateGuard, LoadOutcome, LoadTicket, SupersessionGate};

pub struct Engine<M: MapHost> {
    host: Arc<M>,
    service: Arc<dyn CatalogService>,
    config: EngineConfig,
    bus: EventBus,
    state: EngineState<M::Geometry>,
    loads: SupersessionGate,
    reconciler: Reconciler<M>,
    ordering: OrderingSerializer<M>,
    jobs: Arc<JobTracker>,
    /// Basemap limits in the map projection, if the host could reproject them.
    map_limits: Option<Extent>,
}

impl<M: MapHost> Engine<M> {
    pub fn new(
        map_id: impl Into<Arc<str>>,
        host: Arc<M>,
        service: Arc<dyn CatalogService>,
        config: EngineConfig,
    ) -> Self {
        let bus = EventBus::new(map_id, config.event_capacity);
        let map_limits = match host.reproject_extent(MAP_LIMITS, MAP_LIMITS_CRS, host.map_crs()) {
            Ok(extent) => Some(extent),
            Err(err) => {
                warn!(%err, "cannot project basemap limits, out-of-bounds checks disabled");
                None
            }
        };
        let jobs = JobTracker::new(Arc::clone(&service), config.job_poll_interval()).with_events(bus.clone());

        Self {
            reconciler: Reconciler::new(Arc::clone(&host), Arc::clone(&service), bus.clone(), &config),
            ordering: OrderingSerializer::new(Arc::clone(&host), bus.clone(), &config),
            jobs: Arc::new(jobs),
            state: EngineState::new(),
            loads: SupersessionGate::new(),
            host,
            service,
            config,
            bus,
            map_limits,
        }
    }

    /// Replace the wait between job polls.
    pub fn with_job_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        let jobs = JobTracker::new(Arc::clone(&self.service), self.config.job_poll_interval())
            .with_delay(delay)
            .with_events(self.bus.clone());
        self.jobs = Arc::new(jobs);
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn map_id(&self) -> &str {
        self.bus.map_id()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<M> {
        &self.host
    }

    pub fn catalog(&self) -> Arc<CatalogSnapshot> {
        self.state.catalog()
    }

    pub fn geometry(&self) -> Option<M::Geometry> {
        self.state.geometry()
    }

    pub fn checked(&self) -> Vec<CollectionId> {
        self.state.checked()
    }

    pub fn viewed(&self) -> Vec<(CollectionId, ViewedKind)> {
        self.state.viewed()
    }

    pub fn viewed_kind(&self, id: &str) -> Option<ViewedKind> {
        self.state.viewed_entry(id).map(|e| e.kind)
    }

    pub fn ordering_in_progress(&self) -> Vec<CollectionId> {
        self.ordering.in_progress()
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.jobs
    }

    pub fn map_limits(&self) -> Option<Extent> {
        self.map_limits
    }

    // ========================================================================
    // Drawing lifecycle
    // ========================================================================

    /// Set up the drawing group and load the whole catalog.
    pub async fn on_map_loaded(&self) -> LoadOutcome {
        if let Err(error) = self.open_drawing_group().await {
            self.bus.emit(EngineEvent::Error {
                scope: ErrorScope::Load,
                error,
            });
        }
        self.request_load(None).await
    }

    async fn open_drawing_group(&self) -> EngineResult<()> {
        self.host.create_vector_group(DRAWING_GROUP_ID).await?;
        self.host.set_group_z_index(DRAWING_GROUP_ID, Z_INDEX_DRAWING).await?;
        Ok(())
    }

    /// Wipe the current drawing and start a polygon interaction.
    pub async fn start_drawing(&self) -> EngineResult<()> {
        self.host.clear_vector_group(DRAWING_GROUP_ID).await?;
        self.host.start_drawing(DRAWING_GROUP_ID, DrawKind::Polygon).await?;
        Ok(())
    }

    /// A polygon was completed: stop drawing, zoom to it, load for it.
    pub fn on_draw_ended(&self, geometry: M::Geometry) -> impl Future<Output = LoadOutcome> + '_ {
        let extent = self.host.extent(&geometry);
        let load = self.request_load(Some(geometry));
        async move {
            if let Err(err) = self.host.stop_drawing().await {
                warn!(%err, "failed to stop drawing");
            }
            if let Err(err) = self.host.zoom_to_extent(extent, self.config.zoom_options()).await {
                self.bus.emit(EngineEvent::Error {
                    scope: ErrorScope::Zoom,
                    error: err.into(),
                });
            }
            load.await
        }
    }

    /// The drawing was edited.
    pub fn on_modify_ended(&self, geometry: M::Geometry) -> impl Future<Output = LoadOutcome> + '_ {
        self.request_load(Some(geometry))
    }

    /// Remove the drawing and reload with no area.
    pub fn clear_drawing(&self) -> impl Future<Output = LoadOutcome> + '_ {
        let load = self.request_load(None);
        async move {
            if let Err(err) = self.host.clear_vector_group(DRAWING_GROUP_ID).await {
                warn!(%err, "failed to clear drawing");
            }
            if let Err(err) = self.host.stop_drawing().await {
                warn!(%err, "failed to stop drawing");
            }
            load.await
        }
    }

    // ========================================================================
    // Catalog loads
    // ========================================================================

    /// Load the catalog for `geometry` (everything when `None`).
    ///
    /// The request is registered immediately; only the most recently
    /// registered one is ever applied.
    pub fn request_load(&self, geometry: Option<M::Geometry>) -> impl Future<Output = LoadOutcome> + '_ {
        let ticket = self.loads.ticket();
        self.run_load(ticket, geometry)
    }

    async fn run_load(&self, ticket: LoadTicket, geometry: Option<M::Geometry>) -> LoadOutcome {
        let guard = match self.loads.enter(ticket).await {
            Ok(guard) => guard,
            Err(reason) => return LoadOutcome::Skipped(reason),
        };

        let generation = ticket.generation();
        self.bus.emit(EngineEvent::LoadStarted {
            generation,
            has_geometry: geometry.is_some(),
        });
        let outcome = self.load_locked(&guard, geometry).await;
        self.bus.emit(EngineEvent::LoadEnded { generation });
        outcome
    }

    async fn load_locked(&self, guard: &GateGuard<'_>, geometry: Option<M::Geometry>) -> LoadOutcome {
        let generation = guard.ticket().generation();
        let fetched = async {
            let wkt = geometry.as_ref().map(|g| self.host.to_wkt(g)).transpose()?;
            let collections = self
                .service
                .list_collections(wkt.as_deref(), self.host.map_crs(), &self.config.language)
                .await?;
            Ok::<_, EngineError>(collections)
        };
        let collections = match fetched.await {
            Ok(collections) => collections,
            Err(error) => {
                self.bus.emit(EngineEvent::Error {
                    scope: ErrorScope::Load,
                    error,
                });
                return LoadOutcome::Failed;
            }
        };

        if let Err(reason) = guard.confirm() {
            return LoadOutcome::Skipped(reason);
        }

        let snapshot = Arc::new(CatalogSnapshot::build(generation, collections));
        let count = snapshot.len();
        self.state.apply_load(Arc::clone(&snapshot), geometry);
        info!(generation, collections = count, "catalog loaded");
        self.bus.emit(EngineEvent::CatalogLoaded { snapshot });

        self.reconciler.resync(&self.state).await;
        LoadOutcome::Applied {
            generation,
            collections: count,
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Check or uncheck a collection.
    ///
    /// The checked set changes before this returns; the future renders the
    /// change. `parent` defaults to the collection's parent in the current
    /// catalog. Resolves to `false` if rendering failed.
    pub fn toggle(
        &self,
        id: impl Into<CollectionId>,
        checked: bool,
        parent: Option<Parent>,
    ) -> impl Future<Output = bool> + '_ {
        let id = id.into();
        let checked_now = self.state.set_checked(&id, checked);

        async move {
            let catalog = self.state.catalog();
            let known = catalog.contains(id.as_str());
            if known {
                let parent = parent.or_else(|| catalog.parent_of(id.as_str()).map(|p| p.parent.clone()));
                self.bus.emit(EngineEvent::CollectionChangedStarted {
                    parent,
                    checked: checked_now,
                });
            } else {
                debug!(%id, "toggled collection is not in the current catalog");
            }

            let result = self.reconciler.sync(&self.state, &id).await;

            if known {
                self.bus.emit(EngineEvent::CollectionChangedEnded {
                    viewed: self.state.viewed(),
                });
            }
            match result {
                Ok(()) => {
                    if known && self.state.is_checked(id.as_str()) && self.state.geometry().is_none() {
                        self.bus.emit(EngineEvent::FootprintWithoutArea { collection: id });
                    }
                    true
                }
                Err(error) => {
                    self.bus.emit(EngineEvent::Error {
                        scope: ErrorScope::ShowCollection,
                        error,
                    });
                    false
                }
            }
        }
    }

    /// Re-render every checked collection against the current catalog and
    /// geometry.
    pub async fn resync(&self) {
        self.reconciler.resync(&self.state).await;
    }

    // ========================================================================
    // Ordering
    // ========================================================================

    pub async fn raise(&self, kind: LayerKind, id: impl Into<CollectionId>) -> bool {
        self.ordering.raise(kind, &id.into()).await
    }

    pub async fn lower(&self, kind: LayerKind, id: impl Into<CollectionId>) -> bool {
        self.ordering.lower(kind, &id.into()).await
    }

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Extract the viewed collections (footprints excluded) inside the drawn
    /// area. Polling starts in the background once the job is queued.
    pub async fn extract(&self, email: impl Into<String>, out_crs: Option<Crs>) -> JobHandle {
        let Some(geometry) = self.state.geometry() else {
            return self.jobs.dismiss(EngineError::NoGeometry);
        };
        let geom = match self.host.to_wkt(&geometry) {
            Ok(wkt) => wkt,
            Err(err) => return self.jobs.dismiss(err.into()),
        };

        let inputs = ExtractionInputs {
            geom,
            geom_crs: self.host.map_crs(),
            collections: self.state.extractable().into_iter().map(CollectionId::into_inner).collect(),
            email: email.into(),
            out_crs,
        };
        self.jobs.start(inputs).await
    }

    // ========================================================================
    // Zoom
    // ========================================================================

    /// Zoom to a collection's footprint. Reaching past the basemap is
    /// reported as a warning; the zoom still happens.
    pub async fn zoom_to_collection(&self, id: &str) -> bool {
        match self.zoom_to_footprint(id).await {
            Ok(extent) => {
                if self.map_limits.is_some_and(|limits| extent.exceeds(&limits)) {
                    self.bus.emit(EngineEvent::Error {
                        scope: ErrorScope::Zoom,
                        error: EngineError::OutOfBounds(id.into()),
                    });
                }
                true
            }
            Err(error) => {
                self.bus.emit(EngineEvent::Error {
                    scope: ErrorScope::Zoom,
                    error,
                });
                false
            }
        }
    }

    async fn zoom_to_footprint(&self, id: &str) -> EngineResult<Extent> {
        let described = self.service.fetch_collection(id).await?;
        let wkt = described
            .wkt
            .ok_or_else(|| EngineError::MissingFootprint(id.into()))?;
        let footprint = self.host.from_wkt(&wkt)?;
        let projected = self.host.reproject(&footprint, FOOTPRINT_CRS, self.host.map_crs())?;
        let extent = self.host.extent(&projected);
        self.host.zoom_to_extent(extent, self.config.zoom_options()).await?;
        Ok(extent)
    }
}
