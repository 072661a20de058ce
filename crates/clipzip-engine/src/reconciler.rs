//! Selection reconciler: drives the viewed map toward the checked set.
//!
//! Every change for a collection id runs under that id's lock and starts by
//! re-reading the current intent (checked or not, current catalog, current
//! geometry). Whatever order toggles and resyncs finish in, the last one to
//! run renders the latest intent.
//!
//! # Add policy
//!
//! ```text
//! geometry drawn && area_km2 <= max_extract_area
//!     feature  -> fetch clipped features into a vector group
//!     coverage -> raster layer limited to the drawn extent
//! otherwise
//!     footprint of the collection (+ ViewedFootprint when an area is drawn)
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use clipzip_client::{CatalogService, ClipArea};
use clipzip_types::{Collection, CollectionId, ItemType};
use futures::future::join_all;
use tracing::{debug, instrument, trace, warn};

use crate::config::EngineConfig;
use crate::constants::{FOOTPRINT_CRS, M2_PER_KM2, Z_INDEX_RASTERS, Z_INDEX_VECTORS};
use crate::error::{EngineError, EngineResult};
use crate::events::{EngineEvent, ErrorScope, EventBus};
use crate::map::MapHost;
use crate::render::{self, FEATURE_PALETTE};
use crate::state::{EngineState, ViewedEntry, ViewedHandle, ViewedKind};

// ============================================================================
// KeyedLocks
// ============================================================================

/// One async mutex per collection id, created on demand and dropped once
/// nobody holds or waits for it.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    slots: parking_lot::Mutex<HashMap<CollectionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, id: &CollectionId) -> KeyedGuard<'_> {
        let slot = self.slots.lock().entry(id.clone()).or_default().clone();
        let guard = slot.lock_owned().await;
        KeyedGuard {
            locks: self,
            id: id.clone(),
            guard: Some(guard),
        }
    }

    /// Ids with a live lock.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct KeyedGuard<'a> {
    locks: &'a KeyedLocks,
    id: CollectionId,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots.lock();
        if slots.get(&self.id).is_some_and(|slot| Arc::strong_count(slot) == 1) {
            slots.remove(&self.id);
        }
    }
}

// ============================================================================
// Reconciler
// ============================================================================

pub struct Reconciler<M: MapHost> {
    host: Arc<M>,
    service: Arc<dyn CatalogService>,
    bus: EventBus,
    locks: KeyedLocks,
    raster_service_root: String,
    layer_poll_interval: Duration,
    layer_ready_timeout: Duration,
}

impl<M: MapHost> Reconciler<M> {
    pub fn new(host: Arc<M>, service: Arc<dyn CatalogService>, bus: EventBus, config: &EngineConfig) -> Self {
        Self {
            host,
            service,
            bus,
            locks: KeyedLocks::new(),
            raster_service_root: config.raster_service_root.clone(),
            layer_poll_interval: config.layer_poll_interval(),
            layer_ready_timeout: config.layer_ready_timeout(),
        }
    }

    /// Bring the rendering of `id` in line with the current intent.
    #[instrument(skip(self, state, id), fields(id = %id))]
    pub async fn sync(&self, state: &EngineState<M::Geometry>, id: &CollectionId) -> EngineResult<()> {
        let _guard = self.locks.lock(id).await;

        if !state.is_checked(id.as_str()) {
            self.hide(state, id.as_str()).await;
            return Ok(());
        }

        let catalog = state.catalog();
        let Some(collection) = catalog.get(id.as_str()) else {
            // Orphaned by a reload; stays checked but renders nothing.
            debug!("checked collection not in catalog generation {}", catalog.generation());
            self.hide(state, id.as_str()).await;
            return Ok(());
        };

        let geometry = state.geometry();
        self.show(state, collection, geometry.as_ref()).await
    }

    /// Re-apply every checked collection, e.g. after a reload.
    ///
    /// Failures are reported per collection and do not stop the others.
    pub async fn resync(&self, state: &EngineState<M::Geometry>) {
        self.bus.emit(EngineEvent::ViewedUpdateStarted);

        let checked = state.checked();
        trace!(count = checked.len(), "resyncing checked collections");
        let results = join_all(checked.iter().map(|id| self.sync(state, id))).await;

        for (id, result) in checked.iter().zip(results) {
            if let Err(error) = result {
                warn!(%id, %error, "failed to resync collection");
                self.bus.emit(EngineEvent::Error {
                    scope: ErrorScope::ShowCollection,
                    error,
                });
            }
        }

        self.bus.emit(EngineEvent::ViewedUpdateEnded {
            viewed: state.viewed(),
        });
    }

    pub fn area_km2(&self, geometry: &M::Geometry) -> EngineResult<f64> {
        Ok(self.host.area_square_meters(geometry, self.host.map_crs())? / M2_PER_KM2)
    }

    // ========================================================================
    // Add
    // ========================================================================

    async fn show(
        &self,
        state: &EngineState<M::Geometry>,
        collection: &Collection,
        geometry: Option<&M::Geometry>,
    ) -> EngineResult<()> {
        if let Some(geometry) = geometry {
            let area_km2 = self.area_km2(geometry)?;
            if area_km2 <= collection.max_extract_area {
                return match collection.item_type {
                    ItemType::Coverage => self.show_raster(state, collection, geometry).await,
                    _ => self.show_features(state, collection, geometry).await,
                };
            }

            debug!(area_km2, max = collection.max_extract_area, "area over limit, footprint only");
            self.bus.emit(EngineEvent::ViewedFootprint {
                collection: collection.id.clone(),
                area_km2,
                max_extract_area: collection.max_extract_area,
            });
        }
        self.show_footprint(state, collection).await
    }

    async fn show_features(
        &self,
        state: &EngineState<M::Geometry>,
        collection: &Collection,
        geometry: &M::Geometry,
    ) -> EngineResult<()> {
        let id = collection.id.as_str();
        self.hide(state, id).await;

        let clip = ClipArea {
            wkt: self.host.to_wkt(geometry)?,
            crs: self.host.map_crs(),
        };
        let page = self.service.fetch_features(id, Some(&clip)).await?;
        if page.features.is_empty() {
            debug!(id, "no features in area");
            return Ok(());
        }

        self.open_group(id).await?;
        state.insert_viewed(collection.id.clone(), ViewedEntry::vector(ViewedKind::Features, id));

        let crs = collection.native_crs().unwrap_or(self.host.map_crs());
        let features = render::draw_features(&*self.host, id, &page.features, crs, FEATURE_PALETTE).await?;
        self.bus.emit(EngineEvent::ViewedFeatures {
            collection: collection.id.clone(),
            features,
        });
        Ok(())
    }

    async fn show_raster(
        &self,
        state: &EngineState<M::Geometry>,
        collection: &Collection,
        geometry: &M::Geometry,
    ) -> EngineResult<()> {
        let id = collection.id.as_str();
        let extent = Some(self.host.extent(geometry));

        if state.viewed_entry(id).is_some_and(|e| e.kind == ViewedKind::Raster) {
            let layer = self.ready_layer(id).await?;
            self.host.set_layer_extent(&layer, extent).await?;
            trace!(id, "raster re-extented");
            return Ok(());
        }

        self.hide(state, id).await;
        let config = render::raster_config(collection, &self.raster_service_root);
        self.host.add_or_update_raster_layer(&config).await?;
        state.insert_viewed(collection.id.clone(), ViewedEntry::raster(config));

        let layer = self.ready_layer(id).await?;
        self.host.set_layer_extent(&layer, extent).await?;
        self.host.set_layer_z_index(&layer, Z_INDEX_RASTERS).await?;
        self.bus.emit(EngineEvent::ViewedCoverage {
            collection: collection.id.clone(),
        });
        Ok(())
    }

    async fn show_footprint(&self, state: &EngineState<M::Geometry>, collection: &Collection) -> EngineResult<()> {
        let id = collection.id.as_str();
        self.hide(state, id).await;

        let described = self.service.fetch_collection(id).await?;
        let wkt = described
            .wkt
            .ok_or_else(|| EngineError::MissingFootprint(collection.id.clone()))?;

        self.open_group(id).await?;
        state.insert_viewed(collection.id.clone(), ViewedEntry::vector(ViewedKind::Footprint, id));
        render::draw_footprint(&*self.host, id, &wkt, FOOTPRINT_CRS).await?;
        Ok(())
    }

    async fn open_group(&self, id: &str) -> EngineResult<()> {
        self.host.create_vector_group(id).await?;
        self.host.set_group_z_index(id, Z_INDEX_VECTORS).await?;
        self.host.set_active_vector_group(id).await?;
        Ok(())
    }

    async fn ready_layer(&self, id: &str) -> EngineResult<M::Layer> {
        Ok(self
            .host
            .layer_when_ready(id, true, self.layer_poll_interval, self.layer_ready_timeout)
            .await?)
    }

    // ========================================================================
    // Remove
    // ========================================================================

    /// Drop whatever is rendered for `id`. Host failures are logged; the
    /// viewed entry is gone either way.
    async fn hide(&self, state: &EngineState<M::Geometry>, id: &str) {
        let entry = state.take_viewed(id);

        if self.host.has_vector_group(id) {
            if let Err(err) = self.host.delete_vector_group(id).await {
                warn!(id, %err, "failed to delete vector group");
            }
        }
        if let Some(ViewedEntry {
            handle: ViewedHandle::Raster(config),
            ..
        }) = entry
        {
            if let Err(err) = self.host.remove_raster_layer(&config).await {
                warn!(id, %err, "failed to remove raster layer");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_keyed_locks_prune() {
        let locks = KeyedLocks::new();
        let a = CollectionId::from("a");
        {
            let _guard = locks.lock(&a).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_keyed_locks_serialize_same_id() {
        let locks = KeyedLocks::new();
        let a = CollectionId::from("a");
        let b = CollectionId::from("b");

        let _held = locks.lock(&a).await;
        // A different id is independent.
        let other = tokio::time::timeout(Duration::from_millis(20), locks.lock(&b)).await;
        assert!(other.is_ok());
        // The same id waits.
        let same = tokio::time::timeout(Duration::from_millis(20), locks.lock(&a)).await;
        assert!(same.is_err());
    }
}
