//! Ordering serializer: raise/lower one collection's stacking order.
//!
//! At most one raise or lower runs per collection id. The in-progress set is
//! claimed and released under a single lock, and republished after every
//! change so presentation can show a busy state per id.

use std::sync::Arc;
use std::time::Duration;

use clipzip_types::CollectionId;
use indexmap::IndexSet;
use parking_lot::Mutex;
use strum::Display;
use tracing::{debug, instrument};

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::events::{EngineEvent, ErrorScope, EventBus};
use crate::map::MapHost;

/// Which z-order primitive applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LayerKind {
    /// A vector group (features or footprint).
    Vector,
    /// A raster layer, which may still be loading.
    Raster,
}

pub struct OrderingSerializer<M: MapHost> {
    host: Arc<M>,
    bus: EventBus,
    in_progress: Mutex<IndexSet<CollectionId>>,
    layer_poll_interval: Duration,
    layer_ready_timeout: Duration,
}

impl<M: MapHost> OrderingSerializer<M> {
    pub fn new(host: Arc<M>, bus: EventBus, config: &EngineConfig) -> Self {
        Self {
            host,
            bus,
            in_progress: Mutex::new(IndexSet::new()),
            layer_poll_interval: config.layer_poll_interval(),
            layer_ready_timeout: config.layer_ready_timeout(),
        }
    }

    /// Move `id` one step up. `false` if another raise/lower for it is
    /// running or the host refused.
    pub async fn raise(&self, kind: LayerKind, id: &CollectionId) -> bool {
        self.reorder(kind, id, 1).await
    }

    /// Move `id` one step down.
    pub async fn lower(&self, kind: LayerKind, id: &CollectionId) -> bool {
        self.reorder(kind, id, -1).await
    }

    pub fn in_progress(&self) -> Vec<CollectionId> {
        self.in_progress.lock().iter().cloned().collect()
    }

    #[instrument(skip(self, id), fields(id = %id))]
    async fn reorder(&self, kind: LayerKind, id: &CollectionId, delta: i32) -> bool {
        let Some(_claim) = self.claim(id) else {
            debug!("reorder already in progress");
            return false;
        };

        match self.shift(kind, id.as_str(), delta).await {
            Ok(z) => {
                debug!(z, "reordered");
                true
            }
            Err(error) => {
                self.bus.emit(EngineEvent::Error {
                    scope: ErrorScope::Order,
                    error,
                });
                false
            }
        }
    }

    async fn shift(&self, kind: LayerKind, id: &str, delta: i32) -> EngineResult<i32> {
        match kind {
            LayerKind::Vector => {
                let z = self.host.group_z_index(id).await? + delta;
                self.host.set_group_z_index(id, z).await?;
                Ok(z)
            }
            LayerKind::Raster => {
                let layer = self
                    .host
                    .layer_when_ready(id, true, self.layer_poll_interval, self.layer_ready_timeout)
                    .await?;
                let z = self.host.layer_z_index(&layer).await? + delta;
                self.host.set_layer_z_index(&layer, z).await?;
                Ok(z)
            }
        }
    }

    /// Check-and-insert under one lock. `None` if already claimed.
    fn claim(&self, id: &CollectionId) -> Option<OrderingClaim<'_, M>> {
        let snapshot = {
            let mut set = self.in_progress.lock();
            if !set.insert(id.clone()) {
                return None;
            }
            set.iter().cloned().collect()
        };
        self.bus.emit(EngineEvent::LayerOrdered { in_progress: snapshot });
        Some(OrderingClaim { owner: self, id: id.clone() })
    }
}

/// Releases the claim on every exit path, including cancellation.
struct OrderingClaim<'a, M: MapHost> {
    owner: &'a OrderingSerializer<M>,
    id: CollectionId,
}

impl<M: MapHost> Drop for OrderingClaim<'_, M> {
    fn drop(&mut self) {
        let snapshot = {
            let mut set = self.owner.in_progress.lock();
            set.shift_remove(&self.id);
            set.iter().cloned().collect()
        };
        self.owner.bus.emit(EngineEvent::LayerOrdered { in_progress: snapshot });
    }
}
