//! Engine-owned session state.
//!
//! Four pieces of state are shared between operations: the current catalog
//! snapshot, the drawn geometry, the checked set (user intent) and the viewed
//! map (what is actually rendered). Each sits behind its own short-lived
//! `parking_lot` lock; none is held across an await.

use std::sync::Arc;

use clipzip_types::{CatalogSnapshot, CollectionId};
use indexmap::{IndexMap, IndexSet};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::map::RasterLayerConfig;
use crate::ordering::LayerKind;

/// How a viewed collection is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewedKind {
    /// Clipped features in a vector group.
    Features,
    /// A raster layer restricted to the drawn area.
    Raster,
    /// Only the collection's boundary, in a vector group.
    Footprint,
}

impl ViewedKind {
    /// Which z-order path applies to this rendering.
    pub fn layer_kind(self) -> LayerKind {
        match self {
            ViewedKind::Raster => LayerKind::Raster,
            ViewedKind::Features | ViewedKind::Footprint => LayerKind::Vector,
        }
    }
}

/// What the host created for a viewed collection.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewedHandle {
    VectorGroup(String),
    Raster(RasterLayerConfig),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewedEntry {
    pub kind: ViewedKind,
    pub handle: ViewedHandle,
}

impl ViewedEntry {
    pub fn vector(kind: ViewedKind, group: impl Into<String>) -> Self {
        Self {
            kind,
            handle: ViewedHandle::VectorGroup(group.into()),
        }
    }

    pub fn raster(config: RasterLayerConfig) -> Self {
        Self {
            kind: ViewedKind::Raster,
            handle: ViewedHandle::Raster(config),
        }
    }
}

pub struct EngineState<G> {
    catalog: RwLock<Arc<CatalogSnapshot>>,
    geometry: RwLock<Option<G>>,
    checked: Mutex<IndexSet<CollectionId>>,
    viewed: Mutex<IndexMap<CollectionId, ViewedEntry>>,
}

impl<G: Clone> EngineState<G> {
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(CatalogSnapshot::empty()),
            geometry: RwLock::new(None),
            checked: Mutex::new(IndexSet::new()),
            viewed: Mutex::new(IndexMap::new()),
        }
    }

    // ========================================================================
    // Catalog + geometry
    // ========================================================================

    pub fn catalog(&self) -> Arc<CatalogSnapshot> {
        self.catalog.read().clone()
    }

    pub fn geometry(&self) -> Option<G> {
        self.geometry.read().clone()
    }

    /// Install the result of a load. The snapshot and the geometry it was
    /// queried with always change together.
    pub fn apply_load(&self, snapshot: Arc<CatalogSnapshot>, geometry: Option<G>) {
        let mut catalog = self.catalog.write();
        let mut current = self.geometry.write();
        *catalog = snapshot;
        *current = geometry;
    }

    // ========================================================================
    // Checked set
    // ========================================================================

    /// Record intent for `id`. Returns the checked set afterwards.
    pub fn set_checked(&self, id: &CollectionId, checked: bool) -> Vec<CollectionId> {
        let mut set = self.checked.lock();
        if checked {
            set.insert(id.clone());
        } else {
            set.shift_remove(id);
        }
        set.iter().cloned().collect()
    }

    pub fn is_checked(&self, id: &str) -> bool {
        self.checked.lock().contains(id)
    }

    pub fn checked(&self) -> Vec<CollectionId> {
        self.checked.lock().iter().cloned().collect()
    }

    // ========================================================================
    // Viewed map
    // ========================================================================

    pub fn viewed_entry(&self, id: &str) -> Option<ViewedEntry> {
        self.viewed.lock().get(id).cloned()
    }

    pub(crate) fn insert_viewed(&self, id: CollectionId, entry: ViewedEntry) {
        self.viewed.lock().insert(id, entry);
    }

    pub(crate) fn take_viewed(&self, id: &str) -> Option<ViewedEntry> {
        self.viewed.lock().shift_remove(id)
    }

    pub fn viewed(&self) -> Vec<(CollectionId, ViewedKind)> {
        self.viewed
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.kind))
            .collect()
    }

    /// Viewed collections that carry real data (not just a footprint).
    pub fn extractable(&self) -> Vec<CollectionId> {
        self.viewed
            .lock()
            .iter()
            .filter(|(_, entry)| entry.kind != ViewedKind::Footprint)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl<G: Clone> Default for EngineState<G> {
    fn default() -> Self {
        Self::new()
    }
}
