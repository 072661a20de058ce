//! Catalog snapshots: one successful catalog load, regrouped for presentation.
//!
//! A snapshot is built from scratch from the flat collection list the service
//! returns and is never mutated afterwards. Feature and coverage collections
//! are grouped separately, each as Theme → Parent → Collection, and every
//! level is sorted by title so the presentation order is deterministic.
//!
//! The flat [`CatalogSnapshot::get`] index is what the engine resolves checked
//! and viewed ids against. A miss means the id belongs to an older snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, ItemType, Parent, Theme};
use crate::ids::CollectionId;

/// A parent and its collections, carrying the theme for context.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParentCollections {
    pub theme: Theme,
    pub parent: Parent,
    pub collections: Vec<Collection>,
}

/// A theme and its parents.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThemeCollections {
    pub theme: Theme,
    pub parents: Vec<ParentCollections>,
}

impl ThemeCollections {
    /// All collections under this theme, in presentation order.
    pub fn collections(&self) -> impl Iterator<Item = &Collection> {
        self.parents.iter().flat_map(|p| p.collections.iter())
    }
}

/// Immutable result of one catalog load.
#[derive(Clone, Debug, Default)]
pub struct CatalogSnapshot {
    generation: u64,
    features: Vec<ThemeCollections>,
    coverages: Vec<ThemeCollections>,
    index: HashMap<CollectionId, Collection>,
}

/// Intermediate grouping keyed by theme id then parent id, in first-seen order.
type Grouping = IndexMap<String, (Theme, IndexMap<String, ParentCollections>)>;

impl CatalogSnapshot {
    /// Snapshot with no collections (before the first load).
    pub fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Regroup a flat collection list.
    ///
    /// Collections that are neither features nor coverages are dropped. When
    /// the service lists an id twice, the first occurrence wins.
    pub fn build(generation: u64, collections: Vec<Collection>) -> Self {
        let mut features: Grouping = IndexMap::new();
        let mut coverages: Grouping = IndexMap::new();
        let mut index = HashMap::with_capacity(collections.len());

        for collection in collections {
            let grouping = match collection.item_type {
                ItemType::Feature => &mut features,
                ItemType::Coverage => &mut coverages,
                ItemType::Other => continue,
            };
            if index.contains_key(&collection.id) {
                continue;
            }

            let (theme, parents) = grouping
                .entry(collection.theme.clone())
                .or_insert_with(|| (collection.theme(), IndexMap::new()));
            parents
                .entry(collection.parent_id.clone())
                .or_insert_with(|| ParentCollections {
                    theme: theme.clone(),
                    parent: collection.parent(),
                    collections: Vec::new(),
                })
                .collections
                .push(collection.clone());

            index.insert(collection.id.clone(), collection);
        }

        Self {
            generation,
            features: sorted(features),
            coverages: sorted(coverages),
            index,
        }
    }

    /// Load generation that produced this snapshot (0 = never loaded).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn features(&self) -> &[ThemeCollections] {
        &self.features
    }

    pub fn coverages(&self) -> &[ThemeCollections] {
        &self.coverages
    }

    /// Resolve a collection id in this snapshot.
    pub fn get(&self, id: &str) -> Option<&Collection> {
        self.index.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// The parent grouping a collection belongs to.
    pub fn parent_of(&self, id: &str) -> Option<&ParentCollections> {
        self.features
            .iter()
            .chain(self.coverages.iter())
            .flat_map(|t| t.parents.iter())
            .find(|p| p.collections.iter().any(|c| c.id == id))
    }
}

fn sorted(grouping: Grouping) -> Vec<ThemeCollections> {
    let mut themes: Vec<ThemeCollections> = grouping
        .into_values()
        .map(|(theme, parents)| {
            let mut parents: Vec<ParentCollections> = parents.into_values().collect();
            for p in &mut parents {
                p.collections.sort_by(|a, b| a.title.cmp(&b.title));
            }
            parents.sort_by(|a, b| a.parent.title.cmp(&b.parent.title));
            ThemeCollections { theme, parents }
        })
        .collect();
    themes.sort_by(|a, b| a.theme.title.cmp(&b.theme.title));
    themes
}

// ============================================================================
// Tests
// ============================================================================
