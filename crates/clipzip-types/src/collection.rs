//! Collection entities as the catalog service describes them.
//!
//! Field names follow the service's JSON (`itemType`, `parent_title`,
//! `max_extract_area`, ...). Everything except `id` tolerates absence so a
//! sparse collection description still deserializes.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

use crate::crs::Crs;
use crate::ids::CollectionId;

/// Top-level grouping. The catalog only names themes, so `title == id`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub id: String,
    pub title: String,
}

/// Mid-level grouping under a theme.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    pub id: String,
    pub title: String,
}

/// What kind of data a collection serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemType {
    /// Vector features, previewed by fetching clipped records.
    Feature,
    /// Raster coverage, previewed through a map layer.
    Coverage,
    /// Anything else the service lists; never indexed.
    #[serde(other)]
    Other,
}

/// A hypermedia link attached to a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(default, rename = "type")]
    pub media_type: String,
    #[serde(default)]
    pub rel: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub href: String,
}

/// One extractable data collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionId,
    #[serde(rename = "itemType", default = "default_item_type")]
    pub item_type: ItemType,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Theme name. Doubles as the theme id.
    #[serde(default)]
    pub theme: String,
    #[serde(rename = "parent", default)]
    pub parent_id: String,
    #[serde(default)]
    pub parent_title: String,
    /// Sub-layer name inside the raster service.
    #[serde(default)]
    pub short_name: String,
    #[serde(default)]
    pub org_schema: String,
    /// Declared CRSs. Entries that are not EPSG codes are dropped on input.
    #[serde(rename = "crs", default, deserialize_with = "lenient_crs_list")]
    pub crs_list: Vec<Crs>,
    /// Largest area (km²) for which a full preview is allowed.
    #[serde(default)]
    pub max_extract_area: f64,
    #[serde(default)]
    pub links: Vec<Link>,
    /// Footprint, only present when a single collection is described.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkt: Option<String>,
}

fn default_item_type() -> ItemType {
    ItemType::Other
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrsEntry {
    Code(Crs),
    Named(String),
    Other(IgnoredAny),
}

/// One odd CRS (`"CRS84"`, an OGC URI) must not cost the whole catalog.
fn lenient_crs_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Crs>, D::Error> {
    let entries = Option::<Vec<CrsEntry>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            CrsEntry::Code(crs) => Some(crs),
            CrsEntry::Named(name) => {
                warn!(crs = %name, "ignoring non-EPSG CRS");
                None
            }
            CrsEntry::Other(_) => {
                warn!("ignoring unreadable CRS entry");
                None
            }
        })
        .collect())
}

impl Collection {
    /// Minimal constructor; remaining fields start empty.
    pub fn new(id: impl Into<CollectionId>, item_type: ItemType, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type,
            title: title.into(),
            description: String::new(),
            theme: String::new(),
            parent_id: String::new(),
            parent_title: String::new(),
            short_name: String::new(),
            org_schema: String::new(),
            crs_list: Vec::new(),
            max_extract_area: 0.0,
            links: Vec::new(),
            wkt: None,
        }
    }

    pub fn theme(&self) -> Theme {
        Theme {
            id: self.theme.clone(),
            title: self.theme.clone(),
        }
    }

    pub fn parent(&self) -> Parent {
        Parent {
            id: self.parent_id.clone(),
            title: self.parent_title.clone(),
        }
    }

    /// First declared CRS, the one clipped features come back in.
    pub fn native_crs(&self) -> Option<Crs> {
        self.crs_list.first().copied()
    }

    /// The canonical HTML metadata page, if the collection links one.
    pub fn canonical_metadata_link(&self) -> Option<&Link> {
        self.links
            .iter()
            .rev()
            .find(|l| l.media_type == "text/html" && l.rel == "canonical")
    }
}
