//! Catalog model and job records for clipzip.
//!
//! This crate is the data foundation shared by the service client and the
//! selection engine. It has **no internal clipzip dependencies** and no
//! behavior beyond construction and lookup.
//!
//! # Entity Overview
//!
//! ```text
//! CatalogSnapshot (one successful catalog load)
//!     └── features:  Vec<ThemeCollections>
//!     └── coverages: Vec<ThemeCollections>
//!             └── Theme
//!             └── parents: Vec<ParentCollections>
//!                     └── Parent
//!                     └── collections: Vec<Collection>
//!     └── index: CollectionId → Collection (flat lookup)
//!
//! JobRecord (one extraction request)
//!     └── JobId (server-issued, or local UUID when dismissed)
//!     └── JobState: Polling → Succeeded | Failed, or Dismissed
//! ```
//!
//! # Key Types
//!
//! |------------------------|---------------------------------------------|
//! | Type                   | Purpose                                     |
//! |------------------------|---------------------------------------------|
//! | [`Collection`]         | One extractable data collection             |
//! | [`CatalogSnapshot`]    | Immutable regrouped catalog + lookup index  |
//! | [`ThemeCollections`]   | Theme → parents grouping for presentation   |
//! | [`ParentCollections`]  | Parent → collections grouping               |
//! | [`Crs`]                | EPSG code                                   |
//! | [`JobRecord`]          | Extraction job lifecycle record             |
//! |------------------------|---------------------------------------------|

pub mod catalog;
pub mod collection;
pub mod crs;
pub mod ids;
pub mod job;

pub use catalog::{CatalogSnapshot, ParentCollections, ThemeCollections};
pub use collection::{Collection, ItemType, Link, Parent, Theme};
pub use crs::{Crs, CrsParseError};
pub use ids::{CollectionId, JobId};
pub use job::{JobRecord, JobState, JobTransitionError};
