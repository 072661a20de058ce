//! Client for the clipzip catalog and extraction service.
//!
//! ```text
//! POST /collections                       list collections for an area
//! GET  /collections/{id}                  describe one collection (footprint)
//! GET  /collections/{id}/items            features, optionally clipped
//! POST /processes/extract/execution       queue an extraction job
//! GET  /jobs/{id}                         job status + progress
//! GET  /jobs/{id}/results                 download URL of a finished job
//! ```
//!
//! [`CatalogService`] is the seam the engine depends on;
//! [`HttpCatalogService`] is the reqwest implementation.

pub mod constants;
pub mod error;
pub mod http;
pub mod service;
pub mod wire;

pub use error::{Endpoint, ServiceError};
pub use http::HttpCatalogService;
pub use service::{CatalogService, ServiceResult};
pub use wire::{
    ClipArea, ExtractionInputs, Feature, FeaturePage, JobResult, JobStatus, JobStatusKind,
};
