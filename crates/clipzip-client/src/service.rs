//! Catalog and extraction service trait.
//!
//! The engine only sees this trait. [`crate::HttpCatalogService`] talks to
//! the real service; tests substitute in-memory fakes.

use async_trait::async_trait;
use clipzip_types::{Collection, Crs, JobId};

use crate::error::ServiceError;
use crate::wire::{ClipArea, ExtractionInputs, FeaturePage, JobResult, JobStatus};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Remote operations the engine and the CLI depend on.
///
/// Every method is a single request. None of them retry.
#[async_trait]
pub trait CatalogService: Send + Sync {
    // ========================================================================
    // Catalog
    // ========================================================================

    /// List the collections intersecting `geom_wkt` (all of them when `None`).
    async fn list_collections(
        &self,
        geom_wkt: Option<&str>,
        geom_crs: Crs,
        lang: &str,
    ) -> ServiceResult<Vec<Collection>>;

    /// Describe one collection, including its `wkt` footprint.
    async fn fetch_collection(&self, id: &str) -> ServiceResult<Collection>;

    /// Fetch the features of a collection, clipped to `clip` when given.
    async fn fetch_features(&self, id: &str, clip: Option<&ClipArea>)
    -> ServiceResult<FeaturePage>;

    // ========================================================================
    // Extraction
    // ========================================================================

    /// Queue an extraction. Returns the server-assigned job id.
    async fn submit_extraction(&self, inputs: ExtractionInputs) -> ServiceResult<JobId>;

    async fn job_status(&self, job_id: &JobId) -> ServiceResult<JobStatus>;

    /// Fetch the result of a successful job.
    async fn job_result(&self, job_id: &JobId) -> ServiceResult<JobResult>;
}
