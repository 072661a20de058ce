//! reqwest-backed [`CatalogService`].

use async_trait::async_trait;
use clipzip_types::{Collection, Crs, JobId};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::constants::{CLIP_MODE, CONNECT_TIMEOUT, EXTRACT_PROCESS, REQUEST_TIMEOUT};
use crate::error::{Endpoint, ServiceError};
use crate::service::{CatalogService, ServiceResult};
use crate::wire::{
    ClipArea, CollectionsQuery, CollectionsResponse, ExtractionInputs, ExtractionRequest,
    FeaturePage, JobAccepted, JobResult, JobStatus,
};

/// HTTP client for the catalog and extraction endpoints.
#[derive(Clone, Debug)]
pub struct HttpCatalogService {
    client: Client,
    base_url: String,
}

impl HttpCatalogService {
    /// Build a client rooted at `base_url` (trailing slashes are ignored).
    pub fn new(base_url: impl Into<String>) -> ServiceResult<Self> {
        let base_url = base_url.into();
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::transport(Endpoint::Collections, e))?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use a preconfigured reqwest client.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Send a request and decode a JSON body from a success response.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> ServiceResult<T> {
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| ServiceError::transport(endpoint, e))?;

        let status = response.status();
        if !(status == StatusCode::OK || status == StatusCode::CREATED) {
            warn!(%endpoint, status = status.as_u16(), "service call failed");
            return Err(ServiceError::from_status(endpoint, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ServiceError::transport(endpoint, e))?;
        serde_json::from_slice(&body).map_err(|e| ServiceError::decode(endpoint, e))
    }
}

#[async_trait]
impl CatalogService for HttpCatalogService {
    #[instrument(skip(self, geom_wkt), fields(has_geom = geom_wkt.is_some()))]
    async fn list_collections(
        &self,
        geom_wkt: Option<&str>,
        geom_crs: Crs,
        lang: &str,
    ) -> ServiceResult<Vec<Collection>> {
        let body = CollectionsQuery {
            geom: geom_wkt.map(str::to_string),
            geom_crs,
        };
        let request = self
            .client
            .post(self.url("/collections"))
            .query(&[("f", "json"), ("lang", lang)])
            .json(&body);

        let response: CollectionsResponse = self.send(Endpoint::Collections, request).await?;
        debug!(count = response.collections.len(), "collections listed");
        Ok(response.collections)
    }

    #[instrument(skip(self))]
    async fn fetch_collection(&self, id: &str) -> ServiceResult<Collection> {
        let request = self
            .client
            .get(self.url(&format!("/collections/{id}")))
            .query(&[("f", "json")]);
        self.send(Endpoint::Collection, request).await
    }

    #[instrument(skip(self, clip), fields(clipped = clip.is_some()))]
    async fn fetch_features(
        &self,
        id: &str,
        clip: Option<&ClipArea>,
    ) -> ServiceResult<FeaturePage> {
        let mut request = self
            .client
            .get(self.url(&format!("/collections/{id}/items")))
            .query(&[("f", "json")]);
        if let Some(clip) = clip {
            let crs = clip.crs.code().to_string();
            request = request.query(&[
                ("geom", clip.wkt.as_str()),
                ("geom-crs", crs.as_str()),
                ("clip", CLIP_MODE),
            ]);
        }

        let page: FeaturePage = self.send(Endpoint::Items, request).await?;
        debug!(returned = page.number_returned, matched = page.number_matched, "features fetched");
        Ok(page)
    }

    #[instrument(skip(self, inputs), fields(collections = inputs.collections.len()))]
    async fn submit_extraction(&self, inputs: ExtractionInputs) -> ServiceResult<JobId> {
        let request = self
            .client
            .post(self.url(&format!("/processes/{EXTRACT_PROCESS}/execution")))
            .json(&ExtractionRequest { inputs });

        let accepted: JobAccepted = self.send(Endpoint::Extract, request).await?;
        debug!(job_id = %accepted.job_id, "extraction accepted");
        Ok(accepted.job_id)
    }

    #[instrument(skip(self))]
    async fn job_status(&self, job_id: &JobId) -> ServiceResult<JobStatus> {
        let request = self
            .client
            .get(self.url(&format!("/jobs/{job_id}")))
            .query(&[("f", "json")]);
        self.send(Endpoint::JobStatus, request).await
    }

    #[instrument(skip(self))]
    async fn job_result(&self, job_id: &JobId) -> ServiceResult<JobResult> {
        let request = self
            .client
            .get(self.url(&format!("/jobs/{job_id}/results")))
            .query(&[("f", "json")]);
        self.send(Endpoint::JobResults, request).await
    }
}
