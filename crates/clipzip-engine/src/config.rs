//! Engine configuration, loaded from RON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```ron
//! (
//!     service_url: "https://czs-pygeoapi.ddr-stage.services.geo.ca",
//!     language: "fr-CA",
//! )
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clipzip_client::constants::{DEFAULT_LANGUAGE, DEFAULT_SERVICE_URL};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    EVENT_CAPACITY, JOB_POLL_INTERVAL, LAYER_POLL_INTERVAL, LAYER_READY_TIMEOUT,
    RASTER_SERVICE_ROOT, ZOOM_DURATION, ZOOM_PADDING,
};
use crate::map::ZoomOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Root of the catalog/extraction service.
    pub service_url: String,
    /// Language tag sent with catalog queries.
    pub language: String,
    /// Root of the raster (WMS) service.
    pub raster_service_root: String,
    pub job_poll_interval_ms: u64,
    pub layer_poll_interval_ms: u64,
    pub layer_ready_timeout_ms: u64,
    pub zoom_padding: f64,
    pub zoom_duration_ms: u64,
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            raster_service_root: RASTER_SERVICE_ROOT.to_string(),
            job_poll_interval_ms: JOB_POLL_INTERVAL.as_millis() as u64,
            layer_poll_interval_ms: LAYER_POLL_INTERVAL.as_millis() as u64,
            layer_ready_timeout_ms: LAYER_READY_TIMEOUT.as_millis() as u64,
            zoom_padding: ZOOM_PADDING,
            zoom_duration_ms: ZOOM_DURATION.as_millis() as u64,
            event_capacity: EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_millis(self.job_poll_interval_ms)
    }

    pub fn layer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.layer_poll_interval_ms)
    }

    pub fn layer_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.layer_ready_timeout_ms)
    }

    pub fn zoom_options(&self) -> ZoomOptions {
        ZoomOptions::uniform(self.zoom_padding, Duration::from_millis(self.zoom_duration_ms))
    }
}
