//! Client configuration constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Default service root for local development.
pub const DEFAULT_SERVICE_URL: &str = "http://localhost:5000";

/// Default language tag sent with catalog queries.
pub const DEFAULT_LANGUAGE: &str = "en-CA";

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection establishment timeout.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Name of the extraction process on the service.
pub const EXTRACT_PROCESS: &str = "extract";

/// `clip` mode sent with area-filtered feature queries. Mode 2 returns both
/// the intersecting geometry and its clipped part.
pub const CLIP_MODE: &str = "2";
