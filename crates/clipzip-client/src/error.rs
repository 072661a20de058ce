//! Service error taxonomy.
//!
//! Every failed call maps to exactly one variant. The engine relies on the
//! distinction between [`ServiceError::Precondition`] and
//! [`ServiceError::AreaTooLarge`] (actionable for the user) and everything
//! else (generic communication failure).

use thiserror::Error;

/// Which service call failed. Used in logs and error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Endpoint {
    Collections,
    Collection,
    Items,
    Extract,
    JobStatus,
    JobResults,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// No response at all: DNS, connect, TLS, timeout, broken body.
    #[error("failed to communicate with the server ({endpoint}): {message}")]
    Transport { endpoint: Endpoint, message: String },
    /// HTTP 412: the request needs a drawn area.
    #[error("no extraction area was drawn ({endpoint})")]
    Precondition { endpoint: Endpoint },
    /// HTTP 413: the drawn area exceeds what the service accepts.
    #[error("the extraction area is too large ({endpoint})")]
    AreaTooLarge { endpoint: Endpoint },
    /// Any other non-success status.
    #[error("server returned {status} for {endpoint}")]
    Status { endpoint: Endpoint, status: u16 },
    /// The body was not the JSON we expected.
    #[error("invalid response from {endpoint}: {message}")]
    Decode { endpoint: Endpoint, message: String },
}

impl ServiceError {
    /// Map a non-success HTTP status.
    ///
    /// 412/413 are only meaningful for calls that carry an area; elsewhere
    /// they are reported as plain status errors.
    pub fn from_status(endpoint: Endpoint, status: u16) -> Self {
        let carries_area = matches!(endpoint, Endpoint::Items | Endpoint::Extract);
        match status {
            412 if carries_area => ServiceError::Precondition { endpoint },
            413 if carries_area => ServiceError::AreaTooLarge { endpoint },
            _ => ServiceError::Status { endpoint, status },
        }
    }

    pub fn transport(endpoint: Endpoint, err: impl std::fmt::Display) -> Self {
        ServiceError::Transport {
            endpoint,
            message: err.to_string(),
        }
    }

    pub fn decode(endpoint: Endpoint, err: impl std::fmt::Display) -> Self {
        ServiceError::Decode {
            endpoint,
            message: err.to_string(),
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        match self {
            ServiceError::Transport { endpoint, .. }
            | ServiceError::Precondition { endpoint }
            | ServiceError::AreaTooLarge { endpoint }
            | ServiceError::Status { endpoint, .. }
            | ServiceError::Decode { endpoint, .. } => *endpoint,
        }
    }
}
