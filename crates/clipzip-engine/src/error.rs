//! Engine error taxonomy.
//!
//! Public engine operations never return these past their boundary: they are
//! reported as [`crate::EngineEvent::Error`] and degrade only the operation
//! that raised them.

use std::time::Duration;

use clipzip_client::{Endpoint, ServiceError};
use clipzip_types::CollectionId;
use thiserror::Error;

use crate::map::MapError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Map(MapError),
    /// An operation needed a drawn area and there is none.
    #[error("no extraction area is drawn")]
    NoGeometry,
    #[error("layer {id:?} was not ready after {waited:?}")]
    LayerTimeout { id: String, waited: Duration },
    #[error("collection {0} has no footprint")]
    MissingFootprint(CollectionId),
    /// Warning only: the collection reaches past the basemap.
    #[error("collection {0} extends outside the basemap limits")]
    OutOfBounds(CollectionId),
}

impl From<MapError> for EngineError {
    fn from(err: MapError) -> Self {
        match err {
            MapError::LayerTimeout { id, waited } => EngineError::LayerTimeout { id, waited },
            other => EngineError::Map(other),
        }
    }
}

impl EngineError {
    /// Text suitable for showing to the person at the map.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::NoGeometry
            | EngineError::Service(ServiceError::Precondition { .. }) => {
                "Please draw an extraction area.".to_string()
            }
            EngineError::Service(ServiceError::AreaTooLarge { .. }) => {
                "Your extraction area is too big.".to_string()
            }
            EngineError::Service(err) => {
                let what = match err.endpoint() {
                    Endpoint::Collections => "retrieve the collections",
                    Endpoint::Collection => "get the footprint of the collection",
                    Endpoint::Items => "fetch the features of the collection",
                    Endpoint::Extract => "extract the data",
                    Endpoint::JobStatus => "check the job status",
                    Endpoint::JobResults => "check the job results",
                };
                format!("Failed to communicate with the server to {what}.")
            }
            EngineError::OutOfBounds(_) => {
                "The collection extends outside the limits of the basemap.".to_string()
            }
            EngineError::Map(_) | EngineError::LayerTimeout { .. } | EngineError::MissingFootprint(_) => {
                "The collection could not be shown on the map.".to_string()
            }
        }
    }

    /// Whether the user can fix this by changing the drawn area.
    pub fn is_area_problem(&self) -> bool {
        matches!(
            self,
            EngineError::NoGeometry
                | EngineError::Service(ServiceError::Precondition { .. })
                | EngineError::Service(ServiceError::AreaTooLarge { .. })
        )
    }
}
