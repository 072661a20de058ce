//! Selection synchronization engine.
//!
//! Keeps three things consistent while the user draws, checks and reorders:
//!
//! ```text
//!  drawn area ──▶ catalog snapshot ──▶ checked set ──▶ viewed map ──▶ MapHost
//!   (latest       (SupersessionGate)   (user intent)   (Reconciler)
//!    wins)
//! ```
//!
//! plus per-collection stacking ([`OrderingSerializer`]) and extraction jobs
//! polled to completion ([`JobTracker`]).
//!
//! The engine does no rendering or geometry math of its own; it drives a
//! [`MapHost`] and talks to the service through a
//! [`clipzip_client::CatalogService`].

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod events;
pub mod jobs;
pub mod map;
pub mod ordering;
pub mod reconciler;
pub mod render;
pub mod state;
pub mod supersession;

pub use config::{ConfigError, EngineConfig};
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use events::{EngineEvent, ErrorScope, EventBus, EventFilter, EventKind, Subscription, SubscriptionId};
pub use jobs::{Delay, JobHandle, JobTracker, TokioDelay};
pub use map::{
    Coord, DrawKind, DrawStyle, Extent, MapError, MapHost, MapResult, RasterEntry, RasterLayerConfig,
    Shape, ZoomOptions,
};
pub use ordering::{LayerKind, OrderingSerializer};
pub use reconciler::{KeyedLocks, Reconciler};
pub use state::{EngineState, ViewedEntry, ViewedHandle, ViewedKind};
pub use supersession::{LoadOutcome, LoadTicket, SkipReason, SupersessionGate};
