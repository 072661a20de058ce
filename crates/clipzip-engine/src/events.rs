//! Lifecycle events and their bus.
//!
//! Each engine owns one [`EventBus`], keyed by the id of the map it drives.
//! Presentation code subscribes to the kinds it renders; a subscription stops
//! receiving as soon as it is dropped or unsubscribed.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use clipzip_types::{CatalogSnapshot, CollectionId, JobId, Parent};
use strum::{Display, EnumDiscriminants};
use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::error::EngineError;
use crate::state::ViewedKind;

/// Operation an [`EngineEvent::Error`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ErrorScope {
    Load,
    ShowCollection,
    Extract,
    Poll,
    Order,
    Zoom,
}

/// Everything the engine announces.
#[derive(Debug, Clone, EnumDiscriminants)]
#[strum_discriminants(name(EventKind), derive(Hash, Display))]
pub enum EngineEvent {
    /// A catalog load got past supersession and is fetching.
    LoadStarted { generation: u64, has_geometry: bool },
    LoadEnded { generation: u64 },
    /// A new catalog snapshot is current.
    CatalogLoaded { snapshot: Arc<CatalogSnapshot> },
    ViewedUpdateStarted,
    ViewedFeatures { collection: CollectionId, features: usize },
    ViewedCoverage { collection: CollectionId },
    /// The drawn area is too large for a preview; only the footprint is shown.
    ViewedFootprint {
        collection: CollectionId,
        area_km2: f64,
        max_extract_area: f64,
    },
    /// A collection was checked while no area is drawn.
    FootprintWithoutArea { collection: CollectionId },
    ViewedUpdateEnded { viewed: Vec<(CollectionId, ViewedKind)> },
    CollectionChangedStarted {
        parent: Option<Parent>,
        checked: Vec<CollectionId>,
    },
    CollectionChangedEnded { viewed: Vec<(CollectionId, ViewedKind)> },
    ExtractStarted { job_id: JobId },
    JobProgress { job_id: JobId, progress: u8 },
    JobSucceeded { job_id: JobId, result_url: String },
    JobFailed { job_id: JobId, reason: String },
    JobDismissed { job_id: JobId, reason: String },
    /// Ids with a raise/lower in flight, after every change to that set.
    LayerOrdered { in_progress: Vec<CollectionId> },
    Error { scope: ErrorScope, error: EngineError },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        EventKind::from(self)
    }
}

/// Which events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Kinds(Vec<EventKind>),
}

impl EventFilter {
    pub fn matches(&self, kind: EventKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Kinds(kinds) => kinds.contains(&kind),
        }
    }
}

// ============================================================================
// EventBus
// ============================================================================

/// Broadcast bus for one map's engine events.
#[derive(Debug, Clone)]
pub struct EventBus {
    map_id: Arc<str>,
    tx: broadcast::Sender<EngineEvent>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(map_id: impl Into<Arc<str>>, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            map_id: map_id.into(),
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn map_id(&self) -> &str {
        &self.map_id
    }

    /// Publish an event. Returns how many subscriptions were live.
    pub fn emit(&self, event: EngineEvent) -> usize {
        let kind = event.kind();
        if let EngineEvent::Error { scope, error } = &event {
            warn!(map_id = %self.map_id, %scope, %error, "engine error");
        } else {
            trace!(map_id = %self.map_id, %kind, "engine event");
        }
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        Subscription {
            id: SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed)),
            filter,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscribe_all(&self) -> Subscription {
        self.subscribe(EventFilter::All)
    }

    pub fn subscribe_kind(&self, kind: EventKind) -> Subscription {
        self.subscribe(EventFilter::Kinds(vec![kind]))
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ============================================================================
// Subscription
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A filtered view of the bus.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    rx: broadcast::Receiver<EngineEvent>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next matching event. `None` once the engine is gone.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.filter.matches(event.kind()) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(subscription = %self.id, lagged = n, "event subscription lagged behind");
                }
            }
        }
    }

    /// Next matching event already queued, without waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.filter.matches(event.kind()) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Empty | broadcast::error::TryRecvError::Closed) => {
                    return None;
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(subscription = %self.id, lagged = n, "event subscription lagged behind");
                }
            }
        }
    }

    /// Every matching event already queued.
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(self) {
        trace!(subscription = %self.id, "unsubscribed");
    }
}
