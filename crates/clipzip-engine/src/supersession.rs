//! Latest-wins gate for catalog loads.
//!
//! # Protocol
//!
//! ```text
//! ticket()            generation += 1, remember it         (synchronous)
//! enter(ticket)       wait for the gate, then:
//!                       ticket != generation -> Skipped(BeforeFetch)
//! ... fetch ...
//! guard.is_current()  ticket != generation -> Skipped(AfterFetch)
//! apply + resync      while still holding the gate
//! ```
//!
//! Tickets are taken when the request is made, not when it first runs, so
//! "latest" means most recently *initiated*. Nothing is cancelled: a stale
//! result is simply dropped when it arrives.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Proof that a load was requested, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Why a load was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A newer load was requested while this one waited for the gate.
    SupersededBeforeFetch { ticket: u64, current: u64 },
    /// A newer load was requested while this one was fetching.
    SupersededAfterFetch { ticket: u64, current: u64 },
}

/// Final state of one load request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied { generation: u64, collections: usize },
    Skipped(SkipReason),
    /// Reported through the error event.
    Failed,
}

impl LoadOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, LoadOutcome::Applied { .. })
    }
}

#[derive(Debug, Default)]
pub struct SupersessionGate {
    generation: AtomicU64,
    gate: Mutex<()>,
}

impl SupersessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request. Every earlier ticket is now stale.
    pub fn ticket(&self) -> LoadTicket {
        LoadTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Generation of the most recently requested load.
    pub fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.current() == ticket.0
    }

    /// Wait for exclusive access. Stale tickets give up once they get it.
    pub async fn enter(&self, ticket: LoadTicket) -> Result<GateGuard<'_>, SkipReason> {
        let guard = self.gate.lock().await;
        let current = self.current();
        if current != ticket.0 {
            debug!(ticket = ticket.0, current, "load superseded before fetch");
            return Err(SkipReason::SupersededBeforeFetch {
                ticket: ticket.0,
                current,
            });
        }
        Ok(GateGuard {
            gate: self,
            ticket,
            _guard: guard,
        })
    }
}

/// Held for the whole fetch-apply-resync sequence. Released on drop.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a SupersessionGate,
    ticket: LoadTicket,
    _guard: MutexGuard<'a, ()>,
}

impl GateGuard<'_> {
    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Second check, once the remote result is in hand.
    pub fn confirm(&self) -> Result<(), SkipReason> {
        let current = self.gate.current();
        if current != self.ticket.0 {
            debug!(ticket = self.ticket.0, current, "load superseded after fetch");
            return Err(SkipReason::SupersededAfterFetch {
                ticket: self.ticket.0,
                current,
            });
        }
        Ok(())
    }
}
