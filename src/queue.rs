//! Offline queue and sync.
//!
//! The queue buffers classified attendance outcomes while the backend is
//! unreachable and flushes them opportunistically. It is a bounded-concern
//! append/flush log, not a transactional store: a flush carries the whole
//! queue in one round-trip and is all-or-nothing. On failure the queue is
//! left intact, in order, and no retry is scheduled; the next
//! connectivity-restored event or manual trigger drives the next attempt.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{ScanOutcome, ScanStatus};

/// Delivering a batch to the backend failed. The queue is preserved.
#[derive(Clone, Debug)]
pub struct SyncFailure {
    pub reason: String,
}

impl std::fmt::Display for SyncFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sync failed: {}", self.reason)
    }
}

impl std::error::Error for SyncFailure {}

/// One buffered outcome plus its monotonic sequence id.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueEntry {
    pub seq: u64,
    pub outcome: ScanOutcome,
}

/// Batch-in, ack-out seam to the backend.
pub trait SyncEndpoint {
    /// Deliver the whole batch. `Ok` acknowledges every entry; any error
    /// means none were accepted.
    fn push_batch(&mut self, batch: &[QueueEntry]) -> Result<()>;
}

/// Sync endpoint that logs and acknowledges. Used by the demo daemon.
pub struct LogSyncEndpoint;

impl SyncEndpoint for LogSyncEndpoint {
    fn push_batch(&mut self, batch: &[QueueEntry]) -> Result<()> {
        log::info!("sync: delivered batch of {} entries", batch.len());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Syncing,
}

/// Ordered buffer of pending outcomes with single-flight flushing.
pub struct OfflineQueue {
    entries: Vec<QueueEntry>,
    next_seq: u64,
    state: SyncState,
    online: bool,
}

impl OfflineQueue {
    pub fn new(online: bool) -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
            state: SyncState::Idle,
            online,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Number of entries awaiting delivery (the pending-count indicator).
    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    /// Buffer an outcome for later delivery. Appends only when the system
    /// is offline or a sync is in progress, and never for `Unknown`
    /// outcomes (only classified attendance is reconciled with the
    /// backend). Returns whether the outcome was queued.
    pub fn enqueue(&mut self, outcome: &ScanOutcome) -> bool {
        if outcome.status == ScanStatus::Unknown {
            return false;
        }
        if self.online && self.state == SyncState::Idle {
            return false;
        }
        let entry = QueueEntry {
            seq: self.next_seq,
            outcome: outcome.clone(),
        };
        self.next_seq += 1;
        self.entries.push(entry);
        log::debug!("queued outcome, {} pending", self.entries.len());
        true
    }

    /// Record a connectivity transition. Coming back online triggers
    /// exactly one automatic flush; repeated online notifications do not.
    pub fn set_online(&mut self, online: bool, endpoint: &mut dyn SyncEndpoint) {
        let was_online = self.online;
        self.online = online;
        if online && !was_online {
            log::info!("connectivity restored, {} pending", self.entries.len());
            self.flush(endpoint);
        }
    }

    /// Attempt one delivery of the entire queue.
    ///
    /// No-op when offline, already syncing, or empty. Success clears the
    /// queue; failure leaves every entry intact and in order. Either way
    /// the queue returns to `Idle` with no retry scheduled.
    pub fn flush(&mut self, endpoint: &mut dyn SyncEndpoint) {
        if !self.online || self.state == SyncState::Syncing || self.entries.is_empty() {
            return;
        }
        self.state = SyncState::Syncing;
        match endpoint.push_batch(&self.entries) {
            Ok(()) => {
                log::info!("sync: flushed {} entries", self.entries.len());
                self.entries.clear();
            }
            Err(e) => {
                log::warn!(
                    "{}",
                    SyncFailure {
                        reason: format!("{} ({} entries kept)", e, self.entries.len()),
                    }
                );
            }
        }
        self.state = SyncState::Idle;
    }
}
