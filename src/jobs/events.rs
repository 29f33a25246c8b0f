//! Typed change-notification topic for job mutations.
//!
//! Every state mutation of any job is published here. Subscribers that
//! watch a single job still need the full feed: a queued job's position
//! depends on every other queued job, so they recompute on each event and
//! de-duplicate on their side.

use tokio::sync::broadcast;
use tracing::debug;

use super::models::JobState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobChange {
    pub job_id: String,
    pub state: JobState,
}

#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<JobChange>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish a change; delivery is lossy when nobody listens
    pub fn publish(&self, change: JobChange) {
        debug!(job_id = %change.job_id, state = ?change.state, "Publishing job change");
        let _ = self.tx.send(change);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobChange> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
