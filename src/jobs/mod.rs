//! Import job tracking: records, FIFO queue, broker, change notifications
//! and the orchestrator tying them together.

pub mod events;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod queue;

pub use events::{ChangeFeed, JobChange};
pub use ledger::{JobError, JobLedger};
pub use models::{FailureInfo, ImportSnapshot, JobOutcome, JobRecord, JobState, ManifestRef};
pub use orchestrator::{Orchestrator, OrchestratorError, SubmitError};
pub use queue::{ImportBroker, ImportEnvelope, PendingQueue, QueueError};
