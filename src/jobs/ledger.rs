//! Fjall-backed storage of job records with transition enforcement.

use std::path::Path;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use thiserror::Error;
use tracing::{debug, info};

use super::models::{JobOutcome, JobRecord, JobState};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid transition for job {job_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        job_id: String,
        from: JobState,
        to: JobState,
    },
}

pub type Result<T> = std::result::Result<T, JobError>;

fn job_key(job_id: &str) -> Vec<u8> {
    format!("job:{job_id}").into_bytes()
}

/// Persistent job records. Each record is mutated only through
/// [`JobLedger::transition`], which enforces the monotonic state machine.
pub struct JobLedger {
    keyspace: Keyspace,
    jobs: PartitionHandle,
}

impl JobLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening job ledger at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let jobs = keyspace.open_partition("jobs", PartitionCreateOptions::default())?;

        Ok(Self { keyspace, jobs })
    }

    /// Store a freshly created (queued) record
    pub fn put(&self, record: &JobRecord) -> Result<()> {
        self.jobs
            .insert(job_key(&record.id), serde_json::to_vec(record)?)?;
        debug!(job_id = %record.id, state = ?record.state, "Stored job record");
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<JobRecord>> {
        match self.jobs.get(job_key(job_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Advance a job to `to`, attaching the outcome for terminal states.
    /// Any non-monotonic transition is rejected.
    pub fn transition(
        &self,
        job_id: &str,
        to: JobState,
        outcome: Option<JobOutcome>,
    ) -> Result<JobRecord> {
        let mut record = self
            .get(job_id)?
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        if !record.state.can_advance_to(to) {
            return Err(JobError::InvalidTransition {
                job_id: job_id.to_string(),
                from: record.state,
                to,
            });
        }

        record.state = to;
        record.outcome = outcome;
        record.updated_at = chrono::Utc::now();
        self.jobs
            .insert(job_key(job_id), serde_json::to_vec(&record)?)?;
        debug!(job_id, state = ?to, "Job transitioned");
        Ok(record)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
