//! The job orchestrator: submission, status queries and worker-side
//! transitions, publishing a change event for every mutation.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::models::JobStatusView;
use crate::mets::{metadata, MetsDocument};
use crate::worker::fetch::DocumentFetcher;

use super::events::{ChangeFeed, JobChange};
use super::ledger::{JobError, JobLedger};
use super::models::{FailureInfo, ImportSnapshot, JobOutcome, JobRecord, JobState, ManifestRef};
use super::queue::{ImportBroker, ImportEnvelope, PendingQueue, QueueError};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Job(#[from] JobError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Why a submission was rejected; no job exists in either case
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("there is no METS available at the given URL: {0}")]
    UnreachableSource(String),

    #[error("the document is not a usable METS file: {0}")]
    MalformedDocument(String),

    #[error(transparent)]
    Internal(#[from] OrchestratorError),
}

pub struct Orchestrator {
    ledger: Arc<JobLedger>,
    queue: Arc<PendingQueue>,
    broker: Arc<ImportBroker>,
    changes: ChangeFeed,
    fetcher: Arc<dyn DocumentFetcher>,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<JobLedger>,
        queue: Arc<PendingQueue>,
        broker: Arc<ImportBroker>,
        changes: ChangeFeed,
        fetcher: Arc<dyn DocumentFetcher>,
    ) -> Self {
        Self {
            ledger,
            queue,
            broker,
            changes,
            fetcher,
        }
    }

    /// Submit a METS URL for import.
    ///
    /// The source must answer a bounded reachability probe before any job
    /// is created. The document is then fetched once to capture the
    /// metadata snapshot shown while the job is queued; a document without
    /// a METS root is rejected here instead of failing the job later.
    pub async fn submit(&self, mets_url: &str) -> Result<JobRecord, SubmitError> {
        self.fetcher
            .probe(mets_url)
            .await
            .map_err(|e| SubmitError::UnreachableSource(e.to_string()))?;

        let xml = self
            .fetcher
            .fetch_document(mets_url)
            .await
            .map_err(|e| SubmitError::UnreachableSource(e.to_string()))?;
        let snapshot = snapshot_from_document(&xml, mets_url)?;

        let job_id = Uuid::now_v7().to_string();
        let record = JobRecord::new(job_id.clone(), mets_url.to_string(), snapshot);
        self.ledger.put(&record).map_err(OrchestratorError::from)?;
        self.broker
            .dispatch(&job_id, mets_url)
            .await
            .map_err(OrchestratorError::from)?;
        self.changes.publish(JobChange {
            job_id: job_id.clone(),
            state: JobState::Queued,
        });

        info!(job_id, mets_url, "Import job submitted");
        Ok(record)
    }

    /// Current status view of a job, with the queue position for queued
    /// jobs (`None` when the job has raced out of the pending list)
    pub fn status(&self, job_id: &str) -> Result<Option<JobStatusView>, OrchestratorError> {
        let Some(record) = self.ledger.get(job_id)? else {
            return Ok(None);
        };
        let position = if record.state == JobState::Queued {
            self.queue.position(job_id)?
        } else {
            None
        };
        Ok(Some(JobStatusView::from_record(&record, position)))
    }

    /// Status views for every job still in the queued list. Started and
    /// terminal jobs are not included.
    pub fn list_queued(&self) -> Result<Vec<JobStatusView>, OrchestratorError> {
        let mut views = Vec::new();
        for (position, job_id) in self.queue.queued_ids()?.iter().enumerate() {
            match self.ledger.get(job_id)? {
                Some(record) if record.state == JobState::Queued => {
                    views.push(JobStatusView::from_record(&record, Some(position)));
                }
                Some(_) => {} // raced into started between listing and lookup
                None => warn!(job_id, "pending entry without a job record"),
            }
        }
        Ok(views)
    }

    /// Worker-side: claim a job. Removes it from the pending list, making
    /// every later queued job's position drop by one.
    pub fn mark_started(&self, job_id: &str) -> Result<JobRecord, OrchestratorError> {
        self.queue.remove(job_id)?;
        let record = self.ledger.transition(job_id, JobState::Started, None)?;
        self.changes.publish(JobChange {
            job_id: job_id.to_string(),
            state: JobState::Started,
        });
        Ok(record)
    }

    /// Worker-side: persist whichever outcome the job function returned
    pub fn complete(
        &self,
        job_id: &str,
        result: Result<ManifestRef, FailureInfo>,
    ) -> Result<JobRecord, OrchestratorError> {
        let (state, outcome) = match result {
            Ok(reference) => (JobState::Finished, JobOutcome::Finished(reference)),
            Err(failure) => (JobState::Failed, JobOutcome::Failed(failure)),
        };
        let record = self.ledger.transition(job_id, state, Some(outcome))?;
        self.changes.publish(JobChange {
            job_id: job_id.to_string(),
            state,
        });
        Ok(record)
    }

    /// Re-deliver pending entries left over from a previous run
    pub async fn redeliver_pending(&self) -> Result<usize, OrchestratorError> {
        let mut count = 0;
        for (seq, job_id) in self.queue.entries()? {
            match self.ledger.get(&job_id)? {
                Some(record) if record.state == JobState::Queued => {
                    self.broker
                        .redeliver(ImportEnvelope {
                            seq,
                            job_id,
                            source_url: record.source_url,
                        })
                        .await;
                    count += 1;
                }
                _ => {
                    // Entry no longer backed by a queued record
                    self.queue.remove(&job_id)?;
                }
            }
        }
        if count > 0 {
            info!(count, "Re-delivered pending jobs from a previous run");
        }
        Ok(count)
    }
}

fn snapshot_from_document(xml: &str, mets_url: &str) -> Result<ImportSnapshot, SubmitError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| SubmitError::MalformedDocument(format!("not well-formed XML: {e}")))?;
    let mets =
        MetsDocument::new(&doc).map_err(|e| SubmitError::MalformedDocument(e.to_string()))?;
    let meta = metadata::extract(&mets, Some(mets_url));
    Ok(ImportSnapshot {
        metsurl: mets_url.to_string(),
        label: meta.label(),
        thumbnail: meta.thumbnail,
        attribution: meta.attribution,
    })
}
