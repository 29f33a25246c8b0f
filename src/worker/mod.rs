//! Import worker pool.
//!
//! Each worker owns one receiver fed by the broker, claims jobs by marking
//! them started, runs the import to completion and persists the outcome.
//! A failed job never takes the worker down; it proceeds to the next one.

pub mod fetch;
pub mod runner;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::archive::ArchiveStore;
use crate::jobs::{ImportEnvelope, Orchestrator};
use crate::store::Repository;

use fetch::DocumentFetcher;

/// Everything a worker needs, cloneable per task
#[derive(Clone)]
pub struct WorkerContext {
    pub orchestrator: Arc<Orchestrator>,
    pub repository: Arc<Repository>,
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub archive: Option<Arc<ArchiveStore>>,
    pub base_url: String,
    pub image_probe_concurrency: usize,
}

/// Spawn one tokio task per receiver
pub fn spawn_workers(receivers: Vec<mpsc::Receiver<ImportEnvelope>>, context: WorkerContext) {
    for (worker_id, mut rx) in receivers.into_iter().enumerate() {
        let context = context.clone();
        tokio::spawn(async move {
            info!(worker_id, "Import worker started");
            while let Some(envelope) = rx.recv().await {
                process(worker_id, envelope, &context).await;
            }
            info!(worker_id, "Import worker stopped");
        });
    }
}

async fn process(worker_id: usize, envelope: ImportEnvelope, context: &WorkerContext) {
    let job_id = envelope.job_id.clone();

    if let Err(err) = context.orchestrator.mark_started(&job_id) {
        // Raced or recovered inconsistently; leave the record as-is
        warn!(worker_id, job_id, error = %err, "Could not claim job");
        return;
    }
    info!(worker_id, job_id, url = %envelope.source_url, "Import started");

    let result = runner::run_import(
        &envelope,
        &context.fetcher,
        &context.repository,
        context.archive.as_deref(),
        &context.base_url,
        context.image_probe_concurrency,
    )
    .await;

    let outcome = match result {
        Ok(reference) => {
            info!(worker_id, job_id, manifest_id = %reference.manifest_id, "Import finished");
            Ok(reference)
        }
        Err(err) => {
            error!(worker_id, job_id, error = %err, "Import failed");
            Err(runner::failure_info(&err))
        }
    };

    if let Err(err) = context.orchestrator.complete(&job_id, outcome) {
        error!(worker_id, job_id, error = %err, "Could not persist job outcome");
    }
}
