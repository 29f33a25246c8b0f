//! FIFO pending queue and the broker distributing jobs to workers.

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

const NEXT_SEQ_KEY: &[u8] = b"next_seq";

/// What a worker receives for one import job
#[derive(Debug, Clone)]
pub struct ImportEnvelope {
    pub seq: u64,
    pub job_id: String,
    pub source_url: String,
}

/// Persisted FIFO list of jobs that are queued but not yet started.
///
/// Entries are keyed by a big-endian sequence number, so iteration order
/// is submission order. A job leaves the list when its worker marks it
/// started; its position can therefore only decrease over time.
pub struct PendingQueue {
    keyspace: Keyspace,
    pending: PartitionHandle,
    meta: PartitionHandle,
    seq: AtomicU64,
}

impl PendingQueue {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening pending queue at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let pending = keyspace.open_partition("pending", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        let next_seq = meta
            .get(NEXT_SEQ_KEY)?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        Ok(Self {
            keyspace,
            pending,
            meta,
            seq: AtomicU64::new(next_seq),
        })
    }

    /// Append a job and return its sequence number
    pub fn push(&self, job_id: &str) -> Result<u64> {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.pending.insert(seq.to_be_bytes(), job_id.as_bytes())?;
        self.meta.insert(NEXT_SEQ_KEY, (seq + 1).to_be_bytes())?;
        debug!(seq, job_id, "Job enqueued");
        Ok(seq)
    }

    /// All pending entries in FIFO order
    pub fn entries(&self) -> Result<Vec<(u64, String)>> {
        let mut entries = Vec::new();
        for item in self.pending.iter() {
            let (key, value) = item?;
            let seq = u64::from_be_bytes(key.as_ref().try_into().unwrap_or([0u8; 8]));
            entries.push((seq, String::from_utf8_lossy(&value).to_string()));
        }
        Ok(entries)
    }

    /// Currently queued job IDs in FIFO order
    pub fn queued_ids(&self) -> Result<Vec<String>> {
        Ok(self.entries()?.into_iter().map(|(_, id)| id).collect())
    }

    /// Zero-based position of a job among the queued jobs, `None` once the
    /// job has left the list
    pub fn position(&self, job_id: &str) -> Result<Option<usize>> {
        Ok(self
            .queued_ids()?
            .iter()
            .position(|id| id == job_id))
    }

    /// Remove a job from the pending list; returns whether it was present
    pub fn remove(&self, job_id: &str) -> Result<bool> {
        for item in self.pending.iter() {
            let (key, value) = item?;
            if value.as_ref() == job_id.as_bytes() {
                self.pending.remove(key)?;
                debug!(job_id, "Job removed from pending list");
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Distributes queued imports to the worker pool.
///
/// A job is persisted to the pending list first, then handed to the next
/// worker round-robin over bounded mpsc channels. A closed worker channel
/// only loses the delivery, never the persisted entry.
pub struct ImportBroker {
    queue: Arc<PendingQueue>,
    channels: Vec<mpsc::Sender<ImportEnvelope>>,
    next_worker: AtomicUsize,
}

impl ImportBroker {
    pub fn new(
        queue: Arc<PendingQueue>,
        num_workers: usize,
        channel_size: usize,
    ) -> (Self, Vec<mpsc::Receiver<ImportEnvelope>>) {
        info!(num_workers, channel_size, "Creating import broker");

        let mut channels = Vec::with_capacity(num_workers);
        let mut receivers = Vec::with_capacity(num_workers);
        for _ in 0..num_workers {
            let (tx, rx) = mpsc::channel(channel_size.max(1));
            channels.push(tx);
            receivers.push(rx);
        }

        let broker = Self {
            queue,
            channels,
            next_worker: AtomicUsize::new(0),
        };
        (broker, receivers)
    }

    /// Enqueue a job: persist to the pending list, then deliver
    pub async fn dispatch(&self, job_id: &str, source_url: &str) -> Result<u64> {
        let seq = self.queue.push(job_id)?;
        self.deliver(ImportEnvelope {
            seq,
            job_id: job_id.to_string(),
            source_url: source_url.to_string(),
        })
        .await;
        Ok(seq)
    }

    /// Re-deliver an already-persisted entry (startup recovery)
    pub async fn redeliver(&self, envelope: ImportEnvelope) {
        self.deliver(envelope).await;
    }

    async fn deliver(&self, envelope: ImportEnvelope) {
        if self.channels.is_empty() {
            warn!(job_id = %envelope.job_id, "No workers attached, job stays pending");
            return;
        }
        let worker_idx = self.next_worker.fetch_add(1, Ordering::Relaxed) % self.channels.len();
        match self.channels[worker_idx].send(envelope.clone()).await {
            Ok(()) => debug!(seq = envelope.seq, worker_idx, "Job sent to worker"),
            Err(_) => {
                // Worker is gone; the entry is still persisted in the queue
                warn!(seq = envelope.seq, worker_idx, "Worker channel closed, job not delivered");
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }
}
