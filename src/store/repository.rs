use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::iiif::types::{ImageInfo, Manifest};

use super::keys;
use super::Result;

const RECENCY_SEQ_KEY: &[u8] = b"recency_seq";

/// A stored manifest together with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord {
    pub id: String,
    pub origin: String,
    pub label: String,
    pub manifest: Manifest,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// One backing file of an image, as referenced by the source document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImageFile {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: String,
}

/// An image served through the Image API pass-through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: String,
    pub info: ImageInfo,
    pub files: Vec<StoredImageFile>,
}

impl ImageRecord {
    /// Resolve the backing URL for a validated Image API request.
    ///
    /// Requested dimensions must match a stored file exactly (this service
    /// never resizes). Without dimensions the largest known file wins.
    pub fn best_url(
        &self,
        format: Option<&str>,
        width: Option<u32>,
        height: Option<u32>,
    ) -> Option<&str> {
        let mut candidates = self
            .files
            .iter()
            .filter(|f| format.is_none_or(|fmt| f.format == fmt));
        if width.is_none() && height.is_none() {
            return candidates
                .max_by_key(|f| f.width.unwrap_or(0))
                .map(|f| f.url.as_str());
        }
        candidates
            .find(|f| {
                width.is_none_or(|w| f.width == Some(w))
                    && height.is_none_or(|h| f.height == Some(h))
            })
            .map(|f| f.url.as_str())
    }
}

/// Fjall-backed store for everything the API serves: manifests, identifier
/// mappings, image records and email subscriptions.
pub struct Repository {
    keyspace: Keyspace,
    manifests: PartitionHandle,
    origins: PartitionHandle,
    recency: PartitionHandle,
    identifiers: PartitionHandle,
    images: PartitionHandle,
    subscriptions: PartitionHandle,
    recipients: PartitionHandle,
    meta: PartitionHandle,
    recency_seq: AtomicU64,
}

impl Repository {
    /// Open or create a repository at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening repository at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let manifests = keyspace.open_partition("manifests", PartitionCreateOptions::default())?;
        let origins = keyspace.open_partition("origins", PartitionCreateOptions::default())?;
        let recency = keyspace.open_partition("recency", PartitionCreateOptions::default())?;
        let identifiers =
            keyspace.open_partition("identifiers", PartitionCreateOptions::default())?;
        let images = keyspace.open_partition("images", PartitionCreateOptions::default())?;
        let subscriptions =
            keyspace.open_partition("subscriptions", PartitionCreateOptions::default())?;
        let recipients = keyspace.open_partition("recipients", PartitionCreateOptions::default())?;
        let meta = keyspace.open_partition("meta", PartitionCreateOptions::default())?;

        let recency_seq = meta
            .get(RECENCY_SEQ_KEY)?
            .map(|bytes| u64::from_be_bytes(bytes.as_ref().try_into().unwrap_or([0u8; 8])))
            .unwrap_or(0);

        Ok(Self {
            keyspace,
            manifests,
            origins,
            recency,
            identifiers,
            images,
            subscriptions,
            recipients,
            meta,
            recency_seq: AtomicU64::new(recency_seq),
        })
    }

    /// Store a manifest. A new origin gets a recency entry; re-importing an
    /// existing manifest overwrites the record in place and keeps its
    /// position in the recency order.
    pub fn put_manifest(&self, record: &ManifestRecord) -> Result<()> {
        let key = keys::manifest_key(&record.id);
        let is_new = self.manifests.get(&key)?.is_none();

        self.manifests.insert(&key, serde_json::to_vec(record)?)?;
        self.origins
            .insert(keys::origin_key(&record.origin), record.id.as_bytes())?;

        if is_new {
            let seq = self.recency_seq.fetch_add(1, Ordering::SeqCst);
            self.recency
                .insert(keys::recency_key(seq), record.id.as_bytes())?;
            self.meta
                .insert(RECENCY_SEQ_KEY, (seq + 1).to_be_bytes())?;
        }

        debug!(manifest_id = %record.id, new = is_new, "Stored manifest");
        Ok(())
    }

    pub fn get_manifest(&self, manifest_id: &str) -> Result<Option<ManifestRecord>> {
        match self.manifests.get(keys::manifest_key(manifest_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Manifest ID previously assigned to a source URL, if any
    pub fn manifest_id_for_origin(&self, origin: &str) -> Result<Option<String>> {
        Ok(self
            .origins
            .get(keys::origin_key(origin))?
            .map(|v| String::from_utf8_lossy(&v).to_string()))
    }

    pub fn manifest_count(&self) -> Result<usize> {
        let mut count = 0;
        for item in self.recency.iter() {
            item?;
            count += 1;
        }
        Ok(count)
    }

    /// One page of manifests, newest first. `page` is 1-based.
    pub fn recent_manifests(
        &self,
        page: usize,
        per_page: usize,
    ) -> Result<(Vec<ManifestRecord>, usize)> {
        let total = self.manifest_count()?;
        let mut records = Vec::with_capacity(per_page);
        for item in self
            .recency
            .iter()
            .skip(page.saturating_sub(1) * per_page)
            .take(per_page)
        {
            let (_, value) = item?;
            let manifest_id = String::from_utf8_lossy(&value).to_string();
            if let Some(record) = self.get_manifest(&manifest_id)? {
                records.push(record);
            }
        }
        Ok((records, total))
    }

    /// Register an external identifier for a manifest.
    ///
    /// Idempotent for the same pair; registering a different manifest for
    /// an existing identifier overwrites it (intentional last-write-wins).
    pub fn register_identifier(&self, external_id: &str, manifest_id: &str) -> Result<()> {
        self.identifiers
            .insert(keys::identifier_key(external_id), manifest_id.as_bytes())?;
        debug!(external_id, manifest_id, "Registered identifier");
        Ok(())
    }

    pub fn resolve_identifier(&self, external_id: &str) -> Result<Option<String>> {
        Ok(self
            .identifiers
            .get(keys::identifier_key(external_id))?
            .map(|v| String::from_utf8_lossy(&v).to_string()))
    }

    pub fn put_image(&self, record: &ImageRecord) -> Result<()> {
        self.images
            .insert(keys::image_key(&record.id), serde_json::to_vec(record)?)?;
        Ok(())
    }

    pub fn get_image(&self, image_id: &str) -> Result<Option<ImageRecord>> {
        match self.images.get(keys::image_key(image_id))? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// Record an email subscription for a set of jobs and return every job
    /// the address is now subscribed to.
    pub fn subscribe(&self, email: &str, job_ids: &[String]) -> Result<Vec<String>> {
        for job_id in job_ids {
            self.subscriptions
                .insert(keys::subscription_key(email, job_id), b"")?;
            self.recipients
                .insert(keys::recipient_key(job_id, email), b"")?;
        }

        let mut jobs = Vec::new();
        for item in self.subscriptions.prefix(keys::subscription_prefix(email)) {
            let (key, _) = item?;
            if let Some(job_id) = keys::decode_subscription_job(&key, email) {
                jobs.push(job_id);
            }
        }
        Ok(jobs)
    }

    /// All recipient addresses subscribed to a job
    pub fn recipients_for_job(&self, job_id: &str) -> Result<Vec<String>> {
        let mut emails = Vec::new();
        for item in self.recipients.prefix(keys::recipient_prefix(job_id)) {
            let (key, _) = item?;
            if let Some(email) = keys::decode_recipient_email(&key, job_id) {
                emails.push(email);
            }
        }
        Ok(emails)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}
