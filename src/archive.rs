//! Optional archival of fetched METS documents.
//!
//! When `archive.dump_mets` is configured, the worker stores every raw
//! document before transforming it, so failed imports can be reproduced
//! without hitting the source again.

use std::path::Path;
use std::sync::Arc;

use object_store::{local::LocalFileSystem, path::Path as StoragePath, ObjectStore};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Clone)]
pub struct ArchiveStore {
    store: Arc<dyn ObjectStore>,
}

impl ArchiveStore {
    /// Archive into a local directory
    pub fn local(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        Ok(Self {
            store: Arc::new(LocalFileSystem::new_with_prefix(root)?),
        })
    }

    /// In-memory archive for tests
    pub fn in_memory() -> Self {
        Self {
            store: Arc::new(object_store::memory::InMemory::new()),
        }
    }

    fn document_path(job_id: &str) -> StoragePath {
        StoragePath::from(format!("mets/{job_id}.xml"))
    }

    pub async fn archive_document(&self, job_id: &str, xml: &[u8]) -> Result<()> {
        let path = Self::document_path(job_id);
        self.store.put(&path, xml.to_vec().into()).await?;
        tracing::debug!(job_id, size = xml.len(), "Archived METS document");
        Ok(())
    }

    pub async fn retrieve_document(&self, job_id: &str) -> Result<Vec<u8>> {
        let path = Self::document_path(job_id);
        let result = self.store.get(&path).await?;
        Ok(result.bytes().await?.to_vec())
    }
}
