//! Fjall-based persistence for manifests, identifier mappings, image
//! records and email subscriptions.
//!
//! Partition layout:
//! - `manifests`: manifest:{id} -> ManifestRecord (JSON)
//! - `origins`: origin:{source_url} -> manifest_id
//! - `recency`: (u64::MAX - seq) big-endian -> manifest_id (newest first)
//! - `identifiers`: ident:{external_id} -> manifest_id
//! - `images`: image:{id} -> ImageRecord (JSON)
//! - `subscriptions`: sub:{email}:{job_id} -> ""
//! - `recipients`: rcpt:{job_id}:{email} -> ""
//! - `meta`: recency_seq -> u64 (counter)

pub mod keys;
pub mod repository;

pub use repository::{ImageRecord, ManifestRecord, Repository, StoredImageFile};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
