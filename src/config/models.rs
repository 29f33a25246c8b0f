use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub import: ImportConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            import: ImportConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

/// HTTP server and presentation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Public root URL used when minting IIIF identifiers,
    /// e.g. `https://iiif.example.org` (no trailing slash)
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Directory holding the fjall keyspaces
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Page size for manifest listings and IIIF collection pages
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            base_url: default_base_url(),
            data_path: default_data_path(),
            items_per_page: default_items_per_page(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_items_per_page() -> usize {
    20
}

/// Import pipeline settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportConfig {
    /// Number of import worker tasks
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Per-worker channel capacity
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Timeout for the submission-time reachability probe
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Timeout for fetching a METS document
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Upper bound on fetched document size
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,
    /// Concurrent image-dimension probes per job
    #[serde(default = "default_image_probe_concurrency")]
    pub image_probe_concurrency: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            queue_capacity: default_queue_capacity(),
            probe_timeout_secs: default_probe_timeout_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_document_bytes: default_max_document_bytes(),
            image_probe_concurrency: default_image_probe_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_workers() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    100
}

fn default_probe_timeout_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    120
}

fn default_max_document_bytes() -> usize {
    32 * 1024 * 1024 // 32 MB
}

fn default_image_probe_concurrency() -> usize {
    2
}

fn default_user_agent() -> String {
    format!("metsiiify/{}", env!("CARGO_PKG_VERSION"))
}

/// Raw document archival settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ArchiveConfig {
    /// When set, every fetched METS document is archived below this
    /// directory before transformation
    pub dump_mets: Option<PathBuf>,
}
