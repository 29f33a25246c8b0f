//! HTTP access to remote METS documents and their page images.
//!
//! Everything the pipeline fetches goes through [`DocumentFetcher`], so
//! tests can run the whole import against canned documents.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::ImportConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),

    #[error("connection timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("document exceeds the size limit of {0} bytes")]
    TooLarge(usize),
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Lightweight existence probe, bounded by the probe timeout.
    /// A timeout counts as probe failure.
    async fn probe(&self, url: &str) -> Result<(), FetchError>;

    /// Fetch a METS document, size-capped
    async fn fetch_document(&self, url: &str) -> Result<String, FetchError>;

    /// Determine the pixel dimensions of a remote image from its header
    /// bytes. `Ok(None)` means the image exists but its size could not be
    /// read; only transport problems are errors.
    async fn image_dimensions(&self, url: &str) -> Result<Option<(u32, u32)>, FetchError>;
}

/// How many leading bytes are enough to read the dimensions out of common
/// image headers
const IMAGE_HEADER_RANGE: &str = "bytes=0-65535";

pub struct HttpFetcher {
    client: Client,
    probe_timeout: Duration,
    max_document_bytes: usize,
}

impl HttpFetcher {
    pub fn new(config: &ImportConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self {
            client,
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            max_document_bytes: config.max_document_bytes,
        })
    }

    fn map_error(err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Request(err.to_string())
        }
    }

    async fn get_bytes(&self, url: &str, range: Option<&str>) -> Result<Bytes, FetchError> {
        let mut request = self.client.get(url);
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range);
        }
        let response = request.send().await.map_err(Self::map_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        response.bytes().await.map_err(Self::map_error)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn probe(&self, url: &str) -> Result<(), FetchError> {
        let response = self
            .client
            .head(url)
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(Self::map_error)?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(FetchError::Status(status.as_u16()))
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        debug!(url, "Fetching document");
        let bytes = self.get_bytes(url, None).await?;
        if bytes.len() > self.max_document_bytes {
            return Err(FetchError::TooLarge(self.max_document_bytes));
        }
        debug!(url, size = bytes.len(), "Document fetched");
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn image_dimensions(&self, url: &str) -> Result<Option<(u32, u32)>, FetchError> {
        // Range requests keep this cheap; servers that ignore them just
        // send the full body
        let bytes = self.get_bytes(url, Some(IMAGE_HEADER_RANGE)).await?;
        match imagesize::blob_size(&bytes) {
            Ok(size) => Ok(Some((size.width as u32, size.height as u32))),
            Err(err) => {
                debug!(url, error = %err, "Could not read image dimensions");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetcher_builds_from_default_config() {
        let config = ImportConfig::default();
        let fetcher = HttpFetcher::new(&config).unwrap();
        assert_eq!(fetcher.probe_timeout, Duration::from_secs(30));
        assert_eq!(fetcher.max_document_bytes, 32 * 1024 * 1024);
    }
}
