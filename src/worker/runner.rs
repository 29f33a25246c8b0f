//! The import job function: fetch, transform and persist one document.
//!
//! Returns `Result<ManifestRef, ImportError>`; the worker converts any
//! error into a [`FailureInfo`] and the orchestrator persists whichever
//! variant it receives. Nothing is written to the repository before the
//! whole manifest has been built.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::archive::ArchiveStore;
use crate::iiif::{build_image_info, build_manifest};
use crate::jobs::{FailureInfo, ImportEnvelope, ManifestRef};
use crate::mets::{metadata, structure, DocumentMetadata, MetsDocument, MetsError, Page};
use crate::store::{ImageRecord, ManifestRecord, Repository, StoreError, StoredImageFile};

use super::fetch::{DocumentFetcher, FetchError};

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to fetch document")]
    Fetch(#[source] FetchError),

    #[error("document is not well-formed XML")]
    Xml(#[source] roxmltree::Error),

    #[error(transparent)]
    Mets(#[from] MetsError),

    #[error("document references no importable page images")]
    NoImages,

    #[error("failed to persist import")]
    Store(#[source] StoreError),
}

impl ImportError {
    /// Short type name recorded in the failure descriptor
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Fetch(_) => "FetchFailed",
            ImportError::Xml(_) => "MalformedXml",
            ImportError::Mets(_) => "MalformedDocument",
            ImportError::NoImages => "NoImages",
            ImportError::Store(_) => "StorageFailure",
        }
    }
}

/// Capture an import error as the failure descriptor stored on the job
pub fn failure_info(err: &ImportError) -> FailureInfo {
    let mut trace = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        trace.push_str("\ncaused by: ");
        trace.push_str(&cause.to_string());
        source = cause.source();
    }
    FailureInfo {
        kind: err.kind().to_string(),
        message: err.to_string(),
        trace,
    }
}

/// Run one import to completion.
pub async fn run_import(
    envelope: &ImportEnvelope,
    fetcher: &Arc<dyn DocumentFetcher>,
    repository: &Repository,
    archive: Option<&ArchiveStore>,
    base_url: &str,
    image_probe_concurrency: usize,
) -> Result<ManifestRef, ImportError> {
    let xml = fetcher
        .fetch_document(&envelope.source_url)
        .await
        .map_err(ImportError::Fetch)?;

    if let Some(archive) = archive {
        if let Err(err) = archive.archive_document(&envelope.job_id, xml.as_bytes()).await {
            warn!(job_id = %envelope.job_id, error = %err, "Failed to archive METS document");
        }
    }

    let doc = roxmltree::Document::parse(&xml).map_err(ImportError::Xml)?;
    let mets = MetsDocument::new(&doc)?;
    let meta = metadata::extract(&mets, Some(&envelope.source_url));
    let mut pages = structure::resolve_pages(&mets);
    if pages.is_empty() {
        return Err(ImportError::NoImages);
    }
    let toc = structure::toc_entries(&mets);

    probe_dimensions(&mut pages, fetcher, image_probe_concurrency).await;

    let manifest_id = manifest_identity(repository, &meta, &envelope.source_url)?;
    let manifest = build_manifest(&meta, &pages, &toc, &manifest_id, base_url);
    let images = image_records(&pages, base_url);
    let record = ManifestRecord {
        id: manifest_id.clone(),
        origin: envelope.source_url.clone(),
        label: manifest.label.clone(),
        manifest,
        created_at: chrono::Utc::now(),
    };

    // All writes happen only after the complete graph has been built
    for image in &images {
        repository.put_image(image).map_err(ImportError::Store)?;
    }
    repository.put_manifest(&record).map_err(ImportError::Store)?;
    repository
        .register_identifier(&envelope.source_url, &manifest_id)
        .map_err(ImportError::Store)?;
    for (_, value) in &meta.identifiers {
        repository
            .register_identifier(value, &manifest_id)
            .map_err(ImportError::Store)?;
    }

    Ok(ManifestRef {
        manifest_url: format!("{base_url}/iiif/{manifest_id}/manifest"),
        manifest_id,
    })
}

/// Fill in missing pixel dimensions with a bounded number of concurrent
/// probes. Unreadable images keep unknown dimensions; the build falls back
/// to nominal canvas sizes for those.
async fn probe_dimensions(
    pages: &mut [Page],
    fetcher: &Arc<dyn DocumentFetcher>,
    concurrency: usize,
) {
    let mut seen = HashSet::new();
    let urls: Vec<String> = pages
        .iter()
        .flat_map(|page| page.images.iter())
        .filter(|image| image.width.is_none())
        .map(|image| image.url.clone())
        .filter(|url| seen.insert(url.clone()))
        .collect();

    let resolved: HashMap<String, (u32, u32)> = stream::iter(urls)
        .map(|url| {
            let fetcher = fetcher.clone();
            async move {
                let dims = fetcher.image_dimensions(&url).await;
                (url, dims)
            }
        })
        .buffer_unordered(concurrency.max(1))
        .filter_map(|(url, dims)| async move {
            match dims {
                Ok(Some(dims)) => Some((url, dims)),
                Ok(None) => {
                    warn!(url, "image dimensions unreadable");
                    None
                }
                Err(err) => {
                    warn!(url, error = %err, "image dimension probe failed");
                    None
                }
            }
        })
        .collect()
        .await;

    for page in pages {
        for image in &mut page.images {
            if let Some(&(width, height)) = resolved.get(&image.url) {
                image.width = Some(width);
                image.height = Some(height);
            }
        }
    }
}

/// Manifest identity: an already-imported origin keeps its ID; otherwise
/// the document's primary identifier (URN preferred) or, lacking any, a
/// stable UUID derived from the source URL.
fn manifest_identity(
    repository: &Repository,
    meta: &DocumentMetadata,
    origin: &str,
) -> Result<String, ImportError> {
    if let Some(existing) = repository
        .manifest_id_for_origin(origin)
        .map_err(ImportError::Store)?
    {
        return Ok(existing);
    }

    let preferred = meta
        .identifiers
        .iter()
        .find(|(id_type, _)| id_type == "urn")
        .or_else(|| meta.identifiers.iter().find(|(id_type, _)| id_type == "purl"))
        .or_else(|| meta.identifiers.first());

    Ok(match preferred {
        Some((_, value)) => sanitize_identifier(value),
        None => Uuid::new_v5(&Uuid::NAMESPACE_URL, origin.as_bytes()).to_string(),
    })
}

/// Identifiers become URL path segments, so path-hostile characters are
/// replaced
fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c == '/' || c == '?' || c == '#' || c.is_whitespace() {
                '-'
            } else {
                c
            }
        })
        .collect()
}

fn image_records(pages: &[Page], base_url: &str) -> Vec<ImageRecord> {
    pages
        .iter()
        .map(|page| {
            let image_id = page.image_id();
            let sizes: Vec<(u32, u32)> = page
                .images
                .iter()
                .filter_map(|image| Some((image.width?, image.height?)))
                .collect();
            ImageRecord {
                info: build_image_info(&image_id, &sizes, base_url),
                files: page
                    .images
                    .iter()
                    .map(|image| StoredImageFile {
                        url: image.url.clone(),
                        width: image.width,
                        height: image.height,
                        format: canonical_format(&image.mimetype),
                    })
                    .collect(),
                id: image_id,
            }
        })
        .collect()
}

/// The nonstandard `image/jpg` spelling is folded into the canonical type
/// so Image API format matching works
fn canonical_format(mimetype: &str) -> String {
    if mimetype == "image/jpg" {
        "image/jpeg".to_string()
    } else {
        mimetype.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct StaticFetcher {
        document: &'static str,
        dimensions: Option<(u32, u32)>,
    }

    #[async_trait]
    impl DocumentFetcher for StaticFetcher {
        async fn probe(&self, _url: &str) -> Result<(), FetchError> {
            Ok(())
        }

        async fn fetch_document(&self, _url: &str) -> Result<String, FetchError> {
            Ok(self.document.to_string())
        }

        async fn image_dimensions(&self, _url: &str) -> Result<Option<(u32, u32)>, FetchError> {
            Ok(self.dimensions)
        }
    }

    fn envelope() -> ImportEnvelope {
        ImportEnvelope {
            seq: 0,
            job_id: "job-1".to_string(),
            source_url: "http://example.org/doc.xml".to_string(),
        }
    }

    async fn run(
        document: &'static str,
        dimensions: Option<(u32, u32)>,
    ) -> (Result<ManifestRef, ImportError>, Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let repository = Repository::open(temp_dir.path().join("repository")).unwrap();
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(StaticFetcher {
            document,
            dimensions,
        });
        let result = run_import(
            &envelope(),
            &fetcher,
            &repository,
            None,
            "https://iiif.test",
            2,
        )
        .await;
        (result, repository, temp_dir)
    }

    #[tokio::test]
    async fn three_page_document_yields_three_canvases() {
        let (result, repository, _temp) = run(crate::mets::SAMPLE_METS, Some((1200, 1800))).await;

        let reference = result.unwrap();
        assert_eq!(reference.manifest_id, "urn:nbn:de:test-123");
        assert_eq!(
            reference.manifest_url,
            "https://iiif.test/iiif/urn:nbn:de:test-123/manifest"
        );

        let record = repository
            .get_manifest(&reference.manifest_id)
            .unwrap()
            .unwrap();
        let canvases = &record.manifest.sequences[0].canvases;
        assert_eq!(canvases.len(), 3);
        // Document order, with probed dimensions applied
        assert_eq!(canvases[0].label, "Title page");
        assert_eq!(canvases[0].width, 1200);

        // Every identifier resolves to the manifest, source URL included
        for external in [
            "http://example.org/doc.xml",
            "urn:nbn:de:test-123",
            "http://resolver.example.org/123",
        ] {
            assert_eq!(
                repository.resolve_identifier(external).unwrap().as_deref(),
                Some(reference.manifest_id.as_str())
            );
        }

        // Image records exist and resolve to the source files
        let image_id = record.manifest.sequences[0].canvases[0]
            .images[0]
            .resource
            .service
            .id
            .rsplit('/')
            .next()
            .unwrap()
            .to_string();
        let image = repository.get_image(&image_id).unwrap().unwrap();
        assert_eq!(
            image.best_url(Some("image/jpeg"), None, None),
            Some("http://images.example.org/1.jpg")
        );
    }

    #[tokio::test]
    async fn unknown_dimensions_fall_back_to_nominal() {
        let (result, repository, _temp) = run(crate::mets::SAMPLE_METS, None).await;

        let reference = result.unwrap();
        let record = repository
            .get_manifest(&reference.manifest_id)
            .unwrap()
            .unwrap();
        let canvas = &record.manifest.sequences[0].canvases[0];
        assert_eq!(canvas.width, crate::iiif::DEFAULT_CANVAS_WIDTH);
        assert_eq!(canvas.height, crate::iiif::DEFAULT_CANVAS_HEIGHT);
    }

    #[tokio::test]
    async fn document_without_images_fails_with_no_images() {
        let (result, repository, _temp) =
            run(r#"<mets:mets xmlns:mets="http://www.loc.gov/METS/"/>"#, None).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ImportError::NoImages));
        let info = failure_info(&err);
        assert_eq!(info.kind, "NoImages");

        // Nothing was persisted
        let (records, total) = repository.recent_manifests(1, 10).unwrap();
        assert!(records.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn malformed_document_fails_with_type_name() {
        let (result, _repository, _temp) = run("<not-mets/>", None).await;

        let err = result.unwrap_err();
        let info = failure_info(&err);
        assert_eq!(info.kind, "MalformedDocument");
        assert!(info.message.contains("METS"));
    }

    #[tokio::test]
    async fn reimport_reuses_manifest_identity() {
        let temp_dir = TempDir::new().unwrap();
        let repository = Repository::open(temp_dir.path().join("repository")).unwrap();
        let fetcher: Arc<dyn DocumentFetcher> = Arc::new(StaticFetcher {
            document: crate::mets::SAMPLE_METS,
            dimensions: Some((800, 1200)),
        });

        let first = run_import(&envelope(), &fetcher, &repository, None, "https://iiif.test", 2)
            .await
            .unwrap();
        let second = run_import(&envelope(), &fetcher, &repository, None, "https://iiif.test", 2)
            .await
            .unwrap();

        assert_eq!(first.manifest_id, second.manifest_id);
        let (_, total) = repository.recent_manifests(1, 10).unwrap();
        assert_eq!(total, 1);
    }

    #[test]
    fn failure_info_includes_cause_chain() {
        let err = ImportError::Fetch(FetchError::Status(503));
        let info = failure_info(&err);
        assert_eq!(info.kind, "FetchFailed");
        assert_eq!(info.message, "failed to fetch document");
        assert!(info.trace.contains("caused by: unexpected HTTP status 503"));
    }

    #[test]
    fn identifier_sanitization() {
        assert_eq!(sanitize_identifier("urn:nbn:de:x-1"), "urn:nbn:de:x-1");
        assert_eq!(
            sanitize_identifier("http://a.test/b c?d"),
            "http:--a.test-b-c-d"
        );
    }
}
