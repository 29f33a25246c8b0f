//! Shared fixtures for the integration tests: an in-process app wired
//! against a canned document fetcher, plus request helpers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use metsiiify::api::state::AppState;
use metsiiify::config::Config;
use metsiiify::iiif::build_image_info;
use metsiiify::store::{ImageRecord, ManifestRecord, StoredImageFile};
use metsiiify::worker::fetch::{DocumentFetcher, FetchError};

/// Three JPEG pages declared out of reading order, one page without a
/// resolvable image, a nested logical structure and rights metadata.
pub const SAMPLE_METS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<mets:mets xmlns:mets="http://www.loc.gov/METS/"
           xmlns:mods="http://www.loc.gov/mods/v3"
           xmlns:dv="http://dfg-viewer.de/"
           xmlns:xlink="http://www.w3.org/1999/xlink">
  <mets:dmdSec ID="dmd001">
    <mets:mdWrap MDTYPE="MODS">
      <mets:xmlData>
        <mods:mods>
          <mods:titleInfo>
            <mods:title>Historische Drucke</mods:title>
          </mods:titleInfo>
          <mods:name>
            <mods:role><mods:roleTerm>aut</mods:roleTerm></mods:role>
            <mods:namePart>Dilherr, Johann Michael</mods:namePart>
          </mods:name>
          <mods:identifier type="urn">urn:nbn:de:test-123</mods:identifier>
        </mods:mods>
      </mets:xmlData>
    </mets:mdWrap>
  </mets:dmdSec>
  <mets:amdSec>
    <mets:rightsMD ID="rights001">
      <mets:mdWrap MDTYPE="OTHER">
        <mets:xmlData>
          <dv:rights>
            <dv:owner>Example Library</dv:owner>
            <dv:ownerLogo>http://library.example.org/logo.png</dv:ownerLogo>
          </dv:rights>
        </mets:xmlData>
      </mets:mdWrap>
    </mets:rightsMD>
  </mets:amdSec>
  <mets:fileSec>
    <mets:fileGrp USE="DEFAULT">
      <mets:file ID="img1" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/1.jpg"/>
      </mets:file>
      <mets:file ID="img2" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/2.jpg"/>
      </mets:file>
      <mets:file ID="img3" MIMETYPE="image/jpeg">
        <mets:FLocat LOCTYPE="URL" xlink:href="http://images.example.org/3.jpg"/>
      </mets:file>
    </mets:fileGrp>
  </mets:fileSec>
  <mets:structMap TYPE="PHYSICAL">
    <mets:div TYPE="physSequence">
      <mets:div ID="phys3" TYPE="page" ORDER="3">
        <mets:fptr FILEID="img3"/>
      </mets:div>
      <mets:div ID="phys1" TYPE="page" ORDER="1" LABEL="Title page">
        <mets:fptr FILEID="img1"/>
      </mets:div>
      <mets:div ID="phys2" TYPE="page" ORDER="2">
        <mets:fptr FILEID="img2"/>
      </mets:div>
      <mets:div ID="phys4" TYPE="page" ORDER="4">
        <mets:fptr FILEID="missing"/>
      </mets:div>
    </mets:div>
  </mets:structMap>
  <mets:structMap TYPE="LOGICAL">
    <mets:div ID="log1" TYPE="monograph" LABEL="Historische Drucke">
      <mets:div ID="log2" TYPE="chapter" LABEL="Plates"/>
    </mets:div>
  </mets:structMap>
  <mets:structLink>
    <mets:smLink xlink:from="log1" xlink:to="phys1"/>
    <mets:smLink xlink:from="log2" xlink:to="phys2"/>
    <mets:smLink xlink:from="log2" xlink:to="phys3"/>
  </mets:structLink>
</mets:mets>
"#;

pub const BASE_URL: &str = "http://app.test";

/// Canned fetcher: serves one document; probes can be failed wholesale,
/// and a single URL can be set up to fail from its second fetch onward
/// (the submission fetch succeeds, the worker's does not).
pub struct TestFetcher {
    probe_ok: bool,
    document: Option<String>,
    dimensions: Option<(u32, u32)>,
    fail_second_fetch_of: Option<String>,
    fetch_counts: Mutex<HashMap<String, usize>>,
}

impl TestFetcher {
    pub fn serving(document: &str) -> Self {
        Self {
            probe_ok: true,
            document: Some(document.to_string()),
            dimensions: Some((1200, 1800)),
            fail_second_fetch_of: None,
            fetch_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            probe_ok: false,
            document: None,
            dimensions: None,
            fail_second_fetch_of: None,
            fetch_counts: Mutex::new(HashMap::new()),
        }
    }

    pub fn fail_second_fetch_of(mut self, url: &str) -> Self {
        self.fail_second_fetch_of = Some(url.to_string());
        self
    }
}

#[async_trait]
impl DocumentFetcher for TestFetcher {
    async fn probe(&self, _url: &str) -> Result<(), FetchError> {
        if self.probe_ok {
            Ok(())
        } else {
            Err(FetchError::Status(404))
        }
    }

    async fn fetch_document(&self, url: &str) -> Result<String, FetchError> {
        let nth = {
            let mut counts = self.fetch_counts.lock().unwrap();
            let entry = counts.entry(url.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        if self.fail_second_fetch_of.as_deref() == Some(url) && nth >= 2 {
            return Err(FetchError::Status(503));
        }
        self.document
            .clone()
            .ok_or_else(|| FetchError::Request("no document".to_string()))
    }

    async fn image_dimensions(&self, _url: &str) -> Result<Option<(u32, u32)>, FetchError> {
        Ok(self.dimensions)
    }
}

/// Build a fully wired app over temp storage. `workers = 0` keeps
/// submitted jobs queued forever, which makes queue-state tests
/// deterministic.
pub async fn build_app(
    workers: usize,
    fetcher: Arc<dyn DocumentFetcher>,
) -> (Router, AppState, TempDir) {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.data_path = temp.path().to_path_buf();
    config.server.base_url = BASE_URL.to_string();
    config.import.workers = workers;

    let state = metsiiify::server::build_state(config, fetcher)
        .await
        .expect("failed to wire test app");
    let app = metsiiify::server::router(state.clone());
    (app, state, temp)
}

pub async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .uri(path)
        .header(header::ORIGIN, "http://viewer.example.org")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

pub async fn get_response(app: &Router, path: &str) -> axum::response::Response {
    let request = Request::builder()
        .uri(path)
        .header(header::ORIGIN, "http://viewer.example.org")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, path: &str, body: Value) -> axum::response::Response {
    let request = Request::builder()
        .uri(path)
        .method("POST")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// A minimal stored manifest for endpoint tests that bypass the pipeline
pub fn sample_manifest_record(id: &str, origin: &str) -> ManifestRecord {
    use metsiiify::iiif::build_manifest;
    use metsiiify::mets::{Attribution, DocumentMetadata, Page, PageImage};

    let metadata = DocumentMetadata {
        titles: vec![format!("Document {id}")],
        attribution: Attribution {
            owner: Some("Example Library".to_string()),
            logo: Some("http://library.example.org/logo.png".to_string()),
        },
        ..Default::default()
    };
    let pages = vec![Page {
        physical_id: "phys1".to_string(),
        label: "1".to_string(),
        images: vec![PageImage {
            file_id: "img1".to_string(),
            url: format!("http://images.example.org/{id}-1.jpg"),
            mimetype: "image/jpeg".to_string(),
            width: Some(1200),
            height: Some(1800),
        }],
    }];
    let manifest = build_manifest(&metadata, &pages, &[], id, BASE_URL);
    ManifestRecord {
        id: id.to_string(),
        origin: origin.to_string(),
        label: manifest.label.clone(),
        manifest,
        created_at: chrono::Utc::now(),
    }
}

/// An image record with a small and a large JPEG rendition
pub fn sample_image_record(id: &str) -> ImageRecord {
    ImageRecord {
        id: id.to_string(),
        info: build_image_info(id, &[(300, 450), (1200, 1800)], BASE_URL),
        files: vec![
            StoredImageFile {
                url: "http://images.example.org/small.jpg".to_string(),
                width: Some(300),
                height: Some(450),
                format: "image/jpeg".to_string(),
            },
            StoredImageFile {
                url: "http://images.example.org/large.jpg".to_string(),
                width: Some(1200),
                height: Some(1800),
                format: "image/jpeg".to_string(),
            },
        ],
    }
}

/// Decode the `data:` payloads of an SSE body
pub fn parse_sse_events(body: &str) -> Vec<Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}
