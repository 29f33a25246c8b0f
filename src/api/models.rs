//! Request and response bodies of the import API.
//!
//! [`JobStatusView`] is the one JSON shape shared by the polling endpoint,
//! the task listing and the SSE stream. Its state-specific fields are a
//! tagged union rather than a free-form metadata bag, so every state
//! serializes exactly the fields it owns.

use serde::{Deserialize, Serialize};

use crate::iiif::types::ImageRef;
use crate::jobs::{ImportSnapshot, JobOutcome, JobRecord, JobState};

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRequest {
    pub recipient: String,
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotifyResponse {
    pub jobs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<JobStatusView>,
}

/// Status of one job as reported by poll and stream alike.
/// Compared structurally by the stream to suppress duplicate events.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusView {
    pub id: String,
    pub status: JobState,
    pub detail: JobStatusDetail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatusDetail {
    Failed {
        kind: String,
        message: String,
        traceback: String,
    },
    Finished {
        result: String,
        snapshot: ImportSnapshot,
    },
    Queued {
        /// Zero-based position among the queued jobs; `None` once the job
        /// has raced out of the queued list
        position: Option<usize>,
        snapshot: ImportSnapshot,
    },
    Started {
        snapshot: ImportSnapshot,
    },
}

// The wire shape is flat: `{id, status}` plus the state-specific fields at
// the top level, identical for poll and stream.
impl serde::Serialize for JobStatusView {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        fn snapshot_entries<M: SerializeMap>(
            map: &mut M,
            snapshot: &ImportSnapshot,
        ) -> Result<(), M::Error> {
            map.serialize_entry("metsurl", &snapshot.metsurl)?;
            map.serialize_entry("label", &snapshot.label)?;
            map.serialize_entry("thumbnail", &snapshot.thumbnail)?;
            map.serialize_entry("attribution", &snapshot.attribution)
        }

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("id", &self.id)?;
        map.serialize_entry("status", &self.status)?;
        match &self.detail {
            JobStatusDetail::Failed {
                kind,
                message,
                traceback,
            } => {
                map.serialize_entry("type", kind)?;
                map.serialize_entry("message", message)?;
                map.serialize_entry("traceback", traceback)?;
            }
            JobStatusDetail::Finished { result, snapshot } => {
                map.serialize_entry("result", result)?;
                snapshot_entries(&mut map, snapshot)?;
            }
            JobStatusDetail::Queued { position, snapshot } => {
                map.serialize_entry("position", position)?;
                snapshot_entries(&mut map, snapshot)?;
            }
            JobStatusDetail::Started { snapshot } => {
                snapshot_entries(&mut map, snapshot)?;
            }
        }
        map.end()
    }
}

impl JobStatusView {
    pub fn from_record(record: &JobRecord, position: Option<usize>) -> Self {
        let detail = match (record.state, &record.outcome) {
            (JobState::Failed, Some(JobOutcome::Failed(failure))) => JobStatusDetail::Failed {
                kind: failure.kind.clone(),
                message: failure.message.clone(),
                traceback: failure.trace.clone(),
            },
            (JobState::Failed, _) => JobStatusDetail::Failed {
                kind: "Unknown".to_string(),
                message: "job failed without a recorded outcome".to_string(),
                traceback: String::new(),
            },
            (JobState::Finished, Some(JobOutcome::Finished(reference))) => {
                JobStatusDetail::Finished {
                    result: reference.manifest_url.clone(),
                    snapshot: record.snapshot.clone(),
                }
            }
            (JobState::Queued, _) => JobStatusDetail::Queued {
                position,
                snapshot: record.snapshot.clone(),
            },
            _ => JobStatusDetail::Started {
                snapshot: record.snapshot.clone(),
            },
        };
        Self {
            id: record.id.clone(),
            status: record.state,
            detail,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// One entry of the recent-manifests listing
#[derive(Debug, Clone, Serialize)]
pub struct RecentEntry {
    pub id: String,
    pub manifest: String,
    pub preview: Option<ImageRef>,
    pub label: String,
    pub metsurl: String,
    pub attribution: Option<String>,
    pub attribution_logo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentPage {
    pub next_page: Option<usize>,
    pub manifests: Vec<RecentEntry>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}
