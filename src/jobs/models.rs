use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mets::Attribution;

/// Job lifecycle states. Transitions are monotonic:
/// `queued -> started -> (finished | failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Started,
    Finished,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Finished | JobState::Failed)
    }

    pub fn can_advance_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Started)
                | (JobState::Started, JobState::Finished)
                | (JobState::Started, JobState::Failed)
        )
    }
}

/// Metadata captured at submission time, echoed in every non-failed
/// status view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSnapshot {
    pub metsurl: String,
    pub label: String,
    pub thumbnail: Option<String>,
    pub attribution: Attribution,
}

/// Where a finished import ended up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRef {
    pub manifest_id: String,
    pub manifest_url: String,
}

/// Captured failure of an import job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub kind: String,
    pub message: String,
    pub trace: String,
}

/// Terminal result of a job, absent until the job finishes or fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum JobOutcome {
    Finished(ManifestRef),
    Failed(FailureInfo),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub source_url: String,
    pub state: JobState,
    pub snapshot: ImportSnapshot,
    pub outcome: Option<JobOutcome>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: String, source_url: String, snapshot: ImportSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id,
            source_url,
            state: JobState::Queued,
            snapshot,
            outcome: None,
            created_at: now,
            updated_at: now,
        }
    }
}
