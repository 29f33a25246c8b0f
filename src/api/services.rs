//! Import API endpoints: submission, task status, notifications, recent
//! manifests and identifier resolution.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect},
    Json,
};
use serde::Deserialize;

use super::error::ApiError;
use super::models::{
    HealthResponse, ImportRequest, NotifyRequest, NotifyResponse, RecentEntry, RecentPage,
    TaskListResponse,
};
use super::state::AppState;
use super::validation;
use crate::store::ManifestRecord;

/// POST /api/import — submit a METS URL (or a DFG-Viewer URL wrapping one)
/// for asynchronous import.
///
/// Returns `202 Accepted` with the job status body and a `Location` header
/// pointing at the status endpoint. An unreachable source or a document
/// without a METS root is rejected with `400` and no job is created.
pub async fn import(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let request: ImportRequest = serde_json::from_value(body)?;
    let mets_url = validation::resolve_mets_url(&request.url).ok_or_else(|| {
        ApiError::InvalidPayload("the viewer URL references no METS document".to_string())
    })?;

    let record = state.orchestrator.submit(&mets_url).await?;
    let view = state
        .orchestrator
        .status(&record.id)?
        .ok_or_else(|| ApiError::Internal("job record vanished after submit".to_string()))?;

    let location = format!("{}/api/tasks/{}", state.config.server.base_url, record.id);
    Ok((
        StatusCode::ACCEPTED,
        AppendHeaders([(header::LOCATION, location)]),
        Json(view),
    ))
}

/// GET /api/tasks — status of every job still waiting in the queue.
/// Jobs that have started or finished are not listed.
pub async fn list_tasks(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state.orchestrator.list_queued()?;
    Ok(Json(TaskListResponse { tasks }))
}

/// GET /api/tasks/{task_id} — status of a single job
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state
        .orchestrator
        .status(&task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    Ok(Json(view))
}

/// POST /api/tasks/notify — subscribe an email address to a set of jobs.
/// Returns the full set of jobs the address is now subscribed to.
pub async fn notify(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, ApiError> {
    let request: NotifyRequest = serde_json::from_value(body)?;
    if !validation::is_valid_email(&request.recipient) {
        return Err(ApiError::InvalidPayload(
            "the email passed is not valid".to_string(),
        ));
    }

    let jobs = state.repository.subscribe(&request.recipient, &request.jobs)?;
    Ok(Json(NotifyResponse { jobs }))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub page: Option<usize>,
}

/// GET /api/recent — paginated list of recently imported manifests
pub async fn recent(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = state.config.server.items_per_page;

    let (records, total) = state.repository.recent_manifests(page, per_page)?;
    let next_page = (page * per_page < total).then(|| page + 1);

    let manifests = records.iter().map(recent_entry).collect();
    Ok(Json(RecentPage {
        next_page,
        manifests,
    }))
}

fn recent_entry(record: &ManifestRecord) -> RecentEntry {
    let preview = record.manifest.thumbnail.clone().or_else(|| {
        record
            .manifest
            .sequences
            .first()
            .and_then(|sequence| sequence.canvases.first())
            .and_then(|canvas| canvas.thumbnail.clone())
    });
    RecentEntry {
        id: record.id.clone(),
        manifest: record.manifest.id.clone(),
        preview,
        label: record.label.clone(),
        metsurl: record.origin.clone(),
        attribution: record.manifest.attribution.clone(),
        attribution_logo: record.manifest.logo.clone(),
    }
}

/// GET /api/resolve/{identifier} — redirect an external identifier to its
/// manifest, or 404
pub async fn resolve(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let manifest_id = state
        .repository
        .resolve_identifier(&identifier)?
        .ok_or_else(|| ApiError::NotFound(format!("identifier {identifier}")))?;

    let target = format!(
        "{}/iiif/{}/manifest",
        state.config.server.base_url, manifest_id
    );
    Ok(Redirect::to(&target))
}

/// GET /health — liveness
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
