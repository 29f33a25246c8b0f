//! Live job status over Server-Sent Events.
//!
//! The stream subscribes to the change feed before computing the first
//! status, so no transition between the two is ever missed. Each event on
//! the feed triggers a recomputation of the watched job's status (queue
//! positions shift whenever any other job moves); an event is emitted only
//! when the recomputed view differs structurally from the last one sent.
//! After the terminal status has gone out once the stream ends.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::error::ApiError;
use super::models::JobStatusView;
use super::state::AppState;
use crate::jobs::{JobChange, Orchestrator};

struct Follow {
    rx: broadcast::Receiver<JobChange>,
    orchestrator: Arc<Orchestrator>,
    job_id: String,
    last: JobStatusView,
    done: bool,
}

/// GET /api/tasks/{task_id}/stream
pub async fn job_stream(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    // Subscribe first: transitions racing the initial status computation
    // stay buffered in the channel
    let rx = state.changes.subscribe();

    let initial = state
        .orchestrator
        .status(&task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))?;
    let first_event = Event::default()
        .json_data(&initial)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    debug!(task_id, "SSE stream opened");
    let follow = Follow {
        rx,
        orchestrator: state.orchestrator.clone(),
        job_id: task_id,
        done: initial.is_terminal(),
        last: initial,
    };

    let updates = stream::unfold(follow, |mut follow| async move {
        if follow.done {
            return None;
        }
        loop {
            match follow.rx.recv().await {
                Ok(_change) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Fell behind the feed; recompute against current state
                    warn!(job_id = %follow.job_id, skipped, "SSE stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }

            let view = match follow.orchestrator.status(&follow.job_id) {
                Ok(Some(view)) => view,
                Ok(None) => continue,
                Err(err) => {
                    warn!(job_id = %follow.job_id, error = %err, "status recomputation failed");
                    continue;
                }
            };
            if view == follow.last {
                continue;
            }

            let Ok(event) = Event::default().json_data(&view) else {
                continue;
            };
            follow.done = view.is_terminal();
            follow.last = view;
            return Some((Ok::<_, Infallible>(event), follow));
        }
    });

    let events = stream::iter([Ok::<_, Infallible>(first_event)]).chain(updates);
    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    ))
}
