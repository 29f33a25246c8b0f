//! End-to-end pipeline tests: submission through worker execution to
//! served IIIF resources, plus the live status stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, StatusCode};
use serde_json::{json, Value};

use common::{
    build_app, get, get_response, body_json, parse_sse_events, post_json, TestFetcher, BASE_URL,
    SAMPLE_METS,
};
use metsiiify::api::state::AppState;

async fn submit(app: &axum::Router, url: &str) -> Value {
    let response = post_json(app, "/api/import", json!({ "url": url })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await
}

async fn wait_for_terminal(state: &AppState, job_id: &str) -> Value {
    for _ in 0..500 {
        if let Some(view) = state.orchestrator.status(job_id).unwrap() {
            if view.is_terminal() {
                return serde_json::to_value(&view).unwrap();
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} did not reach a terminal state");
}

#[tokio::test]
async fn three_page_import_finishes_with_three_canvases() {
    let (app, state, _temp) =
        build_app(1, Arc::new(TestFetcher::serving(SAMPLE_METS))).await;

    let accepted = submit(&app, "http://example.org/doc.xml").await;
    let job_id = accepted["id"].as_str().unwrap().to_string();

    let terminal = wait_for_terminal(&state, &job_id).await;
    assert_eq!(terminal["status"], "finished", "job failed: {terminal:?}");
    let manifest_url = terminal["result"].as_str().unwrap();
    assert_eq!(
        manifest_url,
        format!("{BASE_URL}/iiif/urn:nbn:de:test-123/manifest")
    );
    // Finished views still carry the submission snapshot
    assert_eq!(terminal["metsurl"], "http://example.org/doc.xml");

    // The polling endpoint agrees with the internal view
    let (status, body) = get(&app, &format!("/api/tasks/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "finished");

    // The manifest is served, in document order, one annotation per canvas
    let (status, manifest) = get(&app, "/iiif/urn:nbn:de:test-123/manifest").await;
    assert_eq!(status, StatusCode::OK);
    let canvases = manifest["sequences"][0]["canvases"].as_array().unwrap();
    assert_eq!(canvases.len(), 3);
    assert_eq!(canvases[0]["label"], "Title page");
    assert_eq!(canvases[0]["width"], 1200);
    let annotation_url = canvases[0]["images"][0]["resource"]["@id"].as_str().unwrap();
    assert!(annotation_url.starts_with(&format!("{BASE_URL}/iiif/image/")));
    assert!(annotation_url.ends_with("/full/full/0/default.jpg"));

    // Ranges mirror the logical structure
    let structures = manifest["structures"].as_array().unwrap();
    assert_eq!(structures.len(), 2);

    // Identifier registered during the import resolves
    let response = get_response(&app, "/api/resolve/urn:nbn:de:test-123").await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    // The manifest shows up in the recent listing
    let (_, recent) = get(&app, "/api/recent").await;
    let manifests = recent["manifests"].as_array().unwrap();
    assert_eq!(manifests.len(), 1);
    assert_eq!(manifests[0]["metsurl"], "http://example.org/doc.xml");

    // Each page image resolves through the Image API
    let image_id = annotation_url
        .strip_prefix(&format!("{BASE_URL}/iiif/image/"))
        .unwrap()
        .split('/')
        .next()
        .unwrap();
    let (status, info) = get(&app, &format!("/iiif/image/{image_id}/info.json")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["width"], 1200);

    let response = get_response(
        &app,
        &format!("/iiif/image/{image_id}/full/1200,/0/default.jpg"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok()),
        Some("http://images.example.org/1.jpg")
    );
}

#[tokio::test]
async fn worker_failure_marks_the_job_failed_with_a_descriptor() {
    // The submission fetch succeeds, the worker's own fetch fails
    let fetcher =
        TestFetcher::serving(SAMPLE_METS).fail_second_fetch_of("http://example.org/doc.xml");
    let (app, state, _temp) = build_app(1, Arc::new(fetcher)).await;

    let accepted = submit(&app, "http://example.org/doc.xml").await;
    let job_id = accepted["id"].as_str().unwrap().to_string();

    let terminal = wait_for_terminal(&state, &job_id).await;
    assert_eq!(terminal["status"], "failed");
    assert_eq!(terminal["type"], "FetchFailed");
    assert_eq!(terminal["message"], "failed to fetch document");
    assert!(terminal["traceback"]
        .as_str()
        .unwrap()
        .contains("caused by: unexpected HTTP status 503"));
    // Failed views do not echo the snapshot
    assert!(terminal.get("metsurl").is_none());
}

#[tokio::test]
async fn failed_job_does_not_stop_the_worker() {
    let fetcher =
        TestFetcher::serving(SAMPLE_METS).fail_second_fetch_of("http://example.org/fails.xml");
    let (app, state, _temp) = build_app(1, Arc::new(fetcher)).await;

    let first = submit(&app, "http://example.org/fails.xml").await;
    let second = submit(&app, "http://example.org/works.xml").await;

    let first_terminal = wait_for_terminal(&state, first["id"].as_str().unwrap()).await;
    let second_terminal = wait_for_terminal(&state, second["id"].as_str().unwrap()).await;

    assert_eq!(first_terminal["status"], "failed");
    // The worker survived the failure and processed the next job
    assert_eq!(second_terminal["status"], "finished");
    assert!(state.orchestrator.list_queued().unwrap().is_empty());
}

#[tokio::test]
async fn stream_of_a_terminal_job_emits_once_and_closes() {
    let (app, state, _temp) =
        build_app(1, Arc::new(TestFetcher::serving(SAMPLE_METS))).await;

    let accepted = submit(&app, "http://example.org/doc.xml").await;
    let job_id = accepted["id"].as_str().unwrap().to_string();
    wait_for_terminal(&state, &job_id).await;

    let response = get_response(&app, &format!("/api/tasks/{job_id}/stream")).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Terminal at connect time: the stream emits the status once and ends,
    // so the whole body can be collected
    let bytes = tokio::time::timeout(
        Duration::from_secs(10),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream did not close")
    .unwrap();
    let events = parse_sse_events(&String::from_utf8_lossy(&bytes));
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["status"], "finished");
}

#[tokio::test]
async fn live_stream_never_repeats_a_status_and_ends_terminal() {
    let (app, state, _temp) =
        build_app(1, Arc::new(TestFetcher::serving(SAMPLE_METS))).await;

    let accepted = submit(&app, "http://example.org/doc.xml").await;
    let job_id = accepted["id"].as_str().unwrap().to_string();

    // Connect immediately; the stream follows the job to its end
    let response = get_response(&app, &format!("/api/tasks/{job_id}/stream")).await;
    let bytes = tokio::time::timeout(
        Duration::from_secs(10),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("stream did not close")
    .unwrap();

    let events = parse_sse_events(&String::from_utf8_lossy(&bytes));
    assert!(!events.is_empty());
    for event in &events {
        assert_eq!(event["id"], job_id.as_str());
    }
    // Strictly ordered, never repeating, ending in the terminal status
    for pair in events.windows(2) {
        assert_ne!(pair[0], pair[1], "stream emitted equal consecutive events");
    }
    assert_eq!(events.last().unwrap()["status"], "finished");
    wait_for_terminal(&state, &job_id).await;
}

#[tokio::test]
async fn queue_positions_shrink_as_jobs_start() {
    let (app, state, _temp) =
        build_app(0, Arc::new(TestFetcher::serving(SAMPLE_METS))).await;

    let mut job_ids = Vec::new();
    for i in 0..3 {
        let accepted = submit(&app, &format!("http://example.org/doc-{i}.xml")).await;
        job_ids.push(accepted["id"].as_str().unwrap().to_string());
    }

    let view = |job_id: &str| {
        serde_json::to_value(state.orchestrator.status(job_id).unwrap().unwrap()).unwrap()
    };
    assert_eq!(view(&job_ids[2])["position"], 2);

    // No workers are attached, so drive the first job by hand
    state.orchestrator.mark_started(&job_ids[0]).unwrap();

    // The started job no longer has a queue position, everyone else moved up
    assert_eq!(view(&job_ids[0])["status"], "started");
    assert!(view(&job_ids[0]).get("position").is_none());
    assert_eq!(view(&job_ids[1])["position"], 0);
    assert_eq!(view(&job_ids[2])["position"], 1);

    // The listing only contains the still-queued jobs
    let (_, body) = get(&app, "/api/tasks").await;
    assert_eq!(body["tasks"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn pending_jobs_are_redelivered_after_restart() {
    use metsiiify::config::Config;

    let temp = tempfile::TempDir::new().unwrap();
    let mut config = Config::default();
    config.server.data_path = temp.path().to_path_buf();
    config.server.base_url = BASE_URL.to_string();
    config.import.workers = 0;

    // First run: submit but never process
    let job_id = {
        let state = metsiiify::server::build_state(
            config.clone(),
            Arc::new(TestFetcher::serving(SAMPLE_METS)),
        )
        .await
        .unwrap();
        let app = metsiiify::server::router(state.clone());
        let accepted = submit(&app, "http://example.org/doc.xml").await;
        accepted["id"].as_str().unwrap().to_string()
    };

    // Second run with a worker: the persisted entry is re-delivered
    config.import.workers = 1;
    let state = metsiiify::server::build_state(
        config,
        Arc::new(TestFetcher::serving(SAMPLE_METS)),
    )
    .await
    .unwrap();

    let terminal = wait_for_terminal(&state, &job_id).await;
    assert_eq!(terminal["status"], "finished");
}
