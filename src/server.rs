//! Server wiring: stores, queue, worker pool, router, graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::api::state::AppState;
use crate::api::{iiif, services, stream};
use crate::archive::ArchiveStore;
use crate::config::Config;
use crate::jobs::{ChangeFeed, ImportBroker, JobLedger, Orchestrator, PendingQueue};
use crate::store::Repository;
use crate::worker::fetch::{DocumentFetcher, HttpFetcher};
use crate::worker::{spawn_workers, WorkerContext};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(address: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load()?;
    let address = address.unwrap_or(config.server.bind_addr);

    let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new(&config.import)?);
    let state = build_state(config, fetcher).await?;

    let app = router(state);
    let listener = TcpListener::bind(address).await?;
    info!(%address, "metsiiify API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Open the stores, wire the orchestrator, spawn the worker pool and
/// re-deliver whatever the queue still holds from a previous run.
pub async fn build_state(
    config: Config,
    fetcher: Arc<dyn DocumentFetcher>,
) -> Result<AppState, AnyError> {
    let data = &config.server.data_path;
    info!(path = %data.display(), "Opening data stores");
    let repository = Arc::new(Repository::open(data.join("repository"))?);
    let ledger = Arc::new(JobLedger::open(data.join("jobs"))?);
    let queue = Arc::new(PendingQueue::open(data.join("queue"))?);

    let changes = ChangeFeed::new(256);
    let (broker, receivers) =
        ImportBroker::new(queue.clone(), config.import.workers, config.import.queue_capacity);
    let broker = Arc::new(broker);

    let orchestrator = Arc::new(Orchestrator::new(
        ledger,
        queue,
        broker,
        changes.clone(),
        fetcher.clone(),
    ));

    let archive = match &config.archive.dump_mets {
        Some(path) => Some(Arc::new(ArchiveStore::local(path)?)),
        None => None,
    };

    spawn_workers(
        receivers,
        WorkerContext {
            orchestrator: orchestrator.clone(),
            repository: repository.clone(),
            fetcher,
            archive,
            base_url: config.server.base_url.clone(),
            image_probe_concurrency: config.import.image_probe_concurrency,
        },
    );

    orchestrator.redeliver_pending().await?;

    Ok(AppState::new(config, repository, orchestrator, changes))
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/import", post(services::import))
        .route("/api/tasks", get(services::list_tasks))
        .route("/api/tasks/notify", post(services::notify))
        .route("/api/tasks/{task_id}", get(services::task_status))
        .route("/api/tasks/{task_id}/stream", get(stream::job_stream))
        .route("/api/recent", get(services::recent))
        .route("/api/resolve/{identifier}", get(services::resolve))
        .route("/health", get(services::health));

    // Every IIIF response is CORS-open so any viewer can load it
    let iiif_routes = Router::new()
        .route("/iiif/collection/{collection_id}", get(iiif::collection_top))
        .route(
            "/iiif/collection/{collection_id}/{page_id}",
            get(iiif::collection_page),
        )
        .route("/iiif/image/{image_id}/info.json", get(iiif::image_info))
        .route(
            "/iiif/image/{image_id}/{region}/{size}/{rotation}/{quality_format}",
            get(iiif::image_request),
        )
        .route("/iiif/{manifest_id}/manifest", get(iiif::manifest))
        .route("/iiif/{manifest_id}/manifest.json", get(iiif::manifest))
        .route(
            "/iiif/{manifest_id}/sequence/{sequence_id}",
            get(iiif::sequence),
        )
        .route("/iiif/{manifest_id}/canvas/{canvas_id}", get(iiif::canvas))
        .route(
            "/iiif/{manifest_id}/annotation/{annotation_id}",
            get(iiif::annotation),
        )
        .route("/iiif/{manifest_id}/range/{range_id}", get(iiif::range))
        .layer(CorsLayer::new().allow_origin(Any));

    api.merge(iiif_routes).with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
