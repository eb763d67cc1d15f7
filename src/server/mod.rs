//! HTTP dispatch layer
//!
//! Thin decode/dispatch of the four service endpoints plus the driver that
//! pushes a batch through its processing -> completed transitions. Probing
//! is triggered asynchronously right after a batch is created or resumed;
//! the response never waits for the probes.

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::logging;
use crate::prober::{LinkResult, ProbeLinks, Prober};
use crate::report::ReportRenderer;
use crate::store::{Batch, BatchStatus, BatchStore};

/// Shared state handed to every request handler.
#[derive(Debug)]
pub struct AppState {
    pub store: Arc<BatchStore>,
    pub prober: Arc<Prober>,
    pub renderer: ReportRenderer,
}

impl AppState {
    pub fn new(store: Arc<BatchStore>, prober: Arc<Prober>, renderer: ReportRenderer) -> Self {
        Self {
            store,
            prober,
            renderer,
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/check", post(check_links))
        .route("/report", get(get_report))
        .route("/status", get(get_status))
        .with_state(state)
}

/// Drive one batch through the prober: mark it processing, probe the full
/// URL list, persist the completed results.
pub async fn run_batch<P>(store: &BatchStore, prober: &P, batch_id: u64, urls: Vec<String>)
where
    P: ProbeLinks + ?Sized,
{
    if let Err(err) = store
        .update_batch(batch_id, Vec::new(), BatchStatus::Processing)
        .await
    {
        error!("failed to mark batch {batch_id} processing: {err}");
        return;
    }

    let results = prober.check(Some(urls)).await;
    let available = results.iter().filter(|result| result.available).count();
    logging::log_batch_result(batch_id, results.len(), available);

    match store
        .update_batch(batch_id, results, BatchStatus::Completed)
        .await
    {
        Ok(()) => info!("batch {batch_id} completed"),
        Err(err) => error!("failed to persist batch {batch_id}: {err}"),
    }
}

/// Re-drive batches that were interrupted by a restart. Each batch is
/// retried from scratch with its full original URL list.
pub fn resume_pending_batches(store: &Arc<BatchStore>, prober: &Arc<Prober>, pending: Vec<Batch>) {
    for batch in pending {
        info!("resuming batch {} with {} links", batch.id, batch.urls.len());
        let store = Arc::clone(store);
        let prober = Arc::clone(prober);
        tokio::spawn(async move {
            run_batch(store.as_ref(), prober.as_ref(), batch.id, batch.urls).await;
        });
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    links: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    batch_id: u64,
    links: Vec<String>,
    message: String,
}

async fn check_links(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CheckRequest>,
) -> Response {
    let Some(links) = request.links.filter(|links| !links.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "No links provided").into_response();
    };

    let batch_id = match state.store.create_batch(links.clone()).await {
        Ok(batch_id) => batch_id,
        Err(err) => {
            error!("failed to create batch: {err}");
            return (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response();
        }
    };

    let store = Arc::clone(&state.store);
    let prober = Arc::clone(&state.prober);
    let urls = links.clone();
    tokio::spawn(async move {
        run_batch(store.as_ref(), prober.as_ref(), batch_id, urls).await;
    });

    Json(CheckResponse {
        batch_id,
        links,
        message: "Links are being checked. Use batch_id to retrieve the report.".to_string(),
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct StatusParams {
    batch_id: u64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    batch_id: u64,
    status: BatchStatus,
    urls: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<LinkResult>>,
}

async fn get_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<StatusParams>,
) -> Response {
    let batch = match state.store.get_batch(params.batch_id).await {
        Ok(batch) => batch,
        Err(err) => return (StatusCode::NOT_FOUND, err.to_string()).into_response(),
    };

    // Partial results are never exposed mid-flight.
    let results = match batch.status {
        BatchStatus::Completed => Some(batch.results),
        _ => None,
    };

    Json(StatusResponse {
        batch_id: batch.id,
        status: batch.status,
        urls: batch.urls,
        results,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ReportParams {
    batch_ids: String,
}

async fn get_report(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReportParams>,
) -> Response {
    let mut batch_ids = Vec::new();
    for raw in params.batch_ids.split(',') {
        match raw.trim().parse::<u64>() {
            Ok(id) => batch_ids.push(id),
            Err(_) => {
                return (StatusCode::BAD_REQUEST, format!("Invalid batch_id: {raw}"))
                    .into_response();
            }
        }
    }

    let batches = state.store.get_batches(&batch_ids).await;
    if batches.is_empty() {
        return (StatusCode::NOT_FOUND, "No batches found").into_response();
    }

    let document = state.renderer.render(&batches);
    let filename = format!("report_{}.txt", Utc::now().timestamp());
    (
        [
            (
                header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        document,
    )
        .into_response()
}
