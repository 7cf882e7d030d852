use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tripcheck_core::{RunSummary, StoreSpec, TestResult};
use tripcheck_engine::{parse_store_csv, RunEvent, RunOutcome};

use super::{map_engine_error, result_url, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

const STREAM_BUFFER: usize = 64;

#[derive(Debug, Serialize)]
pub(super) struct RunData {
    pub results: Vec<TestResult>,
    pub summary: RunSummary,
    /// Download path of the CSV report.
    pub result_file: Option<String>,
    pub report_error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<RunOutcome> for RunData {
    fn from(outcome: RunOutcome) -> Self {
        Self {
            result_file: outcome.report_file().as_deref().map(result_url),
            results: outcome.results,
            summary: outcome.summary,
            report_error: outcome.report_error,
            timestamp: outcome.timestamp,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SingleRunData {
    pub result: Option<TestResult>,
    pub result_file: Option<String>,
    pub report_error: Option<String>,
}

/// Single-store request body. Every field defaults to blank so missing
/// fields surface as a validation error instead of a deserialization one.
#[derive(Debug, Deserialize)]
pub(super) struct SingleStoreRequest {
    #[serde(default)]
    store_id: String,
    #[serde(default)]
    store_name: String,
    #[serde(default)]
    xfas_url: String,
    #[serde(default)]
    merchant_site_url: String,
    #[serde(default)]
    network_id: Option<String>,
}

impl From<SingleStoreRequest> for StoreSpec {
    fn from(req: SingleStoreRequest) -> Self {
        StoreSpec {
            store_id: req.store_id.trim().to_string(),
            store_name: req.store_name.trim().to_string(),
            xfas_url: req.xfas_url.trim().to_string(),
            merchant_site_url: req.merchant_site_url.trim().to_string(),
            network_id: req
                .network_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| StoreSpec::DEFAULT_NETWORK_ID.to_string()),
        }
    }
}

/// `POST /api/v1/runs`: CSV store list in, all results out once the run ends.
pub(super) async fn run_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: String,
) -> Result<Json<ApiResponse<RunData>>, ApiError> {
    let stores = parse_store_csv(&body).map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    let _permit = state.enter_browser(&req_id.0)?;
    tracing::info!(stores = stores.len(), request_id = %req_id.0, "batch run requested");

    let outcome = state
        .verifier
        .verify_all(&stores, None)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(req_id.0, outcome.into())))
}

/// `POST /api/v1/runs/stream`: CSV store list in, server-sent events out.
pub(super) async fn run_stream(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: String,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let stores = parse_store_csv(&body).map_err(|e| map_engine_error(req_id.0.clone(), &e))?;
    let permit = state.enter_browser(&req_id.0)?;
    tracing::info!(stores = stores.len(), request_id = %req_id.0, "streamed run requested");

    let mut run_events = Arc::clone(&state.verifier).stream(stores);
    let (client_tx, client_rx) = mpsc::channel(STREAM_BUFFER);
    // Owns the permit until the run itself ends, even if the client leaves.
    tokio::spawn(async move {
        let _permit = permit;
        let mut client_open = true;
        while let Some(event) = run_events.recv().await {
            if client_open && client_tx.send(event).await.is_err() {
                tracing::debug!("stream client disconnected, run continues");
                client_open = false;
            }
        }
    });

    let stream = stream::unfold(client_rx, |mut events| async move {
        let event = events.recv().await?;
        Some((Ok(sse_event(event)), events))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// `POST /api/v1/runs/single`: one JSON store in, its result out.
pub(super) async fn run_single(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<SingleStoreRequest>,
) -> Result<Json<ApiResponse<SingleRunData>>, ApiError> {
    let store = StoreSpec::from(request);
    store
        .validate()
        .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;
    let _permit = state.enter_browser(&req_id.0)?;
    tracing::info!(store_id = %store.store_id, request_id = %req_id.0, "single store check requested");

    let outcome = state
        .verifier
        .verify_one(&store)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let data = SingleRunData {
        result_file: outcome.report_file().as_deref().map(result_url),
        result: outcome.results.into_iter().next(),
        report_error: outcome.report_error,
    };
    Ok(Json(ApiResponse::new(req_id.0, data)))
}

/// Renders a run event as one SSE `data:` frame, with the report file
/// rewritten to its download path.
fn sse_event(event: RunEvent) -> Event {
    let event = match event {
        RunEvent::Complete {
            summary,
            result_file,
            report_error,
            timestamp,
        } => RunEvent::Complete {
            summary,
            result_file: result_file.as_deref().map(result_url),
            report_error,
            timestamp,
        },
        other => other,
    };
    Event::default().json_data(&event).unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to encode run event");
        Event::default().data(r#"{"type":"error","error":"event encoding failed"}"#)
    })
}
