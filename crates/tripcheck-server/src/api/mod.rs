mod runs;
mod session;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tokio::sync::OwnedSemaphorePermit;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tripcheck_engine::{EngineError, Verifier};

use crate::gate::BrowserGate;
use crate::middleware::{request_id, require_api_key, AuthState, RequestId, REQUEST_ID_HEADER};

/// URL prefix under which report files are served.
pub const RESULTS_ROUTE: &str = "/results";
/// URL prefix under which screenshots are served.
pub const SCREENSHOTS_ROUTE: &str = "/screenshots";

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<Verifier>,
    pub gate: BrowserGate,
}

impl AppState {
    #[must_use]
    pub fn new(verifier: Arc<Verifier>) -> Self {
        Self {
            verifier,
            gate: BrowserGate::default(),
        }
    }

    /// Claims the browser for the caller, or answers `409 conflict` while
    /// another run or login capture holds it.
    pub(super) fn enter_browser(&self, request_id: &str) -> Result<OwnedSemaphorePermit, ApiError> {
        self.gate.try_enter().ok_or_else(|| {
            tracing::warn!(request_id = %request_id, "browser busy, request refused");
            ApiError::new(
                request_id,
                "conflict",
                "another verification run or login is in progress",
            )
        })
    }

    fn screenshot_dir(&self) -> PathBuf {
        self.verifier
            .settings()
            .classifier
            .screenshot_dir
            .clone()
    }

    fn results_dir(&self) -> PathBuf {
        self.verifier.settings().results_dir.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    session: &'static str,
    browser: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Input problems are the caller's fault; everything else is ours.
pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::InvalidStore { .. } | EngineError::EmptyInput | EngineError::Csv(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        _ => {
            tracing::error!(error = %error, "verification failed");
            ApiError::new(request_id, "internal_error", error.to_string())
        }
    }
}

/// Public URL of a report file name.
pub(super) fn result_url(file_name: &str) -> String {
    format!("{RESULTS_ROUTE}/{file_name}")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(REQUEST_ID_HEADER),
        ])
}

fn protected_router(auth: AuthState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/session",
            get(session::session_status)
                .post(session::capture_session)
                .delete(session::delete_session),
        )
        .route("/api/v1/runs", post(runs::run_batch))
        .route("/api/v1/runs/stream", post(runs::run_stream))
        .route("/api/v1/runs/single", post(runs::run_single))
        .layer(axum::middleware::from_fn_with_state(auth, require_api_key))
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/api/v1/health", get(health))
        .nest_service(SCREENSHOTS_ROUTE, ServeDir::new(state.screenshot_dir()))
        .nest_service(RESULTS_ROUTE, ServeDir::new(state.results_dir()));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let session = if state.verifier.session_status().await {
        "present"
    } else {
        "missing"
    };
    let browser = if state.gate.is_busy() { "busy" } else { "idle" };
    (
        StatusCode::OK,
        Json(ApiResponse::new(
            req_id.0,
            HealthData {
                status: "ok",
                session,
                browser,
            },
        )),
    )
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
