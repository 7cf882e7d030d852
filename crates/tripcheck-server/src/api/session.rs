use axum::{extract::State, Extension, Json};
use serde::Serialize;

use super::{map_engine_error, ApiError, ApiResponse, AppState};
use crate::middleware::RequestId;

#[derive(Debug, Serialize)]
pub(super) struct SessionStatusData {
    exists: bool,
    path: String,
}

#[derive(Debug, Serialize)]
pub(super) struct SessionActionData {
    message: &'static str,
}

pub(super) async fn session_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<SessionStatusData>> {
    let data = SessionStatusData {
        exists: state.verifier.session_status().await,
        path: state.verifier.sessions().path().display().to_string(),
    };
    Json(ApiResponse::new(req_id.0, data))
}

/// Opens a visible browser for an operator to log in. Blocks for the whole
/// login window.
pub(super) async fn capture_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SessionActionData>>, ApiError> {
    let _permit = state.enter_browser(&req_id.0)?;
    tracing::info!(request_id = %req_id.0, "session capture requested");
    state
        .verifier
        .capture_session()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse::new(
        req_id.0,
        SessionActionData {
            message: "Session saved",
        },
    )))
}

pub(super) async fn delete_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<SessionActionData>>, ApiError> {
    let existed = state
        .verifier
        .delete_session()
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    let message = if existed {
        "Session deleted"
    } else {
        "No session to delete"
    };
    Ok(Json(ApiResponse::new(
        req_id.0,
        SessionActionData { message },
    )))
}
