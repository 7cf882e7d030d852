//! Request tagging and API key checks applied in front of the handlers.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tripcheck_core::{AppConfig, Environment};
use uuid::Uuid;

use crate::api::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Id of the current request, echoed in every response envelope.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// API keys accepted on the verification routes. No keys means the routes
/// are open.
#[derive(Debug, Clone)]
pub struct AuthState {
    keys: Arc<[String]>,
}

impl AuthState {
    /// # Errors
    ///
    /// Fails when no keys are configured outside development.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        if config.api_keys.is_empty() {
            if config.env != Environment::Development {
                anyhow::bail!(
                    "TRIPCHECK_API_KEYS must list at least one key in the {} environment",
                    config.env
                );
            }
            tracing::warn!("TRIPCHECK_API_KEYS is empty; verification routes are open");
        }
        Ok(Self {
            keys: config.api_keys.clone().into(),
        })
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.keys.is_empty()
    }

    /// Checks `token` against every key without stopping at the first match.
    fn accepts(&self, token: &str) -> bool {
        self.keys.iter().fold(false, |found, key| {
            found | bool::from(key.as_bytes().ct_eq(token.as_bytes()))
        })
    }
}

/// Tags the request with the caller's `x-request-id` or a fresh `UUIDv4`,
/// and echoes it on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));
    let mut res = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

/// Rejects requests without an accepted bearer key, using the regular
/// error envelope.
pub async fn require_api_key(State(auth): State<AuthState>, req: Request, next: Next) -> Response {
    if auth.is_open() || bearer_token(req.headers()).is_some_and(|t| auth.accepts(t)) {
        return next.run(req).await;
    }

    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    tracing::warn!(
        request_id = %request_id,
        path = %req.uri().path(),
        "rejected request without a valid API key"
    );
    ApiError::new(request_id, "unauthorized", "missing or invalid API key").into_response()
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
