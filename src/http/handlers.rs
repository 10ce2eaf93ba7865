//! Shared handler plumbing
//!
//! Error mapping, caller identification and the small endpoints that do not
//! belong to a resource group.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::LibraryError;
use crate::state::AppState;
use crate::store::StoreError;

/// Header carrying the caller's owner id
pub const USER_ID_HEADER: &str = "x-user-id";

/// HTTP error type. Rendered as `{"detail": "..."}`.
#[derive(Debug)]
pub struct HttpError {
    pub status: StatusCode,
    pub detail: String,
}

impl HttpError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    /// Mapping used by the folder picker: refusals are 403, every other
    /// failure is reported as a bad request.
    pub fn picker(err: LibraryError) -> Self {
        let status = match &err {
            LibraryError::PathViolation(_) | LibraryError::PermissionDenied(_) => {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::BAD_REQUEST,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

impl From<LibraryError> for HttpError {
    fn from(err: LibraryError) -> Self {
        let status = match &err {
            LibraryError::PathViolation(_)
            | LibraryError::InvalidRange(_)
            | LibraryError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
            LibraryError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            LibraryError::Conflict(_) | LibraryError::Store(StoreError::DuplicateSource { .. }) => {
                StatusCode::CONFLICT
            }
            LibraryError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self::new(status, err.to_string())
    }
}

/// Owner id of the caller: `X-User-Id`, else the configured default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller(pub u64);

impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = HttpError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match parts.headers.get(USER_ID_HEADER) {
            None => Ok(Caller(state.config.auth.default_user_id)),
            Some(value) => value
                .to_str()
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .map(Caller)
                .ok_or_else(|| HttpError::new(StatusCode::UNAUTHORIZED, "invalid user id")),
        }
    }
}

/// Run blocking filesystem work off the async workers
pub async fn blocking<T, F>(f: F) -> Result<T, LibraryError>
where
    F: FnOnce() -> Result<T, LibraryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| LibraryError::Internal(format!("blocking task failed: {}", e)))?
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("media-library-server v", env!("CARGO_PKG_VERSION"))
}
