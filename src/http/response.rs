//! Response bodies and error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::apache::{CommandError, SyncWarning};
use crate::service::{ServiceError, SiteChange};
use crate::site::{SiteRecord, ValidationError};

/// Body of a successful create, update, delete or resync.
///
/// `warning` carries the first failure as a single line for simple clients;
/// `warnings` has every failed step.
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub warnings: Vec<SyncWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteRecord>,
}

impl MutationResponse {
    /// `done` is used when everything synced, `saved` when the record is
    /// stored but the web server needs attention.
    pub fn from_change(change: SiteChange, done: &str, saved: &str, include_site: bool) -> Self {
        let synced = change.is_synced();
        let warnings = change.outcome.into_warnings();
        Self {
            success: true,
            message: if synced { done } else { saved }.to_string(),
            warning: warnings.first().map(|w| w.to_string()),
            warnings,
            site: include_site.then_some(change.site),
        }
    }
}

/// Output of a web server command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    kind: &'static str,
}

/// An error rendered as `{ "error": ..., "kind": ... }`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let status = match &err {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::SyncFailure(crate::apache::SyncError::Collision { .. }) => StatusCode::CONFLICT,
            ServiceError::Persistence(_) | ServiceError::SyncFailure(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, kind = self.kind, error = %self.message, "Request failed");
        }
        let body = ErrorBody {
            error: self.message,
            kind: self.kind,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Command failures keep their captured output next to the error text.
pub fn command_failure(err: CommandError) -> Response {
    let output = err
        .output()
        .map(|output| output.text().to_string())
        .unwrap_or_default();
    tracing::warn!(error = %err, "Web server command failed");
    let body = CommandResponse {
        success: false,
        message: None,
        output,
        error: Some(err.to_string()),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}
