//! Optional bearer-token guard for the API.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::ApiError;
use crate::http::server::AppState;

/// Reject requests without `Authorization: Bearer <api.api_key>`.
///
/// The key is read from the current runtime on every request, so rotating it
/// in the config file takes effect without a restart.
pub async fn api_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let inner = state.inner.load_full();
    let Some(expected) = inner.config.api.api_key.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    if presented == Some(expected) {
        return next.run(request).await;
    }

    tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
    ApiError::new(StatusCode::UNAUTHORIZED, "unauthorized", "missing or invalid API key").into_response()
}
