//! API handlers. Each one loads the current runtime and calls the service.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::http::response::{command_failure, ApiError, CommandResponse, MutationResponse};
use crate::http::server::AppState;
use crate::net::ActiveService;
use crate::service::SiteStatus;
use crate::site::{SiteDraft, SiteRecord};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub sites: usize,
}

fn parse_body(body: Result<Json<SiteDraft>, JsonRejection>) -> Result<SiteRecord, ApiError> {
    let Json(draft) = body.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    Ok(draft.into_record()?)
}

pub async fn list_sites(State(state): State<AppState>) -> Result<Json<Vec<SiteRecord>>, ApiError> {
    let runtime = state.runtime();
    Ok(Json(runtime.service.list().await?))
}

pub async fn get_site(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<SiteRecord>, ApiError> {
    let runtime = state.runtime();
    Ok(Json(runtime.service.get(&domain).await?))
}

pub async fn create_site(
    State(state): State<AppState>,
    body: Result<Json<SiteDraft>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let record = parse_body(body)?;
    let runtime = state.runtime();
    let change = runtime.service.create(record).await?;
    Ok(Json(MutationResponse::from_change(
        change,
        "Site created and Apache reloaded",
        "Site configuration saved. Apache update requires manual action.",
        true,
    )))
}

pub async fn update_site(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    body: Result<Json<SiteDraft>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let record = parse_body(body)?;
    let runtime = state.runtime();
    let change = runtime.service.update(&domain, record).await?;
    Ok(Json(MutationResponse::from_change(
        change,
        "Site updated",
        "Site configuration updated. Apache update requires manual action.",
        true,
    )))
}

pub async fn delete_site(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<MutationResponse>, ApiError> {
    let runtime = state.runtime();
    let change = runtime.service.delete(&domain).await?;
    Ok(Json(MutationResponse::from_change(
        change,
        "Site deleted",
        "Site configuration deleted. Apache update requires manual action.",
        false,
    )))
}

pub async fn resync_site(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<MutationResponse>, ApiError> {
    let runtime = state.runtime();
    let change = runtime.service.resync(&domain).await?;
    Ok(Json(MutationResponse::from_change(
        change,
        "Site re-synced",
        "Site config rewritten. Apache update requires manual action.",
        true,
    )))
}

pub async fn site_status(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<SiteStatus>, ApiError> {
    let runtime = state.runtime();
    Ok(Json(runtime.service.status(&domain).await?))
}

pub async fn apache_test(State(state): State<AppState>) -> Response {
    let runtime = state.runtime();
    match runtime.service.test_config().await {
        Ok(output) => Json(CommandResponse {
            success: true,
            message: None,
            output: output.text().to_string(),
            error: None,
        })
        .into_response(),
        Err(e) => command_failure(e),
    }
}

pub async fn apache_reload(State(state): State<AppState>) -> Response {
    let runtime = state.runtime();
    match runtime.service.reload().await {
        Ok(output) => Json(CommandResponse {
            success: true,
            message: Some("Apache reloaded".to_string()),
            output: output.text().to_string(),
            error: None,
        })
        .into_response(),
        Err(e) => command_failure(e),
    }
}

pub async fn active_services(State(state): State<AppState>) -> Json<Vec<ActiveService>> {
    let runtime = state.runtime();
    Json(runtime.scanner.scan().await)
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<SystemStatus>, ApiError> {
    let runtime = state.runtime();
    let sites = runtime.service.list().await?.len();
    Ok(Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        sites,
    }))
}
