use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::ApiError;
use super::AppState;
use crate::error::ManagerError;
use crate::haproxy::{DeployReport, ValidationReport};
use crate::pipeline::GenerateReport;
use crate::section::{MetadataPatch, Section, SectionSubmission};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

/// Body of a touch request. Both the body and `meta` may be omitted.
#[derive(Debug, Default, Deserialize)]
pub struct TouchRequest {
    #[serde(default)]
    pub meta: Map<String, Value>,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match state.pipeline.metrics().gather() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain")],
            e.to_string(),
        ),
    }
}

pub async fn list_sections(State(state): State<AppState>) -> Result<Json<Vec<Section>>, ApiError> {
    Ok(Json(state.pipeline.list_sections().await?))
}

pub async fn create_section(
    State(state): State<AppState>,
    body: Result<Json<SectionSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<Section>), ApiError> {
    let Json(submission) = body.map_err(|e| ManagerError::invalid("body", e.body_text()))?;
    let section = state.pipeline.create_section(submission).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

pub async fn get_section(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
) -> Result<Json<Section>, ApiError> {
    Ok(Json(state.pipeline.get_section(&checksum).await?))
}

pub async fn touch_section(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
    body: Bytes,
) -> Result<Json<Section>, ApiError> {
    let request: TouchRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TouchRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ManagerError::invalid("meta", e.to_string()))?
    };

    let section = state
        .pipeline
        .touch_section(&checksum, MetadataPatch::new(request.meta))
        .await?;
    Ok(Json(section))
}

pub async fn delete_section(
    State(state): State<AppState>,
    Path(checksum): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.pipeline.delete_section(&checksum).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn preview_configuration(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let text = state.pipeline.preview().await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

pub async fn generate_configuration(
    State(state): State<AppState>,
) -> Result<Json<GenerateReport>, ApiError> {
    Ok(Json(state.pipeline.generate().await?))
}

pub async fn validate_configuration(
    State(state): State<AppState>,
) -> Result<Json<ValidationReport>, ApiError> {
    Ok(Json(state.pipeline.validate().await?))
}

pub async fn deploy_configuration(
    State(state): State<AppState>,
) -> Result<Json<DeployReport>, ApiError> {
    Ok(Json(state.pipeline.deploy().await?))
}
