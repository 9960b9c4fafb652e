//! Route handlers and the error-to-status mapping.

use super::HttpState;
use super::dashboard;
use crate::domain::errors::MetricsError;
use crate::domain::metric::{Metric, MetricKind, MetricQuery};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;

/// Handler failure, rendered as `{"error": "..."}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<MetricsError> for ApiError {
    fn from(err: MetricsError) -> Self {
        let status = match &err {
            MetricsError::Validation { .. } | MetricsError::Signature { .. } => StatusCode::BAD_REQUEST,
            MetricsError::NotFound { .. } => StatusCode::NOT_FOUND,
            MetricsError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            MetricsError::Connect { .. } => StatusCode::BAD_GATEWAY,
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Positional routes answer an unknown type with 501.
fn path_kind(raw: &str) -> ApiResult<MetricKind> {
    raw.parse()
        .map_err(|e: MetricsError| ApiError::new(StatusCode::NOT_IMPLEMENTED, e.to_string()))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> ApiResult<T> {
    serde_json::from_slice(body).map_err(|e| MetricsError::from(e).into())
}

pub async fn ping(State(state): State<HttpState>) -> ApiResult<StatusCode> {
    state.gateway.ping().await?;
    Ok(StatusCode::OK)
}

pub async fn index(State(state): State<HttpState>) -> ApiResult<Html<String>> {
    let metrics = state.gateway.find_all().await?;
    Ok(Html(dashboard::render(&metrics)))
}

pub async fn value_json(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Metric>> {
    let query: MetricQuery = parse_body(&body)?;
    let metric = state.gateway.find(&query.id, query.kind).await?;
    Ok(Json(metric))
}

pub async fn value_path(
    State(state): State<HttpState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<String> {
    let kind = path_kind(&kind)?;
    let metric = state.gateway.find(&name, kind).await?;
    Ok(metric.value.render())
}

pub async fn update_json(State(state): State<HttpState>, body: Bytes) -> ApiResult<Json<Metric>> {
    let metric: Metric = parse_body(&body)?;
    let stored = state.gateway.update(metric).await?;
    Ok(Json(stored))
}

pub async fn update_path(
    State(state): State<HttpState>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> ApiResult<String> {
    let kind = path_kind(&kind)?;
    Ok(state.gateway.update_legacy(kind, &name, &value).await?)
}

pub async fn update_batch(State(state): State<HttpState>, body: Bytes) -> ApiResult<StatusCode> {
    let metrics: Vec<Metric> = parse_body(&body)?;
    state.gateway.update_batch(metrics).await?;
    Ok(StatusCode::OK)
}
