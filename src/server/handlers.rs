//! HTTP handlers for the metric update/query protocol
//!
//! Handlers see plain (already decompressed) bodies; gzip transcoding
//! is layered around the router in `mod.rs`.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    response::Html,
};
use serde_json::{Value, json};
use tracing::instrument;

use super::error::{ApiError, ApiResult};
use crate::storage::StorageBackend;
use crate::{MetricKind, MetricPayload};

type Repo = Arc<dyn StorageBackend>;

/// POST /update
///
/// Single JSON metric update. The response echoes the payload with the
/// stored (merged) value filled in.
#[instrument(skip_all, fields(id = %payload.id, kind = %payload.kind))]
pub async fn update_json(
    State(repo): State<Repo>,
    Json(mut payload): Json<MetricPayload>,
) -> ApiResult<Json<MetricPayload>> {
    if payload.id.is_empty() {
        return Err(ApiError::InvalidRequest("metric id required".to_string()));
    }

    let raw = payload.raw_value()?;
    repo.add(payload.kind, &payload.id, &raw).await?;

    let stored = repo.get(payload.kind, &payload.id).await?;
    match payload.kind {
        MetricKind::Gauge => payload.value = stored.parse().ok(),
        MetricKind::Counter => payload.delta = stored.parse().ok(),
    }

    Ok(Json(payload))
}

/// POST /updates
///
/// Batched JSON metric updates. An empty array is a no-op success.
/// The response is a plain acknowledgement, not an echo of merged
/// values.
#[instrument(skip_all, fields(count = batch.len()))]
pub async fn update_batch(
    State(repo): State<Repo>,
    Json(batch): Json<Vec<MetricPayload>>,
) -> ApiResult<Json<Value>> {
    if !batch.is_empty() {
        repo.add_batch(&batch).await?;
    }
    Ok(Json(json!({ "status": "ok" })))
}

/// POST /value
///
/// JSON query by (type, id); responds with the same shape populated
/// with the current stored value.
#[instrument(skip_all, fields(id = %payload.id, kind = %payload.kind))]
pub async fn value_json(
    State(repo): State<Repo>,
    Json(mut payload): Json<MetricPayload>,
) -> ApiResult<Json<MetricPayload>> {
    if payload.id.is_empty() {
        return Err(ApiError::InvalidRequest("metric id required".to_string()));
    }

    let stored = repo.get(payload.kind, &payload.id).await?;
    match payload.kind {
        MetricKind::Gauge => payload.value = stored.parse().ok(),
        MetricKind::Counter => payload.delta = stored.parse().ok(),
    }

    Ok(Json(payload))
}

/// POST /update/{type}/{name}/{value}
///
/// Plain-text single update.
#[instrument(skip(repo))]
pub async fn update_path(
    State(repo): State<Repo>,
    Path((kind, name, value)): Path<(String, String, String)>,
) -> ApiResult<&'static str> {
    let kind = MetricKind::from_str(&kind)?;
    repo.add(kind, &name, &value).await?;
    Ok("OK")
}

/// GET /value/{type}/{name}
///
/// Plain-text query for a single metric.
#[instrument(skip(repo))]
pub async fn value_path(
    State(repo): State<Repo>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<String> {
    let kind = MetricKind::from_str(&kind)?;
    let value = repo.get(kind, &name).await?;
    Ok(value)
}

/// GET /
///
/// HTML listing of every known metric with its formatted value.
#[instrument(skip_all)]
pub async fn list_metrics(State(repo): State<Repo>) -> ApiResult<Html<String>> {
    let metrics = repo.get_all().await?;

    let mut names: Vec<&String> = metrics.keys().collect();
    names.sort();

    let mut body = String::from("<html><body><h1>Metrics</h1><ul>");
    for name in names {
        body.push_str("<li><b>");
        body.push_str(name);
        body.push_str("</b>: ");
        body.push_str(&metrics[name]);
        body.push_str("</li>");
    }
    body.push_str("</ul></body></html>");

    Ok(Html(body))
}

/// GET /ping
///
/// Liveness check against the active backend.
pub async fn ping(State(repo): State<Repo>) -> ApiResult<&'static str> {
    repo.ping().await?;
    Ok("OK")
}
