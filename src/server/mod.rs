//! HTTP server for the metrics collector
//!
//! ## Architecture
//!
//! - **Axum** web framework with Tower middleware
//! - **One shared repository** behind the `StorageBackend` trait,
//!   selected once at startup
//! - **Gzip transcoding** at the edge: request bodies are decompressed
//!   and responses compressed by tower-http layers, so handlers only
//!   ever see plain bodies
//!
//! ## Endpoints
//!
//! - `POST /update` - single JSON metric, echoes the merged value
//! - `POST /updates` - JSON batch, acknowledgement only
//! - `POST /value` - JSON query by (type, id)
//! - `POST /update/{type}/{name}/{value}` - plain-text update
//! - `GET /value/{type}/{name}` - plain-text query
//! - `GET /` - HTML listing of all metrics
//! - `GET /ping` - backend liveness

pub mod error;
pub mod handlers;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::compression::CompressionLayer;
use tower_http::decompression::RequestDecompressionLayer;
use tower_http::trace::TraceLayer;

use crate::storage::StorageBackend;

/// Build the collector router around a shared repository.
pub fn router(repo: Arc<dyn StorageBackend>) -> Router {
    Router::new()
        .route("/", get(handlers::list_metrics))
        .route("/ping", get(handlers::ping))
        .route("/update", post(handlers::update_json))
        .route("/updates", post(handlers::update_batch))
        .route("/value", post(handlers::value_json))
        .route("/update/:kind/:name/:value", post(handlers::update_path))
        .route("/value/:kind/:name", get(handlers::value_path))
        .with_state(repo)
        .layer(CompressionLayer::new())
        .layer(RequestDecompressionLayer::new())
        .layer(TraceLayer::new_for_http())
}
