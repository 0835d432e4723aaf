//! HTTP service implementations.
//!
//! Bridges axum routes to the `LwwStore` merge engine. Both local writes
//! (clients sending negative timestamps) and peer anti-entropy pushes
//! arrive on `POST /patch`.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use driftkv_common::{decode_batch, Record, WirePatch};
use driftkv_store::LwwStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ApiState {
    pub store: Arc<LwwStore>,
    pub peers: Arc<Vec<String>>,
    pub start_time: Instant,
}

impl ApiState {
    pub fn new(store: Arc<LwwStore>, peers: Vec<String>) -> Self {
        Self {
            store,
            peers: Arc::new(peers),
            start_time: Instant::now(),
        }
    }
}

/// Build the axum `Router` with all routes.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/patch", post(patch))
        .route("/getKey", post(get_key))
        .route("/health", get(health))
        .route("/stats", get(stats))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    BadRequest(String),
    #[error("key not found")]
    NotFound,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Parse a JSON body, mapping every decode failure to a 400.
fn parse_json<T: serde::de::DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

async fn patch(State(state): State<ApiState>, body: Bytes) -> Result<StatusCode, ApiError> {
    let wire: Vec<WirePatch> = match parse_json(&body) {
        Ok(wire) => wire,
        Err(e) => {
            driftkv_metrics::record_request("patch", e.status().as_u16());
            return Err(e);
        }
    };

    tracing::debug!(
        node = %state.store.node_id(),
        "received {} operation(s) for patch",
        wire.len()
    );
    let summary = state.store.apply(decode_batch(wire));
    tracing::debug!(
        accepted = summary.accepted,
        rejected = summary.rejected,
        "patch applied"
    );

    driftkv_metrics::record_request("patch", StatusCode::OK.as_u16());
    Ok(StatusCode::OK)
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct GetKeyRequest {
    pub key: String,
}

async fn get_key(State(state): State<ApiState>, body: Bytes) -> Result<Json<Record>, ApiError> {
    let result = parse_json::<GetKeyRequest>(&body)
        .and_then(|req| state.store.get(&req.key).ok_or(ApiError::NotFound));

    let status = match &result {
        Ok(_) => StatusCode::OK,
        Err(e) => e.status(),
    };
    driftkv_metrics::record_request("getKey", status.as_u16());

    result.map(Json)
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        node_id: state.store.node_id().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub node_id: String,
    pub keys: usize,
    pub clock: u64,
    pub peers: Vec<String>,
}

async fn stats(State(state): State<ApiState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        node_id: state.store.node_id().to_string(),
        keys: state.store.len(),
        clock: state.store.clock(),
        peers: state.peers.as_ref().clone(),
    })
}
