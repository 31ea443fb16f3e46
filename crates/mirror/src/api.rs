//! HTTP API for health checks, Prometheus metrics and route queries
//!
//! Every route handler reads the snapshot table directly. Reads never wait
//! for the upstream; during a refresh they see the previous pass or the
//! newly merged row for each key.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use mirror_lib::{
    health::{ComponentStatus, HealthRegistry},
    sync::SyncState,
    PathAttributes, RouteKey, RouteRow, RouteTable, RowError,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub table: Arc<RouteTable>,
    pub sync_state: watch::Receiver<SyncState>,
}

impl AppState {
    pub fn new(
        health_registry: HealthRegistry,
        table: Arc<RouteTable>,
        sync_state: watch::Receiver<SyncState>,
    ) -> Self {
        Self {
            health_registry,
            table,
            sync_state,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidKey(#[from] RowError),

    #[error("no route for {0}")]
    NotFound(RouteKey),

    #[error("no route after {0}")]
    EndOfTable(RouteKey),

    #[error("route table is empty")]
    EmptyTable,

    #[error("failed to encode metrics: {0}")]
    Metrics(#[from] prometheus::Error),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) | ApiError::EndOfTable(_) | ApiError::EmptyTable => {
                StatusCode::NOT_FOUND
            }
            ApiError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.status_code();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (code, Json(body)).into_response()
    }
}

/// One row of the local table as served to queriers
#[derive(Debug, Serialize)]
pub struct RouteEntry {
    pub prefix: Ipv4Addr,
    pub prefix_len: u8,
    pub peer: Ipv4Addr,
    /// Token of the pass that last confirmed this row
    pub generation: u32,
    pub attributes: PathAttributes,
}

impl From<&RouteRow> for RouteEntry {
    fn from(row: &RouteRow) -> Self {
        let key = row.key();
        Self {
            prefix: key.prefix,
            prefix_len: key.prefix_len,
            peer: key.peer,
            generation: row.generation().value(),
            attributes: row.attributes().clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub state: SyncState,
    pub table_rows: usize,
    pub ready: bool,
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy => StatusCode::OK,
        ComponentStatus::Degraded => StatusCode::OK, // Still serving the last table
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 once the first pass has landed
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer)?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Engine phase and table size
async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let ready = state.health_registry.readiness().await.ready;
    let sync_state = *state.sync_state.borrow();

    Json(StatusResponse {
        state: sync_state,
        table_rows: state.table.len(),
        ready,
    })
}

/// Every row in key order
async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<RouteEntry>> {
    let snapshot = state.table.snapshot();
    Json(snapshot.iter().map(RouteEntry::from).collect())
}

async fn get_route(
    State(state): State<Arc<AppState>>,
    Path((prefix, prefix_len, peer)): Path<(Ipv4Addr, u8, Ipv4Addr)>,
) -> Result<Json<RouteEntry>, ApiError> {
    let key = RouteKey::new(prefix, prefix_len, peer)?;
    let row = state.table.get(&key).ok_or(ApiError::NotFound(key))?;
    Ok(Json(RouteEntry::from(&row)))
}

/// The lowest row, where a table walk starts
async fn first_route(State(state): State<Arc<AppState>>) -> Result<Json<RouteEntry>, ApiError> {
    let row = state.table.first().ok_or(ApiError::EmptyTable)?;
    Ok(Json(RouteEntry::from(&row)))
}

/// The row following the given index, which need not exist itself.
/// The index is taken as sent, host bits included.
async fn next_route(
    State(state): State<Arc<AppState>>,
    Path((prefix, prefix_len, peer)): Path<(Ipv4Addr, u8, Ipv4Addr)>,
) -> Result<Json<RouteEntry>, ApiError> {
    let index = RouteKey::index(prefix, prefix_len, peer)?;
    let row = state
        .table
        .next_after(&index)
        .ok_or(ApiError::EndOfTable(index))?;
    Ok(Json(RouteEntry::from(&row)))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/status", get(status))
        .route("/routes", get(list_routes))
        .route("/routes/first", get(first_route))
        .route("/routes/:prefix/:len/:peer", get(get_route))
        .route("/routes/:prefix/:len/:peer/next", get(next_route))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
