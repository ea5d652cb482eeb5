//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;
use txflow::{ContractStatus, LifecycleEntity, LifecyclePhase, ReceiptWaiter};

use crate::clock::Clock;
use crate::errors::GatewayError;
use crate::rpc::RpcClient;
use crate::runs::{RunRegistry, RunSnapshot};
use crate::steps::{self, StepRequest};

pub struct ApiState {
    pub runs: RunRegistry,
    pub rpc: Arc<RpcClient>,
    pub receipts: Arc<dyn ReceiptWaiter>,
    pub client: Client,
    pub clock: Arc<dyn Clock>,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateRunRequest {
    pub steps: Vec<StepRequest>,
}

#[derive(Serialize)]
pub struct ExecuteResponse {
    pub executed: bool,
    pub run: RunSnapshot,
}

#[derive(Deserialize)]
pub struct LifecycleRequest {
    pub entities: Vec<LifecycleEntity>,
    /// Evaluate at this time instead of reading the clock.
    #[serde(default)]
    pub now: Option<i64>,
}

#[derive(Serialize)]
pub struct ProgressEntry {
    pub progress: f64,
    pub phase: LifecyclePhase,
}

#[derive(Serialize)]
pub struct StatusEntry {
    #[serde(flatten)]
    pub status: ContractStatus,
    pub phase: LifecyclePhase,
}

#[derive(Serialize)]
pub struct LifecycleResponse<T> {
    pub now: i64,
    pub results: Vec<T>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = match &self {
            GatewayError::RunNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            GatewayError::Http(_) | GatewayError::Rpc { .. } | GatewayError::ReceiptTimeout(_) => {
                StatusCode::BAD_GATEWAY
            }
            GatewayError::Json(_) | GatewayError::Config(_) | GatewayError::Execution(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            warn!("Request failed: {self}");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, GatewayError>;

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /runs`
///
/// Validates the steps and initializes a run with every step pending.
pub async fn create_run(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<CreateRunRequest>,
) -> ApiResult<impl IntoResponse> {
    let steps = steps::build_steps(req.steps, &state.rpc, &state.client)?;
    let handle = state.runs.create(steps, state.receipts.clone()).await;
    Ok((StatusCode::CREATED, Json(handle.snapshot())))
}

/// `GET /runs/:id`
pub async fn get_run(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<RunSnapshot>> {
    Ok(Json(state.runs.get(id).await?.snapshot()))
}

/// `POST /runs/:id/steps/:index/execute`
///
/// Executes a single step. Callers drive the sequence themselves and should
/// stop once `run.is_error` is set.
pub async fn execute_step(
    State(state): State<Arc<ApiState>>,
    Path((id, index)): Path<(u64, usize)>,
) -> ApiResult<Json<ExecuteResponse>> {
    let (executed, run) = state.runs.execute_step(id, index).await?;
    Ok(Json(ExecuteResponse { executed, run }))
}

/// `POST /runs/:id/execute`
///
/// Executes the remaining steps in order, stopping at the first failure.
pub async fn execute_run(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<Json<ExecuteResponse>> {
    let (executed, run) = state.runs.execute_remaining(id).await?;
    Ok(Json(ExecuteResponse { executed, run }))
}

/// `DELETE /runs/:id`
pub async fn delete_run(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state.runs.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /lifecycle/progress`
///
/// Elapsed-term progress per entity, with `-2` for archived and `-1` for
/// finished contracts.
pub async fn lifecycle_progress(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LifecycleRequest>,
) -> ApiResult<Json<LifecycleResponse<ProgressEntry>>> {
    let now = resolve_now(state.clock.as_ref(), req.now).await?;
    let results = req
        .entities
        .iter()
        .map(|e| ProgressEntry {
            progress: e.progress(now).as_sentinel(),
            phase: e.phase(now),
        })
        .collect();
    Ok(Json(LifecycleResponse { now, results }))
}

/// `POST /lifecycle/status`
///
/// Running / closed-early / success view per entity.
pub async fn lifecycle_status(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LifecycleRequest>,
) -> ApiResult<Json<LifecycleResponse<StatusEntry>>> {
    let now = resolve_now(state.clock.as_ref(), req.now).await?;
    let results = req
        .entities
        .iter()
        .map(|e| StatusEntry {
            status: e.status(now),
            phase: e.phase(now),
        })
        .collect();
    Ok(Json(LifecycleResponse { now, results }))
}

async fn resolve_now(clock: &dyn Clock, now: Option<i64>) -> ApiResult<i64> {
    match now {
        Some(now) => Ok(now),
        None => clock.now_seconds().await,
    }
}
