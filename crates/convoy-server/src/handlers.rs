use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use convoy_core::ids::WorkerId;
use convoy_core::worker::WorkerSnapshot;
use convoy_engine::OrchestratorError;

use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub workers: WorkerSummary,
    pub queue_size: usize,
    pub active_operations: Vec<convoy_core::operation::Operation>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerSummary {
    pub total: usize,
    pub active: usize,
    pub statuses: Vec<WorkerSnapshot>,
}

/// Pool and operation state, pure read.
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        workers: WorkerSummary {
            total: state.registry.len(),
            active: state.registry.ready_count(),
            statuses: state.registry.snapshot(),
        },
        queue_size: state.coordinator.active_count(),
        active_operations: state.coordinator.operations(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWorkerResponse {
    pub worker_id: WorkerId,
    pub pairing_token: Option<String>,
    pub message: String,
}

/// Provision a new worker and wait for its pairing code. The code comes from
/// the external auth flow at its own pace, so this polls the session's cache
/// up to a ceiling; past it the worker keeps initializing in the background
/// and the caller re-polls `/status`.
pub async fn add_worker(State(state): State<AppState>) -> Response {
    let worker_id = state.registry.next_identity();
    tracing::info!(worker_id = %worker_id, "Provisioning worker");
    state.registry.ensure(&worker_id).await;

    for _ in 0..state.add_poll_ceiling {
        if let Some(code) = state.registry.pairing_code(&worker_id) {
            return (
                StatusCode::OK,
                Json(AddWorkerResponse {
                    worker_id,
                    pairing_token: Some(code),
                    message: "worker provisioned".into(),
                }),
            )
                .into_response();
        }
        tokio::time::sleep(state.add_poll_interval).await;
    }

    (
        StatusCode::ACCEPTED,
        Json(AddWorkerResponse {
            worker_id,
            pairing_token: None,
            message: "worker is still initializing; poll /status for its pairing state".into(),
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveWorkerRequest {
    pub worker_id: WorkerId,
}

pub async fn remove_worker(
    State(state): State<AppState>,
    Json(request): Json<RemoveWorkerRequest>,
) -> Response {
    match state.registry.remove(&request.worker_id).await {
        Ok(()) => message_response(
            StatusCode::OK,
            format!("worker {} removed", request.worker_id),
        ),
        Err(OrchestratorError::WorkerNotFound(id)) => {
            message_response(StatusCode::NOT_FOUND, format!("worker {id} not found"))
        }
        Err(e) => message_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOperationRequest {
    pub target: String,
    pub strategy_kind: String,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOperationResponse {
    pub message: String,
    pub operation_id: convoy_core::ids::OperationId,
}

/// Accept a job. Validation failures map to 400, an empty ready pool to 503;
/// an accepted job returns its operation identity immediately.
pub async fn submit_operation(
    State(state): State<AppState>,
    Json(request): Json<SubmitOperationRequest>,
) -> Response {
    match state
        .coordinator
        .submit(&request.target, &request.strategy_kind, request.count)
    {
        Ok(operation_id) => (
            StatusCode::OK,
            Json(SubmitOperationResponse {
                message: "operation accepted".into(),
                operation_id,
            }),
        )
            .into_response(),
        Err(e @ OrchestratorError::NoWorkersAvailable) => {
            message_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(
            e @ (OrchestratorError::InvalidRequest(_) | OrchestratorError::UnknownStrategy(_)),
        ) => message_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) => message_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

pub async fn metrics(State(state): State<AppState>) -> Json<convoy_telemetry::MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

fn message_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "message": message }))).into_response()
}
