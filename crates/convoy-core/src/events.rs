use serde::{Deserialize, Serialize};

use crate::ids::{OperationId, WorkerId};

/// Pool lifecycle events broadcast to interested observers (the
/// notification bridge, tests). These are side-channel signals, not part of
/// any operation's correctness.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PoolEvent {
    #[serde(rename = "worker_ready")]
    WorkerReady { worker_id: WorkerId },

    #[serde(rename = "worker_auth_failed")]
    WorkerAuthFailed { worker_id: WorkerId, reason: String },

    #[serde(rename = "worker_disconnected")]
    WorkerDisconnected { worker_id: WorkerId, reason: String },

    #[serde(rename = "pairing_code")]
    PairingCode { worker_id: WorkerId, code: String },

    #[serde(rename = "operation_started")]
    OperationStarted {
        operation_id: OperationId,
        target: String,
        strategy: String,
        workers: usize,
    },

    #[serde(rename = "operation_worker_failed")]
    OperationWorkerFailed {
        operation_id: OperationId,
        worker_id: WorkerId,
        reason: String,
    },

    #[serde(rename = "operation_completed")]
    OperationCompleted {
        operation_id: OperationId,
        succeeded: usize,
        failed: usize,
    },
}

impl PoolEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WorkerReady { .. } => "worker_ready",
            Self::WorkerAuthFailed { .. } => "worker_auth_failed",
            Self::WorkerDisconnected { .. } => "worker_disconnected",
            Self::PairingCode { .. } => "pairing_code",
            Self::OperationStarted { .. } => "operation_started",
            Self::OperationWorkerFailed { .. } => "operation_worker_failed",
            Self::OperationCompleted { .. } => "operation_completed",
        }
    }
}
