use convoy_core::errors::SessionError;
use convoy_core::ids::WorkerId;
use convoy_core::strategy::StrategyError;
use convoy_core::worker::WorkerState;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// Dispatch attempted on a session not in `ready` state. Recorded as a
    /// per-worker failure by the coordinator, never propagated further.
    #[error("worker {worker} not ready (state: {state})")]
    NotReady { worker: WorkerId, state: WorkerState },

    /// Remove/lookup on an unknown identity. Surfaced as 404.
    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    /// Submission with an empty ready pool. Surfaced as 503, never retried
    /// by the coordinator.
    #[error("no ready workers available")]
    NoWorkersAvailable,

    /// Rejected at submission time rather than discovered mid-execution.
    #[error("unknown strategy kind: {0}")]
    UnknownStrategy(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Strategy(#[from] StrategyError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_message_names_state() {
        let err = OrchestratorError::NotReady {
            worker: WorkerId::from_raw("w1"),
            state: WorkerState::Disconnected,
        };
        let msg = err.to_string();
        assert!(msg.contains("w1"));
        assert!(msg.contains("disconnected"));
    }

    #[test]
    fn strategy_error_converts() {
        let err: OrchestratorError = StrategyError::Cancelled.into();
        assert!(matches!(err, OrchestratorError::Strategy(StrategyError::Cancelled)));
    }
}
