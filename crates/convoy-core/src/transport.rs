use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::SessionError;
use crate::ids::WorkerId;

/// Events emitted by an underlying connection while it authenticates and
/// runs. Delivered in emission order; a session handles them one at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A pairing/auth challenge token became available.
    PairingCode(String),
    /// Credentials were accepted; the connection is finishing setup.
    Authenticated,
    /// The connection is fully usable.
    Ready,
    /// Authentication failed terminally.
    AuthFailed(String),
    /// The connection dropped.
    Disconnected(String),
}

/// One unit of externally visible work issued through a worker's connection.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ActionRequest {
    pub target: String,
    pub payload: serde_json::Value,
}

impl ActionRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// The connection a worker session exclusively owns. Implementations wrap
/// whatever remote protocol the deployment talks; the engine only sees this
/// seam.
#[async_trait]
pub trait WorkerTransport: Send + Sync {
    /// (Re)establish the connection and start the auth flow. The returned
    /// receiver yields lifecycle events until the connection ends.
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, SessionError>;

    /// Perform one unit of work. Only valid once `Ready` was observed.
    async fn perform(&self, action: &ActionRequest) -> Result<(), SessionError>;

    /// Tear the connection down. Must be idempotent and safe to call at any
    /// point, including mid-failure.
    async fn release(&self);
}

/// Creates transports for the registry when it (re)spawns a session.
pub trait TransportFactory: Send + Sync {
    fn create(&self, worker_id: &WorkerId) -> Arc<dyn WorkerTransport>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_request_builder() {
        let action = ActionRequest::new("T1").with_payload(serde_json::json!({"n": 1}));
        assert_eq!(action.target, "T1");
        assert_eq!(action.payload["n"], 1);
    }

    #[test]
    fn action_request_defaults_to_null_payload() {
        let action = ActionRequest::new("T1");
        assert!(action.payload.is_null());
    }
}
