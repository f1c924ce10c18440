use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use convoy_core::events::PoolEvent;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification endpoint returned {0}")]
    Status(u16),
}

/// Outbound operator notifications. Delivery is best-effort; callers log
/// failures and move on.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError>;
}

/// Posts `{ "text": ... }` to an operator webhook.
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(10))
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(response.status().as_u16()))
        }
    }
}

/// Human-readable line for each pool event. Events the operator has no use
/// for return `None` and are skipped.
pub fn format_event(event: &PoolEvent) -> Option<String> {
    match event {
        PoolEvent::WorkerReady { worker_id } => Some(format!("Worker {worker_id} is ready")),
        PoolEvent::WorkerAuthFailed { worker_id, reason } => {
            Some(format!("Worker {worker_id} failed authentication: {reason}"))
        }
        PoolEvent::WorkerDisconnected { worker_id, reason } => {
            Some(format!("Worker {worker_id} disconnected: {reason}"))
        }
        PoolEvent::PairingCode { worker_id, code } => {
            Some(format!("Worker {worker_id} pairing code: {code}"))
        }
        PoolEvent::OperationStarted {
            operation_id,
            target,
            strategy,
            workers,
        } => Some(format!(
            "Operation {operation_id} started: {strategy} against {target} on {workers} worker(s)"
        )),
        PoolEvent::OperationWorkerFailed {
            operation_id,
            worker_id,
            reason,
        } => Some(format!(
            "Operation {operation_id}: worker {worker_id} failed ({reason})"
        )),
        PoolEvent::OperationCompleted {
            operation_id,
            succeeded,
            failed,
        } => Some(format!(
            "Operation {operation_id} completed: {succeeded} succeeded, {failed} failed"
        )),
    }
}

/// Subscribe to the pool event broadcast and forward each event to the sink,
/// fire-and-forget. Delivery failures are logged and never propagate; a
/// lagged receiver logs the gap and keeps going.
pub fn start_notification_bridge(
    sink: Arc<dyn NotificationSink>,
    mut rx: broadcast::Receiver<PoolEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    let Some(text) = format_event(&event) else {
                        continue;
                    };
                    if let Err(e) = sink.deliver(&text).await {
                        tracing::warn!(
                            event = event.event_type(),
                            error = %e,
                            "Notification delivery failed",
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification bridge lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Notification bridge channel closed");
                    break;
                }
            }
        }
    })
}
