use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use convoy_core::errors::SessionError;
use convoy_core::ids::WorkerId;
use convoy_core::transport::{ActionRequest, TransportEvent, TransportFactory, WorkerTransport};

/// Timing knobs for the simulated handshake and per-action work.
#[derive(Clone, Copy, Debug)]
pub struct LoopbackConfig {
    /// Delay before the pairing code appears.
    pub pairing_delay: Duration,
    /// Delay between pairing code and authenticated.
    pub auth_delay: Duration,
    /// Delay between authenticated and ready.
    pub ready_delay: Duration,
    /// Simulated duration of one `perform` call.
    pub action_duration: Duration,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            pairing_delay: Duration::from_millis(500),
            auth_delay: Duration::from_millis(300),
            ready_delay: Duration::from_millis(200),
            action_duration: Duration::from_millis(50),
        }
    }
}

impl LoopbackConfig {
    /// Near-instant timings, for tests that drive the engine end to end.
    pub fn fast() -> Self {
        Self {
            pairing_delay: Duration::from_millis(1),
            auth_delay: Duration::from_millis(1),
            ready_delay: Duration::from_millis(1),
            action_duration: Duration::from_millis(1),
        }
    }
}

/// In-process transport that walks the full auth lifecycle against nothing.
/// Useful for running the orchestrator without a real remote protocol and
/// for exercising the self-healing loop locally.
pub struct LoopbackTransport {
    worker_id: WorkerId,
    config: LoopbackConfig,
    released: AtomicBool,
}

impl LoopbackTransport {
    pub fn new(worker_id: WorkerId, config: LoopbackConfig) -> Self {
        Self {
            worker_id,
            config,
            released: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl WorkerTransport for LoopbackTransport {
    async fn connect(&self) -> Result<mpsc::Receiver<TransportEvent>, SessionError> {
        if self.released.load(Ordering::Relaxed) {
            return Err(SessionError::Released);
        }

        let (tx, rx) = mpsc::channel(8);
        let config = self.config;
        let worker_id = self.worker_id.clone();

        tokio::spawn(async move {
            tokio::time::sleep(config.pairing_delay).await;
            let code = format!("{:06}", rand::random::<u32>() % 1_000_000);
            if tx.send(TransportEvent::PairingCode(code)).await.is_err() {
                return;
            }

            tokio::time::sleep(config.auth_delay).await;
            if tx.send(TransportEvent::Authenticated).await.is_err() {
                return;
            }

            tokio::time::sleep(config.ready_delay).await;
            if tx.send(TransportEvent::Ready).await.is_err() {
                return;
            }

            tracing::debug!(worker_id = %worker_id, "Loopback handshake complete");
            // Keep the channel open; a loopback connection never drops on
            // its own.
            tx.closed().await;
        });

        Ok(rx)
    }

    async fn perform(&self, action: &ActionRequest) -> Result<(), SessionError> {
        if self.released.load(Ordering::Relaxed) {
            return Err(SessionError::Released);
        }
        tokio::time::sleep(self.config.action_duration).await;
        tracing::debug!(worker_id = %self.worker_id, target = %action.target, "Loopback action performed");
        Ok(())
    }

    async fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }
}

/// Factory handing out loopback transports with shared timing config.
pub struct LoopbackFactory {
    config: LoopbackConfig,
}

impl LoopbackFactory {
    pub fn new(config: LoopbackConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for LoopbackFactory {
    fn create(&self, worker_id: &WorkerId) -> Arc<dyn WorkerTransport> {
        Arc::new(LoopbackTransport::new(worker_id.clone(), self.config))
    }
}
