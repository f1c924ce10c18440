use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};

use convoy_core::events::PoolEvent;
use convoy_core::ids::WorkerId;
use convoy_core::strategy::{Strategy, StrategyContext};
use convoy_core::transport::{TransportEvent, WorkerTransport};
use convoy_core::worker::{StatusUpdate, WorkerSnapshot, WorkerState};

use crate::error::OrchestratorError;

/// Process-unique sequence distinguishing session instantiations, so the
/// registry can tell a live session's reports from a replaced one's.
static INSTANCE_SEQ: AtomicU64 = AtomicU64::new(0);

struct CachedCode {
    code: String,
    expires_at: Instant,
}

/// One independently-authenticating worker session. Exclusively owns its
/// transport; all state transitions are driven by transport events and
/// reported to the owner over the status channel — the session never
/// touches the registry's map.
pub struct WorkerSession {
    id: WorkerId,
    instance: u64,
    transport: Arc<dyn WorkerTransport>,
    state: RwLock<WorkerState>,
    pairing_code: Mutex<Option<CachedCode>>,
    last_error: Mutex<Option<String>>,
    status_tx: mpsc::UnboundedSender<StatusUpdate>,
    event_tx: broadcast::Sender<PoolEvent>,
    code_ttl: Duration,
    destroyed: AtomicBool,
}

impl WorkerSession {
    pub fn new(
        id: WorkerId,
        transport: Arc<dyn WorkerTransport>,
        status_tx: mpsc::UnboundedSender<StatusUpdate>,
        event_tx: broadcast::Sender<PoolEvent>,
        code_ttl: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            instance: INSTANCE_SEQ.fetch_add(1, Ordering::Relaxed) + 1,
            transport,
            state: RwLock::new(WorkerState::Idle),
            pairing_code: Mutex::new(None),
            last_error: Mutex::new(None),
            status_tx,
            event_tx,
            code_ttl,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn instance(&self) -> u64 {
        self.instance
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            id: self.id.clone(),
            status: self.state(),
        }
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    /// The cached pairing code, if one was issued and is still within TTL.
    pub fn pairing_code(&self) -> Option<String> {
        let mut guard = self.pairing_code.lock();
        match &*guard {
            Some(cached) if cached.expires_at > Instant::now() => Some(cached.code.clone()),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }

    /// (Re)establish the underlying connection and start consuming its
    /// events. Connection failures are absorbed here: the session moves to
    /// `error` and destroys itself, which the owner observes through the
    /// status channel.
    pub async fn initialize(self: &Arc<Self>) {
        if self.destroyed.load(Ordering::Relaxed) {
            return;
        }

        let mut rx = match self.transport.connect().await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(worker_id = %self.id, error = %e, "Session connect failed");
                *self.last_error.lock() = Some(e.to_string());
                self.transition(WorkerState::Error, Some(e.to_string()));
                self.destroy().await;
                return;
            }
        };

        self.transition(WorkerState::PendingAuth, None);

        let session = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                session.handle_event(event).await;
                if session.state().is_terminal() {
                    return;
                }
            }
            // Channel closed without a terminal event: the connection is gone.
            if !session.state().is_terminal() {
                session.on_disconnected("connection closed".to_string()).await;
            }
        });
    }

    async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::PairingCode(code) => {
                tracing::info!(worker_id = %self.id, "Pairing code available");
                *self.pairing_code.lock() = Some(CachedCode {
                    code: code.clone(),
                    expires_at: Instant::now() + self.code_ttl,
                });
                self.emit(PoolEvent::PairingCode {
                    worker_id: self.id.clone(),
                    code,
                });
            }
            TransportEvent::Authenticated => {
                self.transition(WorkerState::Authenticating, None);
            }
            TransportEvent::Ready => {
                *self.pairing_code.lock() = None;
                self.transition(WorkerState::Ready, None);
                self.emit(PoolEvent::WorkerReady {
                    worker_id: self.id.clone(),
                });
            }
            TransportEvent::AuthFailed(reason) => {
                tracing::warn!(worker_id = %self.id, reason = %reason, "Authentication failed");
                *self.last_error.lock() = Some(reason.clone());
                self.transition(WorkerState::Error, Some(reason.clone()));
                self.emit(PoolEvent::WorkerAuthFailed {
                    worker_id: self.id.clone(),
                    reason,
                });
                self.destroy().await;
            }
            TransportEvent::Disconnected(reason) => {
                self.on_disconnected(reason).await;
            }
        }
    }

    async fn on_disconnected(&self, reason: String) {
        tracing::warn!(worker_id = %self.id, reason = %reason, "Session disconnected");
        *self.last_error.lock() = Some(reason.clone());
        self.transition(WorkerState::Disconnected, Some(reason.clone()));
        self.emit(PoolEvent::WorkerDisconnected {
            worker_id: self.id.clone(),
            reason,
        });
        self.destroy().await;
    }

    /// Tear the session down. Idempotent; the transport is released on every
    /// path, including when the connection is already gone.
    pub async fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.transport.release().await;
        self.transition(WorkerState::Destroyed, None);
        tracing::debug!(worker_id = %self.id, "Session destroyed");
    }

    /// Run a strategy through this session. Fails unless the session is
    /// exactly `ready`; the strategy is never invoked otherwise.
    pub async fn dispatch(
        &self,
        strategy: &Arc<dyn Strategy>,
        target: &str,
        count: u32,
        ctx: &StrategyContext,
    ) -> Result<(), OrchestratorError> {
        {
            let mut state = self.state.write();
            if *state != WorkerState::Ready {
                return Err(OrchestratorError::NotReady {
                    worker: self.id.clone(),
                    state: *state,
                });
            }
            *state = WorkerState::Busy;
        }
        self.report(WorkerState::Busy, None);

        let result = strategy
            .execute(self.transport.as_ref(), target, count, ctx)
            .await;

        // Restore `ready` unless a terminal transition happened mid-dispatch.
        let restored = {
            let mut state = self.state.write();
            if *state == WorkerState::Busy {
                *state = WorkerState::Ready;
                true
            } else {
                false
            }
        };
        if restored {
            self.report(WorkerState::Ready, None);
        }

        result.map_err(OrchestratorError::from)
    }

    fn transition(&self, to: WorkerState, detail: Option<String>) {
        {
            let mut state = self.state.write();
            if *state == to {
                return;
            }
            tracing::debug!(worker_id = %self.id, from = %state, to = %to, "State transition");
            *state = to;
        }
        self.report(to, detail);
    }

    fn report(&self, state: WorkerState, detail: Option<String>) {
        let _ = self.status_tx.send(StatusUpdate {
            worker_id: self.id.clone(),
            instance: self.instance,
            state,
            detail,
        });
    }

    fn emit(&self, event: PoolEvent) {
        let _ = self.event_tx.send(event);
    }
}
