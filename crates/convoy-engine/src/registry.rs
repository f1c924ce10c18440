use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};

use convoy_core::events::PoolEvent;
use convoy_core::ids::WorkerId;
use convoy_core::transport::TransportFactory;
use convoy_core::worker::{StatusUpdate, WorkerSnapshot, WorkerState};
use convoy_telemetry::MetricsRegistry;

use crate::error::OrchestratorError;
use crate::session::WorkerSession;

#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
    /// Delay before a terminal session is re-created.
    pub respawn_backoff: Duration,
    /// How long a cached pairing code stays servable.
    pub pairing_code_ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            respawn_backoff: Duration::from_secs(5),
            pairing_code_ttl: Duration::from_secs(60),
        }
    }
}

/// Owner of all worker sessions. Keeps the pool at its intended size by
/// re-creating sessions that report a terminal state, after a fixed backoff.
///
/// The session list preserves insertion order so `list_ready` is stable and
/// deterministic for a given pool history.
pub struct WorkerPoolRegistry {
    factory: Arc<dyn TransportFactory>,
    sessions: RwLock<Vec<Arc<WorkerSession>>>,
    status_tx: mpsc::UnboundedSender<StatusUpdate>,
    event_tx: broadcast::Sender<PoolEvent>,
    metrics: MetricsRegistry,
    config: RegistryConfig,
    /// Identities with a respawn already scheduled, so a session that
    /// reports both `error` and `destroyed` heals once, not twice.
    healing: Mutex<HashSet<WorkerId>>,
    next_slot: AtomicUsize,
}

impl WorkerPoolRegistry {
    pub fn new(
        factory: Arc<dyn TransportFactory>,
        event_tx: broadcast::Sender<PoolEvent>,
        metrics: MetricsRegistry,
        config: RegistryConfig,
    ) -> Arc<Self> {
        let (status_tx, status_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Self {
            factory,
            sessions: RwLock::new(Vec::new()),
            status_tx,
            event_tx,
            metrics,
            config,
            healing: Mutex::new(HashSet::new()),
            next_slot: AtomicUsize::new(0),
        });

        tokio::spawn(Self::status_loop(Arc::downgrade(&registry), status_rx));
        registry
    }

    /// Create sessions `w1..wN` for the initial pool.
    pub async fn populate(&self, size: usize) {
        for _ in 0..size {
            let id = self.next_identity();
            self.ensure(&id).await;
        }
    }

    /// Allocate the next stable slot name.
    pub fn next_identity(&self) -> WorkerId {
        let n = self.next_slot.fetch_add(1, Ordering::Relaxed) + 1;
        WorkerId::from_raw(format!("w{n}"))
    }

    /// Create a session for `id`, gracefully replacing any existing one.
    /// Always leaves exactly one live session per identity.
    pub async fn ensure(&self, id: &WorkerId) -> Arc<WorkerSession> {
        let transport = self.factory.create(id);
        let session = WorkerSession::new(
            id.clone(),
            transport,
            self.status_tx.clone(),
            self.event_tx.clone(),
            self.config.pairing_code_ttl,
        );

        let old = {
            let mut sessions = self.sessions.write();
            let old = sessions
                .iter()
                .position(|s| s.id() == id)
                .map(|pos| sessions.remove(pos));
            sessions.push(Arc::clone(&session));
            old
        };
        if let Some(old) = old {
            tracing::info!(worker_id = %id, "Replacing existing session");
            old.destroy().await;
        }

        session.initialize().await;
        session
    }

    /// Gracefully destroy and evict a session.
    pub async fn remove(&self, id: &WorkerId) -> Result<(), OrchestratorError> {
        let session = self
            .get(id)
            .ok_or_else(|| OrchestratorError::WorkerNotFound(id.clone()))?;

        session.destroy().await;

        let mut sessions = self.sessions.write();
        if let Some(pos) = sessions.iter().position(|s| s.id() == id) {
            sessions.remove(pos);
        }
        tracing::info!(worker_id = %id, "Session removed");
        Ok(())
    }

    pub fn get(&self, id: &WorkerId) -> Option<Arc<WorkerSession>> {
        self.sessions.read().iter().find(|s| s.id() == id).cloned()
    }

    /// Sessions currently in `ready`, in insertion order.
    pub fn list_ready(&self) -> Vec<Arc<WorkerSession>> {
        self.sessions
            .read()
            .iter()
            .filter(|s| s.state() == WorkerState::Ready)
            .cloned()
            .collect()
    }

    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        self.sessions.read().iter().map(|s| s.snapshot()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn ready_count(&self) -> usize {
        self.sessions
            .read()
            .iter()
            .filter(|s| s.state() == WorkerState::Ready)
            .count()
    }

    /// TTL-bounded pairing code lookup; never re-triggers initialization.
    pub fn pairing_code(&self, id: &WorkerId) -> Option<String> {
        self.get(id).and_then(|s| s.pairing_code())
    }

    async fn status_loop(weak: Weak<Self>, mut rx: mpsc::UnboundedReceiver<StatusUpdate>) {
        while let Some(update) = rx.recv().await {
            let Some(registry) = weak.upgrade() else {
                break;
            };
            registry.on_status(update);
        }
    }

    fn on_status(self: &Arc<Self>, update: StatusUpdate) {
        tracing::debug!(
            worker_id = %update.worker_id,
            state = %update.state,
            detail = update.detail.as_deref().unwrap_or(""),
            "Worker status",
        );
        self.metrics.gauge_set("pool_ready", self.ready_count() as i64);

        if !update.state.is_terminal() {
            return;
        }

        // Only heal when the reporting instance is still the live entry:
        // replaced and explicitly removed sessions emit terminal reports too.
        let current = self.get(&update.worker_id);
        let is_live = current.map(|s| s.instance() == update.instance).unwrap_or(false);
        if !is_live {
            return;
        }
        if !self.healing.lock().insert(update.worker_id.clone()) {
            return;
        }

        let backoff = self.config.respawn_backoff;
        let weak = Arc::downgrade(self);
        let worker_id = update.worker_id;
        let instance = update.instance;
        tokio::spawn(async move {
            tokio::time::sleep(backoff).await;
            let Some(registry) = weak.upgrade() else {
                return;
            };
            registry.healing.lock().remove(&worker_id);

            // Bail if the entry changed hands while we slept.
            let still_live = registry
                .get(&worker_id)
                .map(|s| s.instance() == instance)
                .unwrap_or(false);
            if !still_live {
                return;
            }

            tracing::info!(worker_id = %worker_id, "Re-creating terminal session");
            registry.metrics.increment("workers_respawned", 1);
            registry.ensure(&worker_id).await;
        });
    }
}
