use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use convoy_core::events::PoolEvent;
use convoy_core::ids::{OperationId, WorkerId};
use convoy_core::operation::{Operation, OperationStatus, OutcomeStatus, WorkerOutcome};
use convoy_core::strategy::{PacingConfig, Strategy, StrategyContext};
use convoy_telemetry::MetricsRegistry;

use crate::error::OrchestratorError;
use crate::registry::WorkerPoolRegistry;
use crate::session::WorkerSession;
use crate::strategies::StrategyRegistry;

#[derive(Clone, Copy, Debug)]
pub struct CoordinatorConfig {
    /// Most workers one operation may occupy, however large the pool is.
    pub worker_cap: usize,
    /// Jitter applied before each worker's first action, decorrelating the
    /// fan-out.
    pub dispatch_jitter: PacingConfig,
    /// Inter-step pacing handed to strategies.
    pub step_pacing: PacingConfig,
    /// How long completed operations are retained.
    pub retention: Duration,
    /// How often the reaper scans.
    pub reap_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            worker_cap: 5,
            dispatch_jitter: PacingConfig::new(
                Duration::from_millis(250),
                Duration::from_millis(1500),
            ),
            step_pacing: PacingConfig::default(),
            retention: Duration::from_secs(3600),
            reap_interval: Duration::from_secs(60),
        }
    }
}

/// Accepts job submissions, fans each one out across a capped subset of
/// ready workers, and aggregates per-worker outcomes into an operation
/// record. The coordinator is the only mutator of the operations it owns.
pub struct OperationCoordinator {
    registry: Arc<WorkerPoolRegistry>,
    strategies: Arc<StrategyRegistry>,
    operations: DashMap<OperationId, Arc<Mutex<Operation>>>,
    active: DashMap<OperationId, CancellationToken>,
    event_tx: broadcast::Sender<PoolEvent>,
    metrics: MetricsRegistry,
    config: CoordinatorConfig,
}

impl OperationCoordinator {
    pub fn new(
        registry: Arc<WorkerPoolRegistry>,
        strategies: Arc<StrategyRegistry>,
        event_tx: broadcast::Sender<PoolEvent>,
        metrics: MetricsRegistry,
        config: CoordinatorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            strategies,
            operations: DashMap::new(),
            active: DashMap::new(),
            event_tx,
            metrics,
            config,
        })
    }

    /// Validate and accept a job. Returns the operation identity
    /// immediately; execution proceeds asynchronously and the caller polls
    /// the status surface for outcomes.
    pub fn submit(
        self: &Arc<Self>,
        target: &str,
        strategy_kind: &str,
        count: u32,
    ) -> Result<OperationId, OrchestratorError> {
        if target.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "target must not be empty".into(),
            ));
        }
        if strategy_kind.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "strategy kind must not be empty".into(),
            ));
        }
        let strategy = self
            .strategies
            .get(strategy_kind)
            .ok_or_else(|| OrchestratorError::UnknownStrategy(strategy_kind.to_string()))?;

        if self.registry.list_ready().is_empty() {
            return Err(OrchestratorError::NoWorkersAvailable);
        }

        let operation = Operation::new(target, strategy_kind);
        let op_id = operation.id.clone();
        self.operations
            .insert(op_id.clone(), Arc::new(Mutex::new(operation)));

        let cancel = CancellationToken::new();
        self.active.insert(op_id.clone(), cancel.clone());
        self.metrics.increment("operations_submitted", 1);

        tracing::info!(
            operation_id = %op_id,
            target = %target,
            strategy = %strategy_kind,
            count = count,
            "Operation submitted",
        );

        let coordinator = Arc::clone(self);
        let exec_id = op_id.clone();
        tokio::spawn(async move {
            coordinator.execute(exec_id, strategy, count, cancel).await;
        });

        Ok(op_id)
    }

    /// Cancel an in-flight operation's remaining work. Workers observe the
    /// token between strategy steps; the operation still completes through
    /// the normal join barrier.
    pub fn cancel(&self, op_id: &OperationId) -> bool {
        match self.active.get(op_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// All non-purged operations, any status, oldest first.
    pub fn operations(&self) -> Vec<Operation> {
        let mut ops: Vec<Operation> = self
            .operations
            .iter()
            .map(|entry| entry.value().lock().clone())
            .collect();
        ops.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        ops
    }

    pub fn get(&self, op_id: &OperationId) -> Option<Operation> {
        self.operations.get(op_id).map(|op| op.lock().clone())
    }

    /// Operations not yet completed.
    pub fn active_count(&self) -> usize {
        self.operations
            .iter()
            .filter(|entry| entry.value().lock().status != OperationStatus::Completed)
            .count()
    }

    async fn execute(
        self: &Arc<Self>,
        op_id: OperationId,
        strategy: Arc<dyn Strategy>,
        count: u32,
        cancel: CancellationToken,
    ) {
        let Some(op) = self.operations.get(&op_id).map(|e| Arc::clone(e.value())) else {
            return;
        };

        let target = {
            let mut guard = op.lock();
            guard.status = OperationStatus::InProgress;
            guard.started_at = Some(Utc::now());
            guard.target.clone()
        };

        let selected: Vec<Arc<WorkerSession>> = self
            .registry
            .list_ready()
            .into_iter()
            .take(self.config.worker_cap)
            .collect();

        let _ = self.event_tx.send(PoolEvent::OperationStarted {
            operation_id: op_id.clone(),
            target: target.clone(),
            strategy: strategy.name().to_string(),
            workers: selected.len(),
        });
        tracing::info!(
            operation_id = %op_id,
            workers = selected.len(),
            "Operation started",
        );

        let shares = apportion(count, selected.len());
        let mut tasks = JoinSet::new();
        for (session, share) in selected.into_iter().zip(shares) {
            let coordinator = Arc::clone(self);
            let strategy = Arc::clone(&strategy);
            let ctx = StrategyContext::new(cancel.child_token(), self.config.step_pacing);
            let jitter = self.config.dispatch_jitter.sample();
            let op_id = op_id.clone();
            let target = target.clone();

            tasks.spawn(async move {
                tokio::time::sleep(jitter).await;
                let result = session.dispatch(&strategy, &target, share, &ctx).await;
                coordinator.record_outcome(&op_id, session.id().clone(), result);
            });
        }

        // Wait for every worker, regardless of individual failure.
        while tasks.join_next().await.is_some() {}

        let (succeeded, failed) = {
            let mut guard = op.lock();
            guard.status = OperationStatus::Completed;
            guard.finished_at = Some(Utc::now());
            (guard.succeeded(), guard.failed())
        };
        self.active.remove(&op_id);
        self.metrics.increment("operations_completed", 1);

        let _ = self.event_tx.send(PoolEvent::OperationCompleted {
            operation_id: op_id.clone(),
            succeeded,
            failed,
        });
        tracing::info!(
            operation_id = %op_id,
            succeeded = succeeded,
            failed = failed,
            "Operation completed",
        );
    }

    fn record_outcome(
        &self,
        op_id: &OperationId,
        worker_id: WorkerId,
        result: Result<(), OrchestratorError>,
    ) {
        let Some(op) = self.operations.get(op_id).map(|e| Arc::clone(e.value())) else {
            return;
        };

        let outcome = match result {
            Ok(()) => OutcomeStatus::Success,
            Err(e) => {
                let reason = e.to_string();
                tracing::warn!(
                    operation_id = %op_id,
                    worker_id = %worker_id,
                    reason = %reason,
                    "Worker dispatch failed",
                );
                self.metrics.increment("worker_failures", 1);
                let _ = self.event_tx.send(PoolEvent::OperationWorkerFailed {
                    operation_id: op_id.clone(),
                    worker_id: worker_id.clone(),
                    reason: reason.clone(),
                });
                OutcomeStatus::Failed { reason }
            }
        };

        op.lock().outcomes.push(WorkerOutcome { worker_id, outcome });
    }

    /// Purge completed operations older than the retention window. Returns
    /// the number purged.
    pub fn reap(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.retention)
                .unwrap_or_else(|_| chrono::Duration::hours(1));

        let expired: Vec<OperationId> = self
            .operations
            .iter()
            .filter_map(|entry| {
                let op = entry.value().lock();
                match (op.status, op.finished_at) {
                    (OperationStatus::Completed, Some(finished)) if finished < cutoff => {
                        Some(op.id.clone())
                    }
                    _ => None,
                }
            })
            .collect();

        let purged = expired.len();
        for id in expired {
            self.operations.remove(&id);
        }
        if purged > 0 {
            tracing::info!(purged = purged, "Reaped completed operations");
        }
        purged
    }

    /// Start the background reaper. The task ends when the coordinator is
    /// dropped.
    pub fn start_reaper(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.config.reap_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // consume first immediate tick
            loop {
                ticker.tick().await;
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                coordinator.reap();
            }
        })
    }
}

/// Split `count` across `n` workers: everyone gets `count / n`, and the
/// remainder goes one-each to the first `count % n` workers, so the shares
/// always sum to `count`.
fn apportion(count: u32, n: usize) -> Vec<u32> {
    if n == 0 {
        return Vec::new();
    }
    let n32 = n as u32;
    let share = count / n32;
    let remainder = count % n32;
    (0..n32)
        .map(|i| if i < remainder { share + 1 } else { share })
        .collect()
}
