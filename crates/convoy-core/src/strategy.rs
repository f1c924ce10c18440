use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::errors::SessionError;
use crate::transport::WorkerTransport;

/// Randomized delay interval. Sampling decorrelates concurrent workers so a
/// fan-out does not hit one target in lockstep.
#[derive(Clone, Copy, Debug)]
pub struct PacingConfig {
    pub min: Duration,
    pub max: Duration,
}

impl PacingConfig {
    pub fn new(min: Duration, max: Duration) -> Self {
        debug_assert!(min <= max);
        Self { min, max }
    }

    /// Fixed delay with no jitter.
    pub fn fixed(delay: Duration) -> Self {
        Self { min: delay, max: delay }
    }

    /// Draw a delay uniformly from [min, max].
    pub fn sample(&self) -> Duration {
        if self.min >= self.max {
            return self.min;
        }
        let range = self.max.as_millis() - self.min.as_millis();
        let jitter = rand::thread_rng().gen_range(0..=range) as u64;
        self.min + Duration::from_millis(jitter)
    }
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(250),
            max: Duration::from_millis(1500),
        }
    }
}

/// Per-dispatch context handed to a strategy: the cooperative cancellation
/// signal and the inter-step pacing interval.
#[derive(Clone, Debug)]
pub struct StrategyContext {
    pub cancel: CancellationToken,
    pub pacing: PacingConfig,
}

impl StrategyContext {
    pub fn new(cancel: CancellationToken, pacing: PacingConfig) -> Self {
        Self { cancel, pacing }
    }

    /// Sleep one pacing interval, returning early if cancelled.
    pub async fn pace(&self) {
        tokio::select! {
            _ = tokio::time::sleep(self.pacing.sample()) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

#[derive(Clone, Debug, thiserror::Error)]
pub enum StrategyError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// A named unit of repeated work invoked once per selected worker during an
/// operation. Implementations must check `ctx.cancel` between repeats.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(
        &self,
        transport: &dyn WorkerTransport,
        target: &str,
        count: u32,
        ctx: &StrategyContext,
    ) -> Result<(), StrategyError>;
}
