use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use convoy_core::strategy::{Strategy, StrategyContext, StrategyError};
use convoy_core::transport::{ActionRequest, WorkerTransport};

/// Registry of available strategies, keyed by name. Strategy kinds are
/// resolved here at submission time; an unknown kind never reaches a worker.
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn Strategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in strategies.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DeliverStrategy));
        registry.register(Arc::new(ProbeStrategy));
        registry
    }

    pub fn register(&mut self, strategy: Arc<dyn Strategy>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Strategy>> {
        self.strategies.get(name).map(Arc::clone)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn count(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Repeats one action `count` times with randomized pacing between steps.
/// Checks for cancellation before every step.
pub struct DeliverStrategy;

#[async_trait]
impl Strategy for DeliverStrategy {
    fn name(&self) -> &str {
        "deliver"
    }

    async fn execute(
        &self,
        transport: &dyn WorkerTransport,
        target: &str,
        count: u32,
        ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        for step in 0..count {
            if ctx.cancel.is_cancelled() {
                return Err(StrategyError::Cancelled);
            }
            let action = ActionRequest::new(target)
                .with_payload(serde_json::json!({ "step": step + 1, "of": count }));
            transport.perform(&action).await?;

            if step + 1 < count {
                ctx.pace().await;
            }
        }
        Ok(())
    }
}

/// Issues a single health-check action regardless of the requested count.
pub struct ProbeStrategy;

#[async_trait]
impl Strategy for ProbeStrategy {
    fn name(&self) -> &str {
        "probe"
    }

    async fn execute(
        &self,
        transport: &dyn WorkerTransport,
        target: &str,
        _count: u32,
        ctx: &StrategyContext,
    ) -> Result<(), StrategyError> {
        if ctx.cancel.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }
        let action = ActionRequest::new(target).with_payload(serde_json::json!({ "probe": true }));
        transport.perform(&action).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::strategy::PacingConfig;
    use convoy_transport::{MockTransport, PerformBehavior};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fast_ctx() -> StrategyContext {
        StrategyContext::new(
            CancellationToken::new(),
            PacingConfig::fixed(Duration::from_millis(1)),
        )
    }

    #[test]
    fn builtins_are_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert!(registry.contains("deliver"));
        assert!(registry.contains("probe"));
        assert!(!registry.contains("flood"));
        assert_eq!(registry.names(), vec!["deliver", "probe"]);
    }

    #[test]
    fn register_and_get() {
        let mut registry = StrategyRegistry::new();
        assert_eq!(registry.count(), 0);
        registry.register(Arc::new(DeliverStrategy));
        assert!(registry.get("deliver").is_some());
        assert!(registry.get("unknown").is_none());
    }

    #[tokio::test]
    async fn deliver_performs_count_actions() {
        let transport = MockTransport::ready();
        DeliverStrategy
            .execute(&transport, "T1", 4, &fast_ctx())
            .await
            .unwrap();
        assert_eq!(transport.perform_calls(), 4);
    }

    #[tokio::test]
    async fn deliver_zero_count_is_a_no_op() {
        let transport = MockTransport::ready();
        DeliverStrategy
            .execute(&transport, "T1", 0, &fast_ctx())
            .await
            .unwrap();
        assert_eq!(transport.perform_calls(), 0);
    }

    #[tokio::test]
    async fn deliver_stops_on_action_failure() {
        let transport =
            MockTransport::ready().with_behavior(PerformBehavior::FailAfter(2, "quota".into()));
        let result = DeliverStrategy.execute(&transport, "T1", 5, &fast_ctx()).await;
        assert!(matches!(result, Err(StrategyError::Session(_))));
        assert_eq!(transport.perform_calls(), 3);
    }

    #[tokio::test]
    async fn deliver_honors_cancellation_between_steps() {
        let cancel = CancellationToken::new();
        let ctx = StrategyContext::new(cancel.clone(), PacingConfig::fixed(Duration::from_millis(1)));
        cancel.cancel();

        let transport = MockTransport::ready();
        let result = DeliverStrategy.execute(&transport, "T1", 5, &ctx).await;
        assert!(matches!(result, Err(StrategyError::Cancelled)));
        assert_eq!(transport.perform_calls(), 0);
    }

    #[tokio::test]
    async fn probe_performs_exactly_once() {
        let transport = MockTransport::ready();
        ProbeStrategy
            .execute(&transport, "T1", 10, &fast_ctx())
            .await
            .unwrap();
        assert_eq!(transport.perform_calls(), 1);
    }
}
