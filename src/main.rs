use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use secrecy::SecretString;
use tokio::sync::broadcast;

use convoy_core::events::PoolEvent;
use convoy_engine::{
    CoordinatorConfig, OperationCoordinator, RegistryConfig, StrategyRegistry, WorkerPoolRegistry,
};
use convoy_telemetry::MetricsRegistry;
use convoy_transport::{LoopbackConfig, LoopbackFactory};

#[derive(Parser, Debug)]
#[command(name = "convoy", about = "Multi-worker session orchestrator")]
struct Args {
    /// HTTP control port.
    #[arg(long, default_value_t = 9070)]
    port: u16,

    /// Workers provisioned at startup.
    #[arg(long, default_value_t = 3)]
    pool_size: usize,

    /// Most workers a single operation may occupy.
    #[arg(long, default_value_t = 5)]
    worker_cap: usize,

    /// Operator webhook for notifications. No webhook, no bridge.
    #[arg(long)]
    webhook_url: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    convoy_telemetry::init_logging(args.json_logs);

    let auth_token = std::env::var("CONVOY_AUTH_TOKEN")
        .map(SecretString::from)
        .context("CONVOY_AUTH_TOKEN must be set")?;

    tracing::info!(pool_size = args.pool_size, "Starting convoy");

    let metrics = MetricsRegistry::new();
    let (event_tx, _) = broadcast::channel::<PoolEvent>(1024);

    let factory = Arc::new(LoopbackFactory::new(LoopbackConfig::default()));
    let registry = WorkerPoolRegistry::new(
        factory,
        event_tx.clone(),
        metrics.clone(),
        RegistryConfig::default(),
    );
    registry.populate(args.pool_size).await;

    let strategies = Arc::new(StrategyRegistry::with_builtins());
    let coordinator = OperationCoordinator::new(
        Arc::clone(&registry),
        strategies,
        event_tx.clone(),
        metrics.clone(),
        CoordinatorConfig {
            worker_cap: args.worker_cap,
            ..CoordinatorConfig::default()
        },
    );
    let _reaper = coordinator.start_reaper();

    let _bridge = args.webhook_url.as_ref().map(|url| {
        tracing::info!(url = %url, "Notification bridge enabled");
        let sink = Arc::new(convoy_server::WebhookSink::new(url.clone()));
        convoy_server::start_notification_bridge(sink, event_tx.subscribe())
    });

    let config = convoy_server::ServerConfig::new(args.port, auth_token);
    let handle = convoy_server::start(config, registry, coordinator, metrics)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "Convoy ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}
