use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use secrecy::SecretString;
use tower_http::cors::CorsLayer;

use convoy_engine::{OperationCoordinator, WorkerPoolRegistry};
use convoy_telemetry::MetricsRegistry;

use crate::auth;
use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    /// Shared secret that every control request must present.
    pub auth_token: SecretString,
    /// Poll interval while waiting for a new worker's pairing code.
    pub add_poll_interval: Duration,
    /// How many polls before `/workers/add` gives up waiting and returns 202.
    pub add_poll_ceiling: u32,
}

impl ServerConfig {
    pub fn new(port: u16, auth_token: SecretString) -> Self {
        Self {
            port,
            auth_token,
            add_poll_interval: Duration::from_secs(1),
            add_poll_ceiling: 30,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkerPoolRegistry>,
    pub coordinator: Arc<OperationCoordinator>,
    pub metrics: MetricsRegistry,
    pub auth_token: Arc<SecretString>,
    pub add_poll_interval: Duration,
    pub add_poll_ceiling: u32,
}

/// Build the Axum router. Everything except `/health` sits behind the
/// shared-secret middleware.
pub fn build_router(state: AppState) -> Router {
    let control = Router::new()
        .route("/status", get(handlers::status))
        .route("/workers/add", post(handlers::add_worker))
        .route("/workers/remove", post(handlers::remove_worker))
        .route("/op", post(handlers::submit_operation))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(control)
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. Returns a handle that keeps it alive.
pub async fn start(
    config: ServerConfig,
    registry: Arc<WorkerPoolRegistry>,
    coordinator: Arc<OperationCoordinator>,
    metrics: MetricsRegistry,
) -> Result<ServerHandle, std::io::Error> {
    let state = AppState {
        registry,
        coordinator,
        metrics,
        auth_token: Arc::new(config.auth_token),
        add_poll_interval: config.add_poll_interval,
        add_poll_ceiling: config.add_poll_ceiling,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Convoy server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
    })
}

/// Handle returned by `start()` — dropping it does not stop the listener,
/// but keeps the port around for callers that bound to port 0.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use convoy_core::transport::TransportEvent;
    use convoy_engine::{CoordinatorConfig, RegistryConfig, StrategyRegistry};
    use convoy_transport::{MockFactory, MockTransport};
    use std::time::Instant;
    use tokio::sync::broadcast;

    const TOKEN: &str = "test-secret";

    async fn start_server(factory: Arc<MockFactory>, pool_size: usize) -> ServerHandle {
        let (event_tx, _) = broadcast::channel(256);
        let metrics = MetricsRegistry::new();
        let registry = WorkerPoolRegistry::new(
            factory,
            event_tx.clone(),
            metrics.clone(),
            RegistryConfig::default(),
        );
        registry.populate(pool_size).await;

        // Let the pool settle before serving.
        let deadline = Instant::now() + Duration::from_secs(2);
        while registry.ready_count() < pool_size {
            assert!(Instant::now() < deadline, "pool never became ready");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let coordinator = OperationCoordinator::new(
            Arc::clone(&registry),
            Arc::new(StrategyRegistry::with_builtins()),
            event_tx,
            metrics.clone(),
            CoordinatorConfig::default(),
        );

        let config = ServerConfig {
            port: 0,
            auth_token: SecretString::from(TOKEN.to_string()),
            add_poll_interval: Duration::from_millis(10),
            add_poll_ceiling: 10,
        };
        start(config, registry, coordinator, metrics).await.unwrap()
    }

    fn client() -> reqwest::Client {
        reqwest::Client::new()
    }

    #[tokio::test]
    async fn health_is_unauthenticated() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/health", handle.port);
        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn control_endpoints_require_auth() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/status", handle.port);

        let resp = reqwest::get(&url).await.unwrap();
        assert_eq!(resp.status(), 401);

        let resp = client()
            .get(&url)
            .header(auth::AUTH_HEADER, "wrong")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 401);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["message"].as_str().unwrap().contains("auth token"));
    }

    #[tokio::test]
    async fn status_reports_pool_summary() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 2).await;
        let url = format!("http://127.0.0.1:{}/status", handle.port);

        let resp = client()
            .get(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["workers"]["total"], 2);
        assert_eq!(body["workers"]["active"], 2);
        assert_eq!(body["workers"]["statuses"].as_array().unwrap().len(), 2);
        assert_eq!(body["queueSize"], 0);
        assert_eq!(body["activeOperations"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn add_worker_returns_pairing_token() {
        // Script stops at the pairing code, so the cache still holds it when
        // the handler polls.
        let factory = Arc::new(MockFactory::with_template(|_| {
            MockTransport::new(vec![TransportEvent::PairingCode("654321".into())])
        }));
        let handle = start_server(factory, 0).await;
        let url = format!("http://127.0.0.1:{}/workers/add", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["workerId"], "w1");
        assert_eq!(body["pairingToken"], "654321");
    }

    #[tokio::test]
    async fn add_worker_returns_202_when_code_never_arrives() {
        let factory = Arc::new(MockFactory::with_template(|_| {
            MockTransport::new(Vec::new())
        }));
        let handle = start_server(factory, 0).await;
        let url = format!("http://127.0.0.1:{}/workers/add", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 202);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["workerId"], "w1");
        assert!(body["pairingToken"].is_null());
    }

    #[tokio::test]
    async fn remove_worker_then_404_on_repeat() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/workers/remove", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "workerId": "w1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "workerId": "w1" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn submit_operation_returns_id() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/op", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "target": "T1", "strategyKind": "probe" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["operationId"].as_str().unwrap().starts_with("op"));
    }

    #[tokio::test]
    async fn submit_rejects_unknown_strategy_with_400() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/op", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "target": "T1", "strategyKind": "flood" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["message"].as_str().unwrap().contains("flood"));
    }

    #[tokio::test]
    async fn submit_rejects_empty_target_with_400() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/op", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "target": "", "strategyKind": "probe" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }

    #[tokio::test]
    async fn submit_returns_503_without_ready_workers() {
        let factory = Arc::new(MockFactory::with_template(|_| {
            MockTransport::new(Vec::new())
        }));
        let handle = start_server(factory, 0).await;
        let url = format!("http://127.0.0.1:{}/op", handle.port);

        let resp = client()
            .post(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .json(&serde_json::json!({ "target": "T1", "strategyKind": "probe" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 503);
    }

    #[tokio::test]
    async fn metrics_snapshot_is_served() {
        let handle = start_server(Arc::new(MockFactory::all_ready()), 1).await;
        let url = format!("http://127.0.0.1:{}/metrics", handle.port);

        let resp = client()
            .get(&url)
            .header(auth::AUTH_HEADER, TOKEN)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body.get("counters").is_some());
        assert!(body.get("gauges").is_some());
    }
}
