//! Gateway network module with deferred startup lifecycle.
//!
//! `new()` creates shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves. The
//! split lets the binary report the bound port before traffic flows.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::Uri;
use axum::routing::{get, on, MethodRouter};
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    call_topic, health_handler, liveness_handler, method_not_allowed, readiness_handler,
    route_not_found, AppState,
};
use super::middleware::build_http_layers;
use super::routes::{route_table, Route};
use super::shutdown::ShutdownController;
use crate::correlation::CorrelationClient;
use crate::service::DispatchRouter;

/// Owns the HTTP gateway lifecycle.
///
/// 1. `new()`: allocates shared state (shutdown controller, app state)
/// 2. `start()`: binds the TCP listener to the configured address
/// 3. `serve()`: accepts connections until shutdown is signalled, then
///    drains in-flight HTTP requests
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
    client: Arc<CorrelationClient>,
    router: Arc<DispatchRouter>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        client: Arc<CorrelationClient>,
        router: Arc<DispatchRouter>,
    ) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
            client,
            router,
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router: probes plus every row of the route table.
    /// Unknown paths and unserved verbs answer with the JSON envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if the route table contains a malformed topic.
    pub fn build_router(&self) -> anyhow::Result<Router> {
        let state = AppState {
            client: Arc::clone(&self.client),
            router: Arc::clone(&self.router),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            start_time: Instant::now(),
        };

        let mut paths: BTreeMap<String, MethodRouter<AppState>> = BTreeMap::new();
        for route in route_table()? {
            let path = route.path.clone();
            let handler = route_handler(route);
            let merged = match paths.remove(&path) {
                Some(existing) => existing.merge(handler),
                None => handler,
            };
            paths.insert(path, merged);
        }

        paths.insert("/health".to_string(), get(health_handler));
        paths.insert("/health/live".to_string(), get(liveness_handler));
        paths.insert("/health/ready".to_string(), get(readiness_handler));

        let mut router = Router::new();
        for (path, methods) in paths {
            router = router.route(&path, methods.fallback(method_not_allowed));
        }

        Ok(router
            .fallback(route_not_found)
            .layer(build_http_layers(&self.config))
            .with_state(state))
    }

    /// Binds the TCP listener and returns the bound port (useful when the
    /// configured port is 0).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "gateway listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves HTTP until `shutdown` resolves, then drains in-flight requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router()?;
        let controller = Arc::clone(&self.shutdown);

        controller.set_ready();
        info!("gateway serving HTTP");

        let signal = Arc::clone(&controller);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                signal.trigger_shutdown();
            })
            .await?;

        controller.trigger_shutdown();
        if controller.wait_for_drain(self.config.drain_timeout).await {
            info!("gateway drained");
        } else {
            warn!(
                in_flight = controller.in_flight_count(),
                "gateway drain timeout expired with requests remaining"
            );
        }
        Ok(())
    }
}

/// Wraps one route-table row in an axum method router.
fn route_handler(route: Route) -> MethodRouter<AppState> {
    let filter = route.verb.filter();
    let route = Arc::new(route);
    if route.action.takes_id() {
        on(
            filter,
            move |State(state): State<AppState>, uri: Uri, Path(id): Path<String>, body: Bytes| {
                let route = Arc::clone(&route);
                async move { call_topic(state, &route, uri, Some(id), body).await }
            },
        )
    } else {
        on(
            filter,
            move |State(state): State<AppState>, uri: Uri, body: Bytes| {
                let route = Arc::clone(&route);
                async move { call_topic(state, &route, uri, None, body).await }
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use dossier_core::TopicRegistry;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::correlation::CorrelationConfig;
    use crate::service::{register_facades, DispatchConfig, ServiceContext, ServiceRegistry};
    use crate::storage::Catalog;
    use crate::transport::MemoryBroker;

    async fn module() -> NetworkModule {
        module_with(NetworkConfig::default()).await
    }

    async fn module_with(config: NetworkConfig) -> NetworkModule {
        let broker = MemoryBroker::new(true);
        let router = DispatchRouter::new(
            Arc::new(broker.connect("dossier-server", "dossier-consumer")),
            DispatchConfig::default(),
        );
        let services = ServiceRegistry::new();
        register_facades(&services, &Catalog::in_memory()).unwrap();
        services
            .init_all(&ServiceContext {
                router: Arc::clone(&router),
            })
            .await
            .unwrap();
        router.start().await.unwrap();
        let client = CorrelationClient::connect(
            Arc::new(broker.connect("dossier-client", "dossier-consumer-client")),
            router.registry(),
            CorrelationConfig::default(),
        )
        .await
        .unwrap();
        NetworkModule::new(config, client, router)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
            .unwrap();
        let resp = app.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn every_route_targets_a_bound_topic() {
        let module = module().await;
        let registry: Arc<TopicRegistry> = module.router.registry();
        for route in route_table().unwrap() {
            assert!(registry.contains(&route.topic), "{} not bound", route.topic);
        }
    }

    #[tokio::test]
    async fn create_then_fetch_through_http() {
        let app = module().await.build_router().unwrap();

        let (status, body) = send(&app, "POST", "/api/entities", Some(json!({"name": "Acme", "tax_id": "T-1"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status_code"], 201);
        assert_eq!(body["data"]["id"], 1);
        assert_eq!(body["url"], "/api/entities");
        assert_eq!(body["message"], json!(["success"]));

        let (status, body) = send(&app, "GET", "/api/entities/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["tax_id"], "T-1");

        let (status, body) = send(&app, "PUT", "/api/entities/1", Some(json!({"email": "ops@acme.test"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "ops@acme.test");

        let (status, body) = send(&app, "GET", "/api/entities", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", "/api/entities/1", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_record_maps_to_404_envelope() {
        let app = module().await.build_router().unwrap();
        let (status, body) = send(&app, "GET", "/api/entities/999", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["message"], json!(["Entity with ID 999 not found"]));
        assert_eq!(body["data"], Value::Null);
    }

    #[tokio::test]
    async fn bad_input_is_rejected_with_400_envelope() {
        let app = module().await.build_router().unwrap();

        let (status, body) = send(&app, "GET", "/api/documents/abc", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status_code"], 400);

        let request = Request::builder()
            .method("POST")
            .uri("/api/statuses")
            .header("content-type", "application/json")
            .body(Body::from("{\"name\": "))
            .unwrap();
        let resp = app.clone().oneshot(request).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "POST", "/api/statuses", Some(json!({"description": "no name"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!(["missing required fields: name"]));
    }

    #[tokio::test]
    async fn lookup_route_reaches_relational_topic() {
        let app = module().await.build_router().unwrap();
        send(&app, "POST", "/api/statuses", Some(json!({"name": "open"}))).await;
        send(&app, "POST", "/api/entities", Some(json!({"name": "Acme", "tax_id": "T-1"}))).await;
        send(&app, "POST", "/api/processes", Some(json!({"name": "Onboarding", "entity_id": 1, "status_id": 1}))).await;

        let (status, body) = send(&app, "GET", "/api/processes/by-entity/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["name"], "Onboarding");
    }

    #[tokio::test]
    async fn draining_gateway_answers_503() {
        let module = module().await;
        let app = module.build_router().unwrap();
        module.shutdown_controller().set_ready();
        module.shutdown_controller().trigger_shutdown();

        let (status, body) = send(&app, "GET", "/api/statuses", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status_code"], 503);
    }

    #[tokio::test]
    async fn probes_are_routed() {
        let module = module().await;
        let app = module.build_router().unwrap();
        module.shutdown_controller().set_ready();

        let resp = app
            .clone()
            .oneshot(Request::get("/health/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["dispatch"], "ready");
    }

    #[tokio::test]
    async fn unknown_paths_and_verbs_answer_with_envelope() {
        let app = module().await.build_router().unwrap();

        let (status, body) = send(&app, "GET", "/api/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status_code"], 404);
        assert_eq!(body["url"], "/api/nope");
        assert_eq!(body["message"], json!(["no route for '/api/nope'"]));

        let (status, body) = send(&app, "PATCH", "/api/documents/1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["status_code"], 405);
        assert_eq!(body["message"], json!(["PATCH is not allowed on '/api/documents/1'"]));
        assert!(body["time"].is_string());

        let (status, body) = send(&app, "DELETE", "/health", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["status_code"], 405);
    }

    #[tokio::test]
    async fn http_timeout_answers_with_503_envelope() {
        let module = module_with(NetworkConfig {
            request_timeout: Duration::from_millis(50),
            ..NetworkConfig::default()
        })
        .await;
        let app = module.build_router().unwrap();
        assert!(module.router.drain().await);

        let started = std::time::Instant::now();
        let (status, body) = send(&app, "GET", "/api/statuses", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status_code"], 503);
        assert_eq!(body["url"], "/api/statuses");
        assert!(body["message"][0].as_str().unwrap().contains("statuses.find-all"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn serve_without_start_is_an_error() {
        let module = module().await;
        let err = module.serve(std::future::pending::<()>()).await.unwrap_err();
        assert!(err.to_string().contains("start() must be called"));
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = module().await;
        module.config.port = 0;
        let port = module.start().await.unwrap();
        assert!(port > 0);
        assert!(module.listener.is_some());
    }
}
