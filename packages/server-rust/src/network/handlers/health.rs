//! Health, liveness, and readiness endpoint handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use super::AppState;
use crate::network::HealthState;
use crate::service::DispatchState;

/// Returns detailed health information as JSON.
///
/// Always returns 200; the `state` and `dispatch` fields tell whether the
/// gateway and the worker side are actually serving.
pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "state": state.shutdown.health_state().as_str(),
        "dispatch": state.router.state().as_str(),
        "in_flight": state.shutdown.in_flight_count(),
        "handlers_in_flight": state.router.in_flight_count(),
        "pending_requests": state.client.pending_count(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Liveness probe: 200 whenever the process answers.
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe: 200 only while the gateway is `Ready` and the dispatch
/// router is `Ready`, 503 otherwise.
pub async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.shutdown.health_state() == HealthState::Ready
        && state.router.state() == DispatchState::Ready
    {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use dossier_core::TopicName;
    use serde_json::Value;

    use super::*;
    use crate::correlation::{CorrelationClient, CorrelationConfig};
    use crate::network::{NetworkConfig, ShutdownController};
    use crate::service::{handler_fn, DispatchConfig, DispatchRouter};
    use crate::transport::MemoryBroker;

    async fn test_state() -> AppState {
        let broker = MemoryBroker::new(true);
        let router = DispatchRouter::new(
            Arc::new(broker.connect("dossier-server", "dossier-consumer")),
            DispatchConfig::default(),
        );
        router
            .bind(TopicName::parse("echo.test").unwrap(), handler_fn(|body: Value| async move { Ok(body) }))
            .unwrap();
        let client = CorrelationClient::connect(
            Arc::new(broker.connect("dossier-client", "dossier-consumer-client")),
            router.registry(),
            CorrelationConfig::default(),
        )
        .await
        .unwrap();
        AppState {
            client,
            router,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            start_time: Instant::now(),
        }
    }

    #[tokio::test]
    async fn health_handler_returns_json_with_all_fields() {
        let state = test_state().await;
        state.shutdown.set_ready();
        state.router.start().await.unwrap();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "ready");
        assert_eq!(json["dispatch"], "ready");
        assert_eq!(json["in_flight"], 0);
        assert_eq!(json["handlers_in_flight"], 0);
        assert_eq!(json["pending_requests"], 0);
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn health_handler_reports_draining_state() {
        let state = test_state().await;
        state.shutdown.set_ready();
        state.shutdown.trigger_shutdown();

        let json = health_handler(State(state)).await.0;
        assert_eq!(json["state"], "draining");
        assert_eq!(json["dispatch"], "binding");
    }

    #[tokio::test]
    async fn liveness_handler_always_returns_200() {
        assert_eq!(liveness_handler().await, StatusCode::OK);
    }

    #[tokio::test]
    async fn readiness_requires_gateway_and_router() {
        let state = test_state().await;
        state.shutdown.set_ready();
        assert_eq!(
            readiness_handler(State(state.clone())).await,
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.router.start().await.unwrap();
        assert_eq!(readiness_handler(State(state.clone())).await, StatusCode::OK);

        state.router.drain().await;
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn readiness_returns_503_when_gateway_draining() {
        let state = test_state().await;
        state.router.start().await.unwrap();
        state.shutdown.set_ready();
        state.shutdown.trigger_shutdown();
        assert_eq!(
            readiness_handler(State(state)).await,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
