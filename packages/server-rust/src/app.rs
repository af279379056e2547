//! Process assembly: broker, workers, correlation client, gateway.
//!
//! Startup order:
//!
//! 1. open the broker and the worker connection
//! 2. register the facades and bind their topics
//! 3. start the dispatch router (every subscription acknowledged)
//! 4. connect the correlation client to the router's topic registry
//!
//! Shutdown runs the reverse order.

use std::sync::Arc;

use anyhow::Context as _;
use tracing::info;

use crate::config::AppConfig;
use crate::correlation::CorrelationClient;
use crate::network::NetworkModule;
use crate::service::{register_facades, DispatchRouter, ServiceContext, ServiceRegistry};
use crate::storage::Catalog;
use crate::transport::TopicTransport;

/// A fully wired, running Dossier process minus the HTTP listener.
pub struct Dossier {
    config: AppConfig,
    router: Arc<DispatchRouter>,
    client: Arc<CorrelationClient>,
    worker_transport: Arc<dyn TopicTransport>,
    client_transport: Arc<dyn TopicTransport>,
}

impl Dossier {
    /// Wires every component and returns once the router is `Ready` and the
    /// client listens on every reply topic.
    ///
    /// # Errors
    ///
    /// Fails if the broker address is unsupported, a facade cannot bind its
    /// topics, or a subscription is refused.
    pub async fn assemble(config: AppConfig) -> anyhow::Result<Self> {
        let transport_config = config.transport();
        let broker = transport_config
            .open()
            .context("failed to open broker")?;

        let worker_transport: Arc<dyn TopicTransport> =
            Arc::new(transport_config.server_connection(&broker));
        let router = DispatchRouter::new(Arc::clone(&worker_transport), config.dispatch());

        let services = ServiceRegistry::new();
        register_facades(&services, &Catalog::in_memory())?;
        let bound = services
            .init_all(&ServiceContext {
                router: Arc::clone(&router),
            })
            .await?;
        router.start().await.context("failed to start dispatch router")?;

        let client_transport: Arc<dyn TopicTransport> =
            Arc::new(transport_config.client_connection(&broker));
        let client = CorrelationClient::connect(
            Arc::clone(&client_transport),
            router.registry(),
            config.correlation(),
        )
        .await
        .context("failed to connect correlation client")?;

        info!(services = services.len(), topics = bound, "dossier assembled");
        Ok(Self {
            config,
            router,
            client,
            worker_transport,
            client_transport,
        })
    }

    /// HTTP gateway bound to this process's client and router.
    #[must_use]
    pub fn gateway(&self) -> NetworkModule {
        NetworkModule::new(
            self.config.network(),
            Arc::clone(&self.client),
            Arc::clone(&self.router),
        )
    }

    #[must_use]
    pub fn client(&self) -> Arc<CorrelationClient> {
        Arc::clone(&self.client)
    }

    #[must_use]
    pub fn router(&self) -> Arc<DispatchRouter> {
        Arc::clone(&self.router)
    }

    /// Drains the workers, closes the client, and disconnects both broker
    /// connections. Returns whether every in-flight handler finished.
    pub async fn shutdown(self) -> bool {
        let drained = self.router.drain().await;
        self.client.close();
        self.client_transport.disconnect().await;
        self.worker_transport.disconnect().await;
        info!(drained, "dossier stopped");
        drained
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use dossier_core::TopicName;
    use serde_json::json;

    use super::*;
    use crate::service::DispatchState;

    fn config(args: &[&str]) -> AppConfig {
        AppConfig::try_parse_from(std::iter::once("dossier").chain(args.iter().copied())).unwrap()
    }

    #[tokio::test]
    async fn assembled_process_answers_requests() {
        let app = Dossier::assemble(config(&[])).await.unwrap();
        assert_eq!(app.router().state(), DispatchState::Ready);

        let topic = TopicName::parse("statuses.create").unwrap();
        let reply = app
            .client()
            .request(&topic, json!({"name": "open"}), None)
            .await
            .unwrap();
        assert_eq!(reply.body["id"], 1);

        let client = app.client();
        let router = app.router();
        assert!(app.shutdown().await);
        assert_eq!(router.state(), DispatchState::Closed);
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn unsupported_broker_fails_assembly() {
        let Err(err) = Dossier::assemble(config(&["--brokers", "kafka:9092"])).await else {
            panic!("assembly should fail");
        };
        assert!(err.to_string().contains("failed to open broker"));
    }

    #[tokio::test]
    async fn assembly_without_auto_topic_creation_still_starts() {
        let app = Dossier::assemble(config(&["--allow-auto-topic-creation", "false"]))
            .await
            .unwrap();
        assert_eq!(app.router().state(), DispatchState::Ready);
        assert!(app.shutdown().await);
    }
}
