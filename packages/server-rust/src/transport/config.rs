//! Broker connection settings.

use std::sync::Arc;

use super::memory::{MemoryBroker, MemoryTransport};
use super::TransportError;

/// Address scheme served by the in-process broker.
pub const MEMORY_SCHEME: &str = "memory://";

/// How to reach the broker and who we are to it.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Broker addresses. Only `memory://<name>` is served in-process.
    pub brokers: Vec<String>,
    /// Base client identifier; `-server` / `-client` suffixes are appended
    /// for the worker and gateway connections.
    pub client_id: String,
    /// Consumer group of the workers. The gateway uses `<group_id>-client`.
    pub group_id: String,
    /// Whether publishing or subscribing may create topics implicitly.
    pub allow_auto_topic_creation: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            brokers: vec![format!("{MEMORY_SCHEME}local")],
            client_id: "dossier".to_string(),
            group_id: "dossier-consumer".to_string(),
            allow_auto_topic_creation: true,
        }
    }
}

impl TransportConfig {
    /// Opens the broker named by the first broker address.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::UnsupportedBroker` if no address uses the
    /// `memory://` scheme.
    pub fn open(&self) -> Result<Arc<MemoryBroker>, TransportError> {
        let addr = self
            .brokers
            .first()
            .ok_or_else(|| TransportError::UnsupportedBroker(String::new()))?;
        if !addr.starts_with(MEMORY_SCHEME) {
            return Err(TransportError::UnsupportedBroker(addr.clone()));
        }
        Ok(MemoryBroker::new(self.allow_auto_topic_creation))
    }

    /// Connection used by the dispatch router (worker side).
    #[must_use]
    pub fn server_connection(&self, broker: &Arc<MemoryBroker>) -> MemoryTransport {
        broker.connect(format!("{}-server", self.client_id), self.group_id.clone())
    }

    /// Connection used by the correlation client (gateway side).
    #[must_use]
    pub fn client_connection(&self, broker: &Arc<MemoryBroker>) -> MemoryTransport {
        broker.connect(
            format!("{}-client", self.client_id),
            format!("{}-client", self.group_id),
        )
    }
}
