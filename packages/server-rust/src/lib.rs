//! `Dossier` Server: HTTP gateway, topic correlation client, dispatch
//! router, and per-entity services over a publish/subscribe transport.

pub mod app;
pub mod config;
pub mod correlation;
pub mod network;
pub mod service;
pub mod storage;
pub mod telemetry;
pub mod transport;

pub use app::Dossier;
pub use config::{AppConfig, LogFormat};
pub use correlation::{CorrelationClient, CorrelationConfig};
pub use service::{DispatchConfig, DispatchRouter, DispatchState};
pub use transport::{MemoryBroker, TopicTransport, TransportConfig};
