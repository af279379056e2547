//! Command-line and environment configuration for the `dossier` binary.
//!
//! Every flag has a `DOSSIER_*` environment fallback. [`AppConfig`] is split
//! into the per-component configs through its accessor methods.

use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};

use crate::correlation::CorrelationConfig;
use crate::network::NetworkConfig;
use crate::service::DispatchConfig;
use crate::transport::TransportConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Dossier gateway and workers in one process.
#[derive(Debug, Clone, Parser)]
#[command(name = "dossier", version, about)]
pub struct AppConfig {
    /// Broker addresses, comma separated.
    #[arg(long, env = "DOSSIER_BROKERS", value_delimiter = ',', default_value = "memory://local")]
    pub brokers: Vec<String>,

    /// Base client id; `-server` and `-client` are appended per connection.
    #[arg(long, env = "DOSSIER_CLIENT_ID", default_value = "dossier")]
    pub client_id: String,

    /// Worker consumer group; the gateway uses `<group-id>-client`.
    #[arg(long, env = "DOSSIER_GROUP_ID", default_value = "dossier-consumer")]
    pub group_id: String,

    /// Whether publish/subscribe may create topics implicitly.
    #[arg(
        long,
        env = "DOSSIER_ALLOW_AUTO_TOPIC_CREATION",
        default_value_t = true,
        action = ArgAction::Set
    )]
    pub allow_auto_topic_creation: bool,

    /// Default correlated request timeout in milliseconds.
    #[arg(long, env = "DOSSIER_REQUEST_TIMEOUT_MS", default_value_t = 3000)]
    pub request_timeout_ms: u64,

    /// HTTP bind address.
    #[arg(long, env = "DOSSIER_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// HTTP port.
    #[arg(long, env = "DOSSIER_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Allowed CORS origins, comma separated. `*` allows any.
    #[arg(long, env = "DOSSIER_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    pub cors_origins: Vec<String>,

    /// Upper bound on one HTTP request in milliseconds.
    #[arg(long, env = "DOSSIER_HTTP_TIMEOUT_MS", default_value_t = 30_000)]
    pub http_timeout_ms: u64,

    /// Concurrent handlers before the worker sheds load.
    #[arg(long, env = "DOSSIER_MAX_CONCURRENT_HANDLERS", default_value_t = 1000)]
    pub max_concurrent_handlers: u32,

    /// How long shutdown waits for in-flight work, in milliseconds.
    #[arg(long, env = "DOSSIER_DRAIN_TIMEOUT_MS", default_value_t = 30_000)]
    pub drain_timeout_ms: u64,

    #[arg(long, env = "DOSSIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl AppConfig {
    #[must_use]
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            brokers: self.brokers.clone(),
            client_id: self.client_id.clone(),
            group_id: self.group_id.clone(),
            allow_auto_topic_creation: self.allow_auto_topic_creation,
        }
    }

    #[must_use]
    pub fn correlation(&self) -> CorrelationConfig {
        CorrelationConfig {
            default_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }

    #[must_use]
    pub fn dispatch(&self) -> DispatchConfig {
        DispatchConfig {
            max_concurrent_handlers: self.max_concurrent_handlers,
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }

    #[must_use]
    pub fn network(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_millis(self.http_timeout_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = AppConfig::try_parse_from(["dossier"]).unwrap();
        assert_eq!(config.transport().brokers, TransportConfig::default().brokers);
        assert_eq!(config.transport().group_id, "dossier-consumer");
        assert_eq!(
            config.correlation().default_timeout,
            CorrelationConfig::default().default_timeout
        );
        assert_eq!(
            config.dispatch().max_concurrent_handlers,
            DispatchConfig::default().max_concurrent_handlers
        );
        assert_eq!(config.network().bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn flags_override_defaults() {
        let config = AppConfig::try_parse_from([
            "dossier",
            "--brokers",
            "memory://a,memory://b",
            "--allow-auto-topic-creation",
            "false",
            "--request-timeout-ms",
            "200",
            "--port",
            "8080",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(config.brokers, vec!["memory://a", "memory://b"]);
        assert!(!config.transport().allow_auto_topic_creation);
        assert_eq!(config.correlation().default_timeout_ms(), 200);
        assert_eq!(config.network().port, 8080);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(AppConfig::try_parse_from(["dossier", "--log-format", "xml"]).is_err());
    }
}
