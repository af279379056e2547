//! Dossier server binary: gateway and workers sharing one in-process broker.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use dossier_server::{telemetry, AppConfig, Dossier};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::parse();
    telemetry::init_tracing(config.log_format)?;

    info!(
        brokers = ?config.brokers,
        client_id = %config.client_id,
        group_id = %config.group_id,
        request_timeout_ms = config.request_timeout_ms,
        "starting dossier"
    );

    let app = Dossier::assemble(config).await?;

    let mut gateway = app.gateway();
    let port = gateway.start().await?;
    info!(port, "gateway listening");

    let served = gateway
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
        })
        .await;

    let drained = app.shutdown().await;
    served?;
    info!(drained, "shutdown complete");
    Ok(())
}
