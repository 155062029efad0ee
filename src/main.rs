//! Signaling server binary
//!
//! Run with: cargo run --release
//!
//! Environment:
//!   PORT             listening port (default 3000)
//!   BIND_ADDR        listening IP (default 0.0.0.0)
//!   MAX_CONNECTIONS  concurrent connection cap (default unlimited)
//!   RUST_LOG         log filter (default rtc_signal=info)

use rtc_signal::{ServerConfig, SignalingServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> rtc_signal::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("rtc_signal=info")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let server = SignalingServer::new(config);

    tracing::info!(addr = %server.bind_addr(), "Starting signaling server");

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    let stats = server.stats().await;
    tracing::info!(
        total_connections = stats.total_connections,
        relayed_messages = stats.relayed_messages,
        uptime_secs = stats.uptime.as_secs(),
        "Signaling server stopped"
    );

    Ok(())
}
