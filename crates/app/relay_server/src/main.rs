//! Agent relay HTTP server binary.
//!
//! Serves the relay route and its documentation. Configuration comes from
//! flags, then environment variables (a `.env` file is loaded first).

use std::time::Duration;

use clap::Parser;
use relay_api::config::{ApiConfig, PROJECT_ENDPOINT_ENV, non_empty};
use tracing::{info, warn};

/// CLI arguments for the relay server.
#[derive(Parser, Debug)]
#[command(name = "relay_server", about = "Agent relay HTTP server", version)]
struct Args {
    /// Interface to bind.
    #[arg(long, env = "RELAY_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 7071)]
    port: u16,

    /// Agent service project endpoint.
    ///
    /// Without it the server still starts; the relay route answers 500 until
    /// it is configured.
    #[arg(long, env = PROJECT_ENDPOINT_ENV)]
    project_endpoint: Option<String>,

    /// Delay between run status polls, in milliseconds.
    #[arg(long, env = "RUN_POLL_INTERVAL_MS", default_value_t = 1000)]
    poll_interval_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .or_else(|_| {
                    tracing_subscriber::EnvFilter::try_new(
                        "info,relay_api=debug,relay_core=debug,tower_http=info",
                    )
                })?,
        )
        .init();

    let args = Args::parse();

    let config = ApiConfig {
        bind_addr: format!("{}:{}", args.host, args.port),
        project_endpoint: non_empty(args.project_endpoint),
        run_poll_interval: Duration::from_millis(args.poll_interval_ms),
    };

    match &config.project_endpoint {
        Some(endpoint) => info!(project_endpoint = %endpoint, "using agent service"),
        None => warn!("{PROJECT_ENDPOINT_ENV} is not set; relay requests will fail"),
    }

    let state = relay_api::AppState::from_config(config.clone())?;
    let app = relay_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
