use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use groundwork::config::AppConfig;
use groundwork::server::{create_router, AppState};
use groundwork::shutdown::{graceful_shutdown, wait_for_shutdown};

#[derive(Parser)]
#[command(name = "groundwork", about = "Self-service provisioning and status reconciliation")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;

    tracing::info!(
        host = %config.server.host,
        port = %config.server.port,
        "Starting Groundwork server"
    );

    let state = Arc::new(AppState::new(config.clone())?);

    // Start the event queue consumer
    let queue_state = Arc::clone(&state);
    tokio::spawn(async move {
        groundwork::queue::run_event_processor(queue_state).await;
    });

    let app = create_router(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        config.server.host, config.server.port
    ))
    .await?;

    tracing::info!("Listening on {}", listener.local_addr()?);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    // Perform graceful shutdown cleanup
    graceful_shutdown(&state).await;

    Ok(())
}
