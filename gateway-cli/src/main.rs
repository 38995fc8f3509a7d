//! Process entry point: config load, logging init, bind, serve,
//! graceful shutdown (`§6` "Exit codes").

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigAction};
use gateway_server::{create_app, AppState, GatewayConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match GatewayConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            std::process::exit(1);
        }
    };

    if let Some(Commands::Config { action: ConfigAction::Check }) = cli.command {
        println!("configuration is valid");
        return Ok(());
    }

    init_logging(&config.logging.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "gateway listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let state = AppState::new(config).await;
    state.spawn_housekeeping(shutdown_rx);
    let app = create_app(state);

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .context("server error")?;

    tracing::info!("gateway shut down cleanly");
    Ok(())
}

/// Waits for Ctrl+C/SIGTERM, then signals the housekeeping tasks to stop
/// before handing control back to axum's own graceful shutdown drain.
async fn shutdown_signal(shutdown_tx: tokio::sync::watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    let _ = shutdown_tx.send(true);
}
