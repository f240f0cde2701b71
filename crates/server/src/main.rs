use std::path::Path;

use clap::Parser;
use tracing::{info, warn};

use cadence_server::{CadenceConfig, build_scheduler, build_state};

/// Cadence execution-tracking HTTP server.
#[derive(Parser, Debug)]
#[command(name = "cadence-server", about = "Execution tracking engine for database-backed plans")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "cadence.toml")]
    config: String,

    /// Override the bind host.
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber from RUST_LOG or default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration from the TOML file, or defaults if it is absent.
    let config: CadenceConfig = if Path::new(&cli.config).exists() {
        let contents = std::fs::read_to_string(&cli.config)?;
        toml::from_str(&contents)?
    } else {
        info!(path = %cli.config, "config file not found, using defaults");
        toml::from_str("")?
    };

    let state = build_state(config)?;

    // The single-runner flag: exactly one process in the fleet drives the
    // background jobs.
    let mut scheduler_shutdown = None;
    if state.config.scheduler.enable_scheduler && state.config.scheduler.run_scheduler {
        let (mut scheduler, shutdown_tx) = build_scheduler(&state)?;
        scheduler_shutdown = Some(shutdown_tx);
        tokio::spawn(async move {
            scheduler.run().await;
        });
        info!("background scheduler started in this process");
    } else {
        warn!("scheduler not running here (scheduler.run_scheduler = false)");
    }

    let app = cadence_server::api::router(state.clone());

    let host = cli.host.unwrap_or_else(|| state.config.server.host.clone());
    let port = cli.port.unwrap_or(state.config.server.port);
    let addr = format!("{host}:{port}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "cadence-server listening");

    // Serve with graceful shutdown on SIGINT / SIGTERM.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(tx) = scheduler_shutdown {
        let _ = tx.send(()).await;
    }

    info!("cadence-server shut down");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM, then return to trigger graceful
/// shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
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
        () = ctrl_c => { info!("received SIGINT"); }
        () = terminate => { info!("received SIGTERM"); }
    }
}
