//! vhost-manager server
//!
//! Manages Apache virtual hosts from declarative site records over a JSON API.
//!
//! # Architecture Overview
//!
//! ```text
//!     API request
//!     ──────────▶ http (axum: request id, trace, timeout, auth)
//!                   │
//!                   ▼
//!                 service::SiteService ──────▶ site::FsSiteStore (<domain>.json)
//!                   │
//!                   ▼
//!                 apache::ApacheSync
//!                   ├── render   (record → <VirtualHost> text)
//!                   ├── write    (sites-available/<domain>.conf)
//!                   └── control  (a2ensite / a2dissite / reload, with timeout)
//!
//!     Cross-cutting: config (+ hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tokio::net::TcpListener;

use vhost_manager::config::load_or_default;
use vhost_manager::http::{AppState, HttpServer};
use vhost_manager::lifecycle::{build_runtime, signals, startup, Shutdown, StartupError};
use vhost_manager::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "vhost-manager", version, about = "Apache virtual host manager")]
struct Cli {
    /// Path to the TOML config file. A missing file means built-in defaults.
    #[arg(short, long, env = "VHOST_MANAGER_CONFIG", default_value = "vhost-manager.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            eprintln!("vhost-manager: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    let config = load_or_default(&cli.config)?;
    logging::init(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "vhost-manager starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let bind_address = config.listener.bind_address.clone();
    let state = AppState::new(build_runtime(config).await?);

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let reloader = match startup::spawn_reloader(&cli.config, state.clone(), shutdown.subscribe()) {
        Ok(reloader) => Some(reloader),
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            None
        }
    };

    let server = HttpServer::new(state);
    let served = server.run(listener, shutdown.wait()).await;

    // Stop the reloader even when the server exited on its own.
    shutdown.trigger();
    if let Some((watcher, task)) = reloader {
        drop(watcher);
        let _ = task.await;
    }

    served.map_err(StartupError::Serve)?;

    tracing::info!("Shutdown complete");
    Ok(())
}
