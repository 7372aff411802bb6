//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the runtime (store, synchronizer, scanner) from a validated config
//! - Rebuild and swap it in when the config file changes
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - A failed rebuild during hot reload keeps the running runtime
//! - The listener address is fixed for the life of the process

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::apache::{ApacheSync, CommandControl};
use crate::config::{ConfigError, ConfigWatcher, ManagerConfig};
use crate::http::AppState;
use crate::net::PortScanner;
use crate::service::SiteService;
use crate::site::{FsSiteStore, StoreError};

/// Everything a request needs, built from one config snapshot.
pub struct Runtime {
    pub config: ManagerConfig,
    pub service: SiteService,
    pub scanner: PortScanner,
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("failed to open site store: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Wire the subsystems together in dependency order.
pub async fn build_runtime(config: ManagerConfig) -> Result<Runtime, StartupError> {
    let store = FsSiteStore::open(&config.store.sites_dir).await?;
    let control = CommandControl::new(config.apache.templates(), config.apache.command_timeout());
    let sync = ApacheSync::new(config.apache.layout(), Arc::new(control));
    let service = SiteService::new(Arc::new(store), sync);
    let scanner = PortScanner::new(&config.scanner);

    tracing::info!(
        sites_dir = %config.store.sites_dir.display(),
        sites_available_dir = %config.apache.sites_available_dir.display(),
        command_timeout_secs = config.apache.command_timeout_secs,
        "Runtime initialized"
    );

    Ok(Runtime {
        config,
        service,
        scanner,
    })
}

/// Watch `path` and swap a fresh runtime into `state` on every valid change.
///
/// Returns the notify handle (dropping it stops the watch) and the task
/// applying updates. The task ends when `shutdown` fires.
pub fn spawn_reloader(
    path: &Path,
    state: AppState,
    shutdown: broadcast::Receiver<()>,
) -> Result<(notify::RecommendedWatcher, JoinHandle<()>), notify::Error> {
    let (watcher, updates) = ConfigWatcher::new(path);
    let handle = watcher.run()?;
    let task = tokio::spawn(apply_reloads(state, updates, shutdown));
    Ok((handle, task))
}

async fn apply_reloads(
    state: AppState,
    mut updates: mpsc::UnboundedReceiver<ManagerConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                reload(&state, config).await;
            }
            _ = shutdown.recv() => {
                tracing::info!("Config reloader received shutdown signal, exiting loop");
                break;
            }
        }
    }
}

/// Apply one new config. Returns whether the runtime was replaced.
pub async fn reload(state: &AppState, config: ManagerConfig) -> bool {
    let current = state.runtime();
    if current.config == config {
        tracing::debug!("Config unchanged, skipping reload");
        return false;
    }
    if current.config.listener.bind_address != config.listener.bind_address {
        tracing::warn!(
            current = %current.config.listener.bind_address,
            requested = %config.listener.bind_address,
            "Listener address changes require a restart"
        );
    }
    if current.config.observability != config.observability {
        tracing::warn!("Observability changes require a restart");
    }

    match build_runtime(config).await {
        Ok(runtime) => {
            state.swap(runtime);
            tracing::info!("Configuration reloaded");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to apply new configuration, keeping current one");
            false
        }
    }
}
