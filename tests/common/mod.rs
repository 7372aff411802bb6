//! Shared utilities for integration tests.
//!
//! Every environment gets its own temp directory and stands in for the Apache
//! tooling with small `sh` scripts: enabling symlinks the config into the
//! enabled directory, and every command appends a line to `commands.log`.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tokio::net::TcpListener;

use vhost_manager::config::ManagerConfig;
use vhost_manager::http::{AppState, HttpServer};
use vhost_manager::lifecycle::{build_runtime, Runtime, Shutdown};
use vhost_manager::SiteService;

/// Which command a test wants to break.
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Enable,
    Disable,
    Reload,
    Test,
}

pub struct TestEnv {
    pub dir: TempDir,
    pub config: ManagerConfig,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["sites", "available", "enabled"] {
            std::fs::create_dir_all(root.join(sub)).unwrap();
        }

        let mut config = ManagerConfig::default();
        config.listener.bind_address = "127.0.0.1:0".to_string();
        config.store.sites_dir = root.join("sites");
        config.apache.sites_available_dir = root.join("available");
        config.apache.sites_enabled_dir = root.join("enabled");
        config.apache.command_timeout_secs = 5;

        Self { dir, config }.restore()
    }

    /// Put back working commands for this environment's directories.
    pub fn restore(mut self) -> Self {
        let root = self.dir.path();
        let avail = root.join("available");
        let enabled = root.join("enabled");
        let log = root.join("commands.log");

        let apache = &mut self.config.apache;
        apache.enable_command = sh_with_file(&format!(
            "ln -sf '{}'/\"$1\" '{}'/\"$1\" && echo \"enable $1\" >> '{}'",
            avail.display(),
            enabled.display(),
            log.display()
        ));
        apache.disable_command = sh_with_file(&format!(
            "rm -f '{}'/\"$1\" && echo \"disable $1\" >> '{}'",
            enabled.display(),
            log.display()
        ));
        apache.reload_command = sh(&format!("echo reload >> '{}'", log.display()));
        apache.test_command = sh("echo 'Syntax OK' >&2");
        self
    }

    /// Make `step` exit non-zero with an a2ensite-style message.
    pub fn fail(mut self, step: Step) -> Self {
        let script = "echo 'ERROR: permission denied' >&2; exit 1";
        let apache = &mut self.config.apache;
        match step {
            Step::Enable => apache.enable_command = sh_with_file(script),
            Step::Disable => apache.disable_command = sh_with_file(script),
            Step::Reload => apache.reload_command = sh(script),
            Step::Test => apache.test_command = sh("echo 'AH00526: Syntax error on line 3' >&2; exit 1"),
        }
        self
    }

    /// Make `step` hang well past the command timeout.
    pub fn hang(mut self, step: Step, timeout_secs: u64) -> Self {
        self.config.apache.command_timeout_secs = timeout_secs;
        let apache = &mut self.config.apache;
        match step {
            Step::Enable => apache.enable_command = sh_with_file("sleep 30"),
            Step::Disable => apache.disable_command = sh_with_file("sleep 30"),
            Step::Reload => apache.reload_command = sh("sleep 30"),
            Step::Test => apache.test_command = sh("sleep 30"),
        }
        self
    }

    pub async fn runtime(&self) -> Runtime {
        build_runtime(self.config.clone()).await.unwrap()
    }

    pub async fn service(&self) -> SiteService {
        self.runtime().await.service
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn available(&self, domain: &str) -> PathBuf {
        self.root().join("available").join(format!("{}.conf", domain))
    }

    pub fn enabled(&self, domain: &str) -> PathBuf {
        self.root().join("enabled").join(format!("{}.conf", domain))
    }

    pub fn record_file(&self, domain: &str) -> PathBuf {
        self.root().join("sites").join(format!("{}.json", domain))
    }

    /// Commands that ran successfully, in order.
    pub fn commands(&self) -> Vec<String> {
        std::fs::read_to_string(self.root().join("commands.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn clear_commands(&self) {
        let _ = std::fs::remove_file(self.root().join("commands.log"));
    }
}

/// `sh -c <script>` with the config file name as `$1`.
pub fn sh_with_file(script: &str) -> Vec<String> {
    vec![
        "sh".to_string(),
        "-c".to_string(),
        script.to_string(),
        "sh".to_string(),
        "{file}".to_string(),
    ]
}

pub fn sh(script: &str) -> Vec<String> {
    vec!["sh".to_string(), "-c".to_string(), script.to_string()]
}

/// A running API server bound to an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    shutdown: Shutdown,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start(config: ManagerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = AppState::new(build_runtime(config).await.unwrap());
        let shutdown = Shutdown::new();

        let server = HttpServer::new(state.clone());
        let stop = shutdown.wait();
        let handle = tokio::spawn(async move {
            server.run(listener, stop).await.unwrap();
        });

        Self {
            addr,
            state,
            shutdown,
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/api{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = self.handle.await;
    }
}
