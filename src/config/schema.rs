//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the manager.
//! Every section has defaults, so an empty file (or no file) is a working
//! Debian-style setup.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::apache::{ApacheLayout, CommandTemplates, TlsLayout};

/// Root configuration for the vhost manager.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ManagerConfig {
    /// HTTP API listener.
    pub listener: ListenerConfig,

    /// Where site records live.
    pub store: StoreConfig,

    /// Web server directories and control commands.
    pub apache: ApacheConfig,

    /// Local service discovery.
    pub scanner: ScannerConfig,

    /// API access and request handling.
    pub api: ApiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Site record storage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one `<domain>.json` per site. Created if missing.
    pub sites_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sites_dir: PathBuf::from("sites"),
        }
    }
}

/// Web server layout and the commands used to drive it.
///
/// Commands are argv lists; `{file}` is replaced with `<domain>.conf`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApacheConfig {
    pub sites_available_dir: PathBuf,
    pub sites_enabled_dir: PathBuf,

    /// Directory of `<domain>.crt` files referenced by TLS blocks.
    pub ssl_cert_dir: PathBuf,

    /// Directory of `<domain>.key` files referenced by TLS blocks.
    pub ssl_key_dir: PathBuf,

    /// Upper bound for any single command.
    pub command_timeout_secs: u64,

    pub enable_command: Vec<String>,
    pub disable_command: Vec<String>,
    pub reload_command: Vec<String>,
    pub test_command: Vec<String>,
}

impl Default for ApacheConfig {
    fn default() -> Self {
        let tls = TlsLayout::default();
        Self {
            sites_available_dir: PathBuf::from("/etc/apache2/sites-available"),
            sites_enabled_dir: PathBuf::from("/etc/apache2/sites-enabled"),
            ssl_cert_dir: tls.cert_dir,
            ssl_key_dir: tls.key_dir,
            command_timeout_secs: 30,
            // -n: fail fast instead of blocking on a password prompt.
            enable_command: argv(&["sudo", "-n", "a2ensite", "{file}"]),
            disable_command: argv(&["sudo", "-n", "a2dissite", "{file}"]),
            reload_command: argv(&["sudo", "-n", "systemctl", "reload", "apache2"]),
            test_command: argv(&["sudo", "-n", "apachectl", "configtest"]),
        }
    }
}

impl ApacheConfig {
    pub fn layout(&self) -> ApacheLayout {
        ApacheLayout {
            available_dir: self.sites_available_dir.clone(),
            enabled_dir: self.sites_enabled_dir.clone(),
            tls: TlsLayout {
                cert_dir: self.ssl_cert_dir.clone(),
                key_dir: self.ssl_key_dir.clone(),
            },
        }
    }

    pub fn templates(&self) -> CommandTemplates {
        CommandTemplates {
            enable: self.enable_command.clone(),
            disable: self.disable_command.clone(),
            reload: self.reload_command.clone(),
            test: self.test_command.clone(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Local port scan settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Host probed for listening services.
    pub host: String,

    /// Ports probed, in report order.
    pub ports: Vec<u16>,

    /// Per-port connect timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            ports: vec![3000, 3001, 4000, 4200, 5000, 5173, 8000, 8080, 8081, 8888, 9000],
            timeout_ms: 300,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Bearer token required on `/api` routes. Unset means no auth.
    pub api_key: Option<String>,

    /// Total time a request may take, including web server commands.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            request_timeout_secs: 120,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus endpoint.
    pub metrics_enabled: bool,

    /// Prometheus endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config: ManagerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert_eq!(config.apache.command_timeout(), Duration::from_secs(30));
        assert_eq!(config.apache.enable_command.last().map(String::as_str), Some("{file}"));
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: ManagerConfig = toml::from_str(
            r#"
            [apache]
            sites_available_dir = "/tmp/avail"
            reload_command = ["systemctl", "reload", "httpd"]

            [api]
            api_key = "secret"
            "#,
        )
        .unwrap();

        let layout = config.apache.layout();
        assert_eq!(layout.available_dir, PathBuf::from("/tmp/avail"));
        assert_eq!(layout.enabled_dir, PathBuf::from("/etc/apache2/sites-enabled"));
        assert_eq!(config.apache.templates().reload, vec!["systemctl", "reload", "httpd"]);
        assert_eq!(config.api.api_key.as_deref(), Some("secret"));
        assert_eq!(config.listener, ListenerConfig::default());
    }
}
