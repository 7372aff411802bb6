//! Local service discovery.
//!
//! Probes a fixed list of ports on one host and reports which ones accept a
//! TCP connection. Used to suggest a `proxyTarget` for new proxy sites.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time;

use crate::config::ScannerConfig;

/// A port that accepted a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveService {
    pub port: u16,
    /// Framework commonly found on this port, or a generic label.
    pub name: String,
    /// Suggested proxy target.
    pub url: String,
}

/// Conventional development-server ports.
pub fn service_name(port: u16) -> &'static str {
    match port {
        3000 => "Node.js",
        3001 => "Node.js (alt)",
        4000 => "Phoenix",
        4200 => "Angular",
        5000 => "Flask",
        5173 => "Vite",
        8000 => "Django",
        8080 => "HTTP (alt)",
        8081 => "HTTP (alt)",
        8888 => "Jupyter",
        9000 => "PHP-FPM",
        _ => "Service",
    }
}

#[derive(Debug, Clone)]
pub struct PortScanner {
    host: String,
    ports: Vec<u16>,
    timeout: Duration,
}

impl PortScanner {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            host: config.host.clone(),
            ports: config.ports.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Probe every configured port concurrently. Open ports come back in
    /// configuration order.
    pub async fn scan(&self) -> Vec<ActiveService> {
        let probes = self.ports.iter().map(|&port| async move {
            if self.probe(port).await {
                Some(ActiveService {
                    port,
                    name: service_name(port).to_string(),
                    url: format!("http://localhost:{}", port),
                })
            } else {
                None
            }
        });

        let active: Vec<ActiveService> = join_all(probes).await.into_iter().flatten().collect();
        tracing::debug!(probed = self.ports.len(), active = active.len(), "Port scan finished");
        active
    }

    async fn probe(&self, port: u16) -> bool {
        let addr = (self.host.as_str(), port);
        match time::timeout(self.timeout, TcpStream::connect(addr)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::trace!(port = port, error = %e, "Port closed");
                false
            }
            Err(_) => {
                tracing::trace!(port = port, "Port probe timed out");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_scan_reports_only_open_ports() {
        let open = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let open_port = open.local_addr().unwrap().port();

        // Bind then drop to get a port that is very likely closed.
        let closed_port = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };

        let scanner = PortScanner::new(&ScannerConfig {
            host: "127.0.0.1".to_string(),
            ports: vec![closed_port, open_port],
            timeout_ms: 500,
        });

        let active = scanner.scan().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].port, open_port);
        assert_eq!(active[0].url, format!("http://localhost:{}", open_port));
    }

    #[test]
    fn test_friendly_names() {
        assert_eq!(service_name(3000), "Node.js");
        assert_eq!(service_name(5000), "Flask");
        assert_eq!(service_name(8000), "Django");
        assert_eq!(service_name(12345), "Service");
    }
}
