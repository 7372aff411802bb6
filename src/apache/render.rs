//! Virtual-host config generation.
//!
//! Pure and deterministic: the same record always renders to the same text,
//! which is what makes re-applying a site idempotent.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use crate::site::{SiteKind, SiteRecord};

/// Port of the TLS-terminating virtual host.
pub const TLS_PORT: u16 = 443;

const INDENT: &str = "    ";

/// Where TLS certificates and keys for a domain are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsLayout {
    pub cert_dir: PathBuf,
    pub key_dir: PathBuf,
}

impl Default for TlsLayout {
    fn default() -> Self {
        Self {
            cert_dir: PathBuf::from("/etc/ssl/certs"),
            key_dir: PathBuf::from("/etc/ssl/private"),
        }
    }
}

impl TlsLayout {
    pub fn new(cert_dir: impl Into<PathBuf>, key_dir: impl Into<PathBuf>) -> Self {
        Self {
            cert_dir: cert_dir.into(),
            key_dir: key_dir.into(),
        }
    }

    pub fn cert_path(&self, domain: &str) -> PathBuf {
        self.cert_dir.join(format!("{}.crt", domain))
    }

    pub fn key_path(&self, domain: &str) -> PathBuf {
        self.key_dir.join(format!("{}.key", domain))
    }
}

/// Which of the two virtual hosts is being emitted.
#[derive(Clone, Copy)]
enum Block {
    Plain,
    Tls,
}

impl Block {
    fn websocket_scheme(self) -> &'static str {
        match self {
            Block::Plain => "ws",
            Block::Tls => "wss",
        }
    }

    fn log_infix(self) -> &'static str {
        match self {
            Block::Plain => "",
            Block::Tls => "-ssl",
        }
    }
}

/// Render `record` with the default certificate locations.
pub fn render(record: &SiteRecord) -> String {
    render_with(record, &TlsLayout::default())
}

/// Render `record`, taking certificate/key locations from `tls`.
pub fn render_with(record: &SiteRecord, tls: &TlsLayout) -> String {
    let mut out = String::new();

    render_block(&mut out, record, Block::Plain, record.port, tls);
    if record.enable_ssl {
        out.push('\n');
        render_block(&mut out, record, Block::Tls, TLS_PORT, tls);
    }

    out
}

fn render_block(out: &mut String, record: &SiteRecord, block: Block, port: u16, tls: &TlsLayout) {
    let domain = &record.domain;

    let _ = writeln!(out, "<VirtualHost *:{}>", port);
    let _ = writeln!(out, "{INDENT}ServerName {}", domain);
    if let Some(alias) = &record.server_alias {
        let _ = writeln!(out, "{INDENT}ServerAlias {}", alias);
    }

    if let Block::Tls = block {
        out.push('\n');
        let _ = writeln!(out, "{INDENT}SSLEngine on");
        let _ = writeln!(out, "{INDENT}SSLCertificateFile {}", tls.cert_path(domain).display());
        let _ = writeln!(out, "{INDENT}SSLCertificateKeyFile {}", tls.key_path(domain).display());
    }

    out.push('\n');
    match &record.kind {
        SiteKind::Proxy { proxy_target } => render_proxy(out, proxy_target, block),
        SiteKind::Static { document_root } => render_static(out, document_root),
    }

    let infix = block.log_infix();
    out.push('\n');
    let _ = writeln!(out, "{INDENT}ErrorLog ${{APACHE_LOG_DIR}}/{}{}-error.log", domain, infix);
    let _ = writeln!(
        out,
        "{INDENT}CustomLog ${{APACHE_LOG_DIR}}/{}{}-access.log combined",
        domain, infix
    );
    out.push_str("</VirtualHost>\n");
}

fn render_proxy(out: &mut String, target: &str, block: Block) {
    let _ = writeln!(out, "{INDENT}ProxyPreserveHost On");
    let _ = writeln!(out, "{INDENT}ProxyPass / {}", target);
    let _ = writeln!(out, "{INDENT}ProxyPassReverse / {}", target);
    out.push('\n');
    let _ = writeln!(out, "{INDENT}RewriteEngine On");
    let _ = writeln!(out, "{INDENT}RewriteCond %{{HTTP:Upgrade}} websocket [NC]");
    let _ = writeln!(out, "{INDENT}RewriteCond %{{HTTP:Connection}} upgrade [NC]");
    let _ = writeln!(
        out,
        "{INDENT}RewriteRule ^/?(.*) \"{}://{}/$1\" [P,L]",
        block.websocket_scheme(),
        websocket_authority(target)
    );
}

fn render_static(out: &mut String, document_root: &Path) {
    let root = document_root.display();
    let _ = writeln!(out, "{INDENT}DocumentRoot \"{}\"", root);
    out.push('\n');
    let _ = writeln!(out, "{INDENT}<Directory \"{}\">", root);
    let _ = writeln!(out, "{INDENT}{INDENT}Options Indexes FollowSymLinks");
    let _ = writeln!(out, "{INDENT}{INDENT}AllowOverride All");
    let _ = writeln!(out, "{INDENT}{INDENT}Require all granted");
    let _ = writeln!(out, "{INDENT}</Directory>");
}

/// The proxy target with one leading `http://` or `https://` removed.
fn websocket_authority(target: &str) -> &str {
    target
        .strip_prefix("https://")
        .or_else(|| target.strip_prefix("http://"))
        .unwrap_or(target)
        .trim_end_matches('/')
}
