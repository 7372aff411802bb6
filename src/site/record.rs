//! Site record definitions.
//!
//! A [`SiteRecord`] is always valid by construction once it has passed
//! [`SiteRecord::validate`]. The loose on-disk / on-the-wire form is
//! [`SiteDraft`], which also understands the legacy `isProxy` encoding.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Port used for the plaintext virtual host when none is given.
pub const DEFAULT_PORT: u16 = 80;

/// Longest domain name accepted (RFC 1035 presentation form).
const MAX_DOMAIN_LEN: usize = 253;

/// A declarative site: one domain, one virtual host (plus an optional TLS twin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SiteDraft", into = "SiteDraft")]
pub struct SiteRecord {
    /// Primary key. Also names the `<domain>.json` and `<domain>.conf` artifacts.
    pub domain: String,

    /// What the virtual host serves.
    pub kind: SiteKind,

    /// Listening port of the plaintext virtual host.
    pub port: u16,

    /// Additional hostname(s) for `ServerAlias`.
    pub server_alias: Option<String>,

    /// Emit a second `*:443` block terminating TLS.
    pub enable_ssl: bool,
}

/// The content behaviour of a site. Exactly one variant's field is ever active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// Serve files from a directory.
    Static { document_root: PathBuf },
    /// Reverse-proxy to an upstream URL.
    Proxy { proxy_target: String },
}

/// Wire discriminator for [`SiteKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKindTag {
    Static,
    Proxy,
}

/// Errors raised while checking a record. These never reach the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("{field} contradicts the site kind: {reason}")]
    Contradiction { field: &'static str, reason: String },
}

impl ValidationError {
    /// Name of the offending field, as it appears on the wire.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::InvalidField { field, .. } => field,
            ValidationError::Contradiction { field, .. } => field,
        }
    }

    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

impl SiteRecord {
    /// A static site on the default port.
    pub fn new_static(domain: impl Into<String>, document_root: impl Into<PathBuf>) -> Self {
        Self {
            domain: domain.into(),
            kind: SiteKind::Static {
                document_root: document_root.into(),
            },
            port: DEFAULT_PORT,
            server_alias: None,
            enable_ssl: false,
        }
    }

    /// A reverse-proxy site on the default port.
    pub fn new_proxy(domain: impl Into<String>, proxy_target: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            kind: SiteKind::Proxy {
                proxy_target: proxy_target.into(),
            },
            port: DEFAULT_PORT,
            server_alias: None,
            enable_ssl: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.server_alias = Some(alias.into());
        self
    }

    pub fn with_ssl(mut self, enable_ssl: bool) -> Self {
        self.enable_ssl = enable_ssl;
        self
    }

    pub fn is_proxy(&self) -> bool {
        matches!(self.kind, SiteKind::Proxy { .. })
    }

    /// Check every field. Called by the service before anything is persisted.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_domain(&self.domain)?;

        if self.port == 0 {
            return Err(ValidationError::invalid("port", "must be between 1 and 65535"));
        }

        match &self.kind {
            SiteKind::Static { document_root } => {
                let root = document_root
                    .to_str()
                    .ok_or_else(|| ValidationError::invalid("documentRoot", "must be valid UTF-8"))?;
                if root.trim().is_empty() {
                    return Err(ValidationError::MissingField("documentRoot"));
                }
                reject_padding("documentRoot", root)?;
                reject_control_chars("documentRoot", root)?;
                if root.contains(['"', '\\']) {
                    return Err(ValidationError::invalid(
                        "documentRoot",
                        "must not contain quotes or backslashes",
                    ));
                }
            }
            SiteKind::Proxy { proxy_target } => {
                if proxy_target.trim().is_empty() {
                    return Err(ValidationError::MissingField("proxyTarget"));
                }
                reject_padding("proxyTarget", proxy_target)?;
                validate_proxy_target(proxy_target)?;
            }
        }

        if let Some(alias) = &self.server_alias {
            if alias.trim().is_empty() {
                return Err(ValidationError::invalid("serverAlias", "must not be blank"));
            }
            reject_padding("serverAlias", alias)?;
            reject_control_chars("serverAlias", alias)?;
        }

        Ok(())
    }
}

/// Check that `domain` is usable both as a `ServerName` and as a file stem.
pub fn validate_domain(domain: &str) -> Result<(), ValidationError> {
    if domain.is_empty() {
        return Err(ValidationError::MissingField("domain"));
    }
    if domain.len() > MAX_DOMAIN_LEN {
        return Err(ValidationError::invalid(
            "domain",
            format!("longer than {} characters", MAX_DOMAIN_LEN),
        ));
    }

    // Apache only matches wildcards in ServerAlias.
    if domain.starts_with('*') {
        return Err(ValidationError::invalid(
            "domain",
            "wildcards belong in serverAlias",
        ));
    }

    if domain.starts_with('.') || domain.ends_with('.') || domain.contains("..") {
        return Err(ValidationError::invalid("domain", "empty label"));
    }
    if let Some(c) = domain
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')))
    {
        return Err(ValidationError::invalid(
            "domain",
            format!("unexpected character {:?}", c),
        ));
    }

    Ok(())
}

fn validate_proxy_target(target: &str) -> Result<(), ValidationError> {
    let url = Url::parse(target)
        .map_err(|e| ValidationError::invalid("proxyTarget", e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(ValidationError::invalid(
                "proxyTarget",
                format!("unsupported scheme {:?}", other),
            ))
        }
    }
    if url.host_str().is_none() {
        return Err(ValidationError::invalid("proxyTarget", "missing host"));
    }

    reject_control_chars("proxyTarget", target)?;
    if target.contains(|c: char| c.is_whitespace() || c == '"') {
        return Err(ValidationError::invalid(
            "proxyTarget",
            "must not contain whitespace or quotes",
        ));
    }
    Ok(())
}

/// Stored values are trimmed on load, so untrimmed ones would not survive a round trip.
fn reject_padding(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim() != value {
        return Err(ValidationError::invalid(
            field,
            "must not have leading or trailing whitespace",
        ));
    }
    Ok(())
}

fn reject_control_chars(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(ValidationError::invalid(field, "contains control characters"));
    }
    Ok(())
}

/// Loose JSON form of a site, as stored in `<domain>.json` and sent by API clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDraft {
    #[serde(default)]
    pub domain: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<SiteKindTag>,

    /// Legacy discriminator; read but never written.
    #[serde(default, skip_serializing)]
    pub is_proxy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_target: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_alias: Option<String>,

    #[serde(default, rename = "enableSSL")]
    pub enable_ssl: bool,
}

impl SiteDraft {
    /// Resolve the draft into a validated record.
    pub fn into_record(self) -> Result<SiteRecord, ValidationError> {
        let document_root = non_blank(self.document_root);
        let proxy_target = non_blank(self.proxy_target);

        let tag = match (self.kind, self.is_proxy) {
            (Some(kind), Some(is_proxy)) if (kind == SiteKindTag::Proxy) != is_proxy => {
                return Err(ValidationError::Contradiction {
                    field: "isProxy",
                    reason: format!("kind is {:?} but isProxy is {}", kind, is_proxy),
                });
            }
            (Some(kind), _) => kind,
            (None, Some(true)) => SiteKindTag::Proxy,
            (None, Some(false)) => SiteKindTag::Static,
            (None, None) => match (&document_root, &proxy_target) {
                (Some(_), None) => SiteKindTag::Static,
                (None, Some(_)) => SiteKindTag::Proxy,
                (Some(_), Some(_)) => {
                    return Err(ValidationError::Contradiction {
                        field: "kind",
                        reason: "both documentRoot and proxyTarget are set".to_string(),
                    });
                }
                (None, None) => return Err(ValidationError::MissingField("kind")),
            },
        };

        let kind = match tag {
            SiteKindTag::Static => {
                if proxy_target.is_some() {
                    return Err(ValidationError::Contradiction {
                        field: "proxyTarget",
                        reason: "static sites do not proxy".to_string(),
                    });
                }
                let document_root =
                    document_root.ok_or(ValidationError::MissingField("documentRoot"))?;
                SiteKind::Static {
                    document_root: PathBuf::from(document_root),
                }
            }
            SiteKindTag::Proxy => {
                if document_root.is_some() {
                    return Err(ValidationError::Contradiction {
                        field: "documentRoot",
                        reason: "proxy sites do not serve files".to_string(),
                    });
                }
                let proxy_target =
                    proxy_target.ok_or(ValidationError::MissingField("proxyTarget"))?;
                SiteKind::Proxy { proxy_target }
            }
        };

        let record = SiteRecord {
            domain: self.domain.trim().to_string(),
            kind,
            port: self.port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT),
            server_alias: non_blank(self.server_alias),
            enable_ssl: self.enable_ssl,
        };
        record.validate()?;
        Ok(record)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<SiteDraft> for SiteRecord {
    type Error = ValidationError;

    fn try_from(draft: SiteDraft) -> Result<Self, Self::Error> {
        draft.into_record()
    }
}

impl From<SiteRecord> for SiteDraft {
    fn from(record: SiteRecord) -> Self {
        let (kind, document_root, proxy_target) = match record.kind {
            SiteKind::Static { document_root } => (
                SiteKindTag::Static,
                Some(document_root.to_string_lossy().into_owned()),
                None,
            ),
            SiteKind::Proxy { proxy_target } => (SiteKindTag::Proxy, None, Some(proxy_target)),
        };

        Self {
            domain: record.domain,
            kind: Some(kind),
            is_proxy: None,
            document_root,
            proxy_target,
            port: Some(record.port),
            server_alias: record.server_alias,
            enable_ssl: record.enable_ssl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_proxy_record_loads() {
        let json = r#"{
            "domain": "api.example.com",
            "documentRoot": "",
            "port": 80,
            "serverAlias": "",
            "enableSSL": true,
            "isProxy": true,
            "proxyTarget": "http://127.0.0.1:5000"
        }"#;

        let record: SiteRecord = serde_json::from_str(json).unwrap();
        assert_eq!(
            record.kind,
            SiteKind::Proxy {
                proxy_target: "http://127.0.0.1:5000".into()
            }
        );
        assert_eq!(record.server_alias, None);
        assert!(record.enable_ssl);
    }

    #[test]
    fn test_serialized_form_carries_only_active_field() {
        let record = SiteRecord::new_proxy("api.example.com", "http://127.0.0.1:5000");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["kind"], "proxy");
        assert_eq!(value["proxyTarget"], "http://127.0.0.1:5000");
        assert_eq!(value["enableSSL"], false);
        assert!(value.get("documentRoot").is_none());
        assert!(value.get("isProxy").is_none());
        assert!(value.get("serverAlias").is_none());

        let back: SiteRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_kind_inferred_from_single_field() {
        let draft = SiteDraft {
            domain: "example.com".into(),
            document_root: Some("/var/www/example".into()),
            ..Default::default()
        };
        let record = draft.into_record().unwrap();
        assert!(!record.is_proxy());
        assert_eq!(record.port, DEFAULT_PORT);
    }

    #[test]
    fn test_zero_port_falls_back_to_default() {
        let draft = SiteDraft {
            domain: "example.com".into(),
            kind: Some(SiteKindTag::Static),
            document_root: Some("/srv/www".into()),
            port: Some(0),
            ..Default::default()
        };
        assert_eq!(draft.into_record().unwrap().port, 80);
    }

    #[test]
    fn test_missing_field_is_named() {
        let draft = SiteDraft {
            domain: "example.com".into(),
            kind: Some(SiteKindTag::Proxy),
            ..Default::default()
        };
        assert_eq!(
            draft.into_record(),
            Err(ValidationError::MissingField("proxyTarget"))
        );

        let draft = SiteDraft {
            kind: Some(SiteKindTag::Static),
            document_root: Some("/srv".into()),
            ..Default::default()
        };
        assert_eq!(draft.into_record().unwrap_err().field(), "domain");
    }

    #[test]
    fn test_contradictions_rejected() {
        let both = SiteDraft {
            domain: "example.com".into(),
            document_root: Some("/srv".into()),
            proxy_target: Some("http://localhost:3000".into()),
            ..Default::default()
        };
        assert!(matches!(
            both.into_record(),
            Err(ValidationError::Contradiction { field: "kind", .. })
        ));

        let mismatch = SiteDraft {
            domain: "example.com".into(),
            kind: Some(SiteKindTag::Static),
            is_proxy: Some(true),
            document_root: Some("/srv".into()),
            ..Default::default()
        };
        assert!(matches!(
            mismatch.into_record(),
            Err(ValidationError::Contradiction { field: "isProxy", .. })
        ));
    }

    #[test]
    fn test_domain_must_be_a_safe_file_stem() {
        assert!(validate_domain("example.com").is_ok());
        assert!(validate_domain("my_site.local").is_ok());

        for bad in ["*.example.com", "../etc/passwd", "a/b.com", ".hidden", "trailing.", "a..b", "sp ace.com"] {
            assert_eq!(validate_domain(bad).unwrap_err().field(), "domain", "{}", bad);
        }
    }

    #[test]
    fn test_proxy_target_needs_http_scheme() {
        let record = SiteRecord::new_proxy("example.com", "ftp://127.0.0.1");
        assert_eq!(record.validate().unwrap_err().field(), "proxyTarget");

        let record = SiteRecord::new_proxy("example.com", "127.0.0.1:5000");
        assert!(record.validate().is_err());

        let record = SiteRecord::new_proxy("example.com", "https://upstream.internal:8443/app");
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_injected_newline_rejected() {
        let record = SiteRecord::new_static("example.com", "/srv\n</VirtualHost>");
        assert_eq!(record.validate().unwrap_err().field(), "documentRoot");

        let record = SiteRecord::new_static("example.com", "/srv").with_alias("a.com\nInclude /x");
        assert_eq!(record.validate().unwrap_err().field(), "serverAlias");
    }

    #[test]
    fn test_padded_fields_rejected() {
        let record = SiteRecord::new_static("example.com", "/srv/www ");
        assert_eq!(record.validate().unwrap_err().field(), "documentRoot");

        let record = SiteRecord::new_static("example.com", "/srv/www").with_alias(" www.example.com");
        assert_eq!(record.validate().unwrap_err().field(), "serverAlias");

        let record = SiteRecord::new_proxy("example.com", " http://127.0.0.1:5000");
        assert_eq!(record.validate().unwrap_err().field(), "proxyTarget");
    }

    #[test]
    fn test_padded_draft_is_trimmed_into_valid_record() {
        let draft = SiteDraft {
            domain: " example.com ".into(),
            document_root: Some(" /srv/www ".into()),
            server_alias: Some(" www.example.com".into()),
            ..Default::default()
        };
        let record = draft.into_record().unwrap();
        assert_eq!(
            record,
            SiteRecord::new_static("example.com", "/srv/www").with_alias("www.example.com")
        );
    }

    #[test]
    fn test_document_root_with_space_allowed_but_not_quote() {
        let record = SiteRecord::new_static("example.com", "/var/www/my site");
        assert!(record.validate().is_ok());

        let record = SiteRecord::new_static("example.com", "/var/www/\"x\"");
        assert_eq!(record.validate().unwrap_err().field(), "documentRoot");
    }

    #[test]
    fn test_proxy_target_with_space_rejected() {
        let record = SiteRecord::new_proxy("example.com", "http://127.0.0.1:5000/my app");
        assert_eq!(record.validate().unwrap_err().field(), "proxyTarget");
    }
}
