//! Apache synchronizer.
//!
//! Aligns the web server's on-disk and process state with a site record.
//! Writing the config file is the only step that can fail an operation; every
//! command step afterwards degrades the outcome to a warning instead.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;

use crate::apache::control::{ApacheControl, CommandError, CommandOutput};
use crate::apache::render::{render_with, TlsLayout};
use crate::atomic_file::{remove_if_exists, write_atomic};
use crate::observability::metrics;
use crate::site::SiteRecord;

/// File name of the generated config for `domain`.
pub fn conf_file_name(domain: &str) -> String {
    format!("{}.conf", domain)
}

/// Filesystem locations the synchronizer manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApacheLayout {
    /// Canonical location of generated configs ("sites-available").
    pub available_dir: PathBuf,
    /// Where activations show up ("sites-enabled"). Only inspected, never written.
    pub enabled_dir: PathBuf,
    pub tls: TlsLayout,
}

/// A single step of a sync that can fail without failing the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStep {
    EnableSite,
    DisableSite,
    RemoveConfig,
    Reload,
}

impl SyncStep {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStep::EnableSite => "enable-site",
            SyncStep::DisableSite => "disable-site",
            SyncStep::RemoveConfig => "remove-config",
            SyncStep::Reload => "reload",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An OS-side step that failed after the record was already saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
    pub step: SyncStep,
    pub domain: String,
    /// Raw failure text of the command, for operator diagnosis.
    pub message: String,
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.step, self.domain, self.message)
    }
}

/// Result of a sync that got past the config write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// OS state matches the record.
    Synced,
    /// The config is in place but some steps failed; OS state is out of sync.
    Degraded(Vec<SyncWarning>),
}

impl SyncOutcome {
    fn from_warnings(warnings: Vec<SyncWarning>) -> Self {
        if warnings.is_empty() {
            SyncOutcome::Synced
        } else {
            SyncOutcome::Degraded(warnings)
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced)
    }

    pub fn warnings(&self) -> &[SyncWarning] {
        match self {
            SyncOutcome::Synced => &[],
            SyncOutcome::Degraded(warnings) => warnings,
        }
    }

    pub fn into_warnings(self) -> Vec<SyncWarning> {
        match self {
            SyncOutcome::Synced => Vec::new(),
            SyncOutcome::Degraded(warnings) => warnings,
        }
    }
}

/// Failures that abort a sync before any activation is attempted.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to write {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("{domain} is already claimed by {existing}")]
    Collision { domain: String, existing: String },
}

pub type SyncResult = Result<SyncOutcome, SyncError>;

/// On-disk presence of a site's artifact pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArtifactStatus {
    /// `<available>/<domain>.conf` exists.
    pub available: bool,
    /// `<enabled>/<domain>.conf` exists (possibly as a symlink).
    pub enabled: bool,
    /// The available file differs from what the record renders to now.
    pub stale: bool,
}

impl ArtifactStatus {
    pub fn in_sync(&self) -> bool {
        self.available && self.enabled && !self.stale
    }

    /// Human-readable drift descriptions, empty when in sync.
    pub fn drift(&self) -> Vec<String> {
        let mut drift = Vec::new();
        if !self.available {
            drift.push("config file missing from the available directory".to_string());
        }
        if !self.enabled {
            drift.push("site is not enabled".to_string());
        }
        if self.stale {
            drift.push("config file differs from the stored record".to_string());
        }
        drift
    }
}

/// Applies site records to the web server.
#[derive(Clone)]
pub struct ApacheSync {
    layout: ApacheLayout,
    control: Arc<dyn ApacheControl>,
}

impl ApacheSync {
    pub fn new(layout: ApacheLayout, control: Arc<dyn ApacheControl>) -> Self {
        Self { layout, control }
    }

    pub fn layout(&self) -> &ApacheLayout {
        &self.layout
    }

    pub fn available_path(&self, domain: &str) -> PathBuf {
        self.layout.available_dir.join(conf_file_name(domain))
    }

    pub fn enabled_path(&self, domain: &str) -> PathBuf {
        self.layout.enabled_dir.join(conf_file_name(domain))
    }

    /// Config text for `record` under this layout.
    pub fn render(&self, record: &SiteRecord) -> String {
        render_with(record, &self.layout.tls)
    }

    /// Render and write the config to the available directory.
    pub async fn write_config(&self, record: &SiteRecord) -> Result<PathBuf, SyncError> {
        let path = self.available_path(&record.domain);
        let config = self.render(record);

        if let Err(source) = write_atomic(&path, config.as_bytes()).await {
            tracing::error!(domain = %record.domain, path = %path.display(), error = %source, "Failed to write site config");
            return Err(SyncError::Write { path, source });
        }

        tracing::info!(domain = %record.domain, path = %path.display(), "Site config written");
        Ok(path)
    }

    /// Delete a config written by [`write_config`](Self::write_config) that
    /// will not be activated. Used when the store write afterwards fails.
    pub async fn discard_config(&self, domain: &str) {
        let path = self.available_path(domain);
        if let Err(e) = remove_if_exists(&path).await {
            tracing::warn!(domain = %domain, path = %path.display(), error = %e, "Failed to discard site config");
        }
    }

    /// Fail with [`SyncError::Collision`] if `domain` already has a config file.
    pub async fn ensure_unclaimed(&self, domain: &str) -> Result<(), SyncError> {
        let path = self.available_path(domain);
        match fs::symlink_metadata(&path).await {
            Ok(_) => Err(SyncError::Collision {
                domain: domain.to_string(),
                existing: path.display().to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(SyncError::Read { path, source }),
        }
    }

    /// Write, enable and reload.
    pub async fn apply(&self, record: &SiteRecord) -> SyncResult {
        self.write_config(record).await?;
        Ok(self.activate(&record.domain).await)
    }

    /// Enable an already written config and reload the server.
    pub async fn activate(&self, domain: &str) -> SyncOutcome {
        let mut warnings = Vec::new();
        self.enable(domain, &mut warnings).await;
        self.reload_step(domain, &mut warnings).await;
        SyncOutcome::from_warnings(warnings)
    }

    /// Disable, delete the config and reload.
    pub async fn remove(&self, domain: &str) -> SyncOutcome {
        let mut warnings = Vec::new();
        self.teardown(domain, &mut warnings).await;
        self.reload_step(domain, &mut warnings).await;
        SyncOutcome::from_warnings(warnings)
    }

    /// Move a site from `old_domain` to `record.domain`.
    ///
    /// The new config is written first but stays inactive until the old one
    /// is disabled and deleted, so two enabled configs never claim the same
    /// server name.
    pub async fn rename(&self, old_domain: &str, record: &SiteRecord) -> SyncResult {
        self.ensure_unclaimed(&record.domain).await?;
        self.write_config(record).await?;
        Ok(self.switch(old_domain, &record.domain).await)
    }

    /// Tear down `old_domain` and activate the already written `new_domain`.
    pub async fn switch(&self, old_domain: &str, new_domain: &str) -> SyncOutcome {
        let mut warnings = Vec::new();
        self.teardown(old_domain, &mut warnings).await;
        self.enable(new_domain, &mut warnings).await;
        self.reload_step(new_domain, &mut warnings).await;
        SyncOutcome::from_warnings(warnings)
    }

    /// Run the configuration self-check, returning its output verbatim.
    pub async fn test(&self) -> Result<CommandOutput, CommandError> {
        let result = self.control.test_config().await;
        match &result {
            Ok(_) => tracing::info!("Web server config test passed"),
            Err(e) => tracing::warn!(error = %e, "Web server config test failed"),
        }
        result
    }

    /// Reload the server on demand.
    pub async fn reload(&self) -> Result<CommandOutput, CommandError> {
        let result = self.control.reload().await;
        metrics::record_sync_step(SyncStep::Reload.as_str(), result.is_ok());
        match &result {
            Ok(_) => tracing::info!("Web server reloaded"),
            Err(e) => tracing::warn!(error = %e, "Web server reload failed"),
        }
        result
    }

    /// Report which artifacts exist for `record` and whether they are current.
    pub async fn inspect(&self, record: &SiteRecord) -> Result<ArtifactStatus, SyncError> {
        let available_path = self.available_path(&record.domain);
        let on_disk = match fs::read_to_string(&available_path).await {
            Ok(content) => Some(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(SyncError::Read {
                    path: available_path,
                    source,
                })
            }
        };

        let enabled = path_present(&self.enabled_path(&record.domain)).await;
        let stale = on_disk
            .as_deref()
            .is_some_and(|content| content != self.render(record));

        Ok(ArtifactStatus {
            available: on_disk.is_some(),
            enabled,
            stale,
        })
    }

    async fn enable(&self, domain: &str, warnings: &mut Vec<SyncWarning>) {
        let result = self.control.enable_site(&conf_file_name(domain)).await;
        note_step(SyncStep::EnableSite, domain, result.map(drop), warnings);
    }

    async fn reload_step(&self, domain: &str, warnings: &mut Vec<SyncWarning>) {
        let result = self.control.reload().await;
        note_step(SyncStep::Reload, domain, result.map(drop), warnings);
    }

    async fn teardown(&self, domain: &str, warnings: &mut Vec<SyncWarning>) {
        let disabled = self.control.disable_site(&conf_file_name(domain)).await;
        let disable_failed = disabled.is_err();
        note_step(SyncStep::DisableSite, domain, disabled.map(drop), warnings);

        // Deleting the target of a live activation would leave a dangling
        // include that breaks the next reload.
        if disable_failed && path_present(&self.enabled_path(domain)).await {
            note_step(
                SyncStep::RemoveConfig,
                domain,
                Err("site is still enabled; config kept".to_string()),
                warnings,
            );
            return;
        }

        let path = self.available_path(domain);
        let removed = remove_if_exists(&path).await.map(drop).map_err(|e| {
            format!("failed to delete {}: {}", path.display(), e)
        });
        note_step(SyncStep::RemoveConfig, domain, removed, warnings);
    }
}

impl fmt::Debug for ApacheSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApacheSync")
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

fn note_step<E: fmt::Display>(
    step: SyncStep,
    domain: &str,
    result: Result<(), E>,
    warnings: &mut Vec<SyncWarning>,
) {
    metrics::record_sync_step(step.as_str(), result.is_ok());
    match result {
        Ok(()) => tracing::debug!(domain = %domain, step = %step, "Sync step succeeded"),
        Err(e) => {
            let message = e.to_string();
            tracing::warn!(domain = %domain, step = %step, error = %message, "Sync step failed; site is out of sync");
            warnings.push(SyncWarning {
                step,
                domain: domain.to_string(),
                message,
            });
        }
    }
}

async fn path_present(path: &Path) -> bool {
    fs::symlink_metadata(path).await.is_ok()
}
