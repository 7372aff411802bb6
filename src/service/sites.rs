//! Site service: store mutation plus web server sync, one result per call.

use std::sync::Arc;

use serde::Serialize;

use crate::apache::{
    ApacheSync, ArtifactStatus, CommandError, CommandOutput, SyncError, SyncOutcome, SyncWarning,
};
use crate::observability::metrics;
use crate::service::error::ServiceError;
use crate::site::record::validate_domain;
use crate::site::{SiteRecord, SiteStore, StoreError};

/// Result of a successful mutation.
///
/// An empty warning list is plain success; anything else means the record is
/// saved and authoritative but the web server is out of sync with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteChange {
    /// The record as persisted (or, for a delete, as it was before removal).
    pub site: SiteRecord,
    pub outcome: SyncOutcome,
}

impl SiteChange {
    pub fn is_synced(&self) -> bool {
        self.outcome.is_synced()
    }

    pub fn warnings(&self) -> &[SyncWarning] {
        self.outcome.warnings()
    }
}

/// Stored record together with the state of its OS artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStatus {
    pub site: SiteRecord,
    pub artifacts: ArtifactStatus,
    pub drift: Vec<String>,
}

/// Composition root over the store and the synchronizer.
#[derive(Clone)]
pub struct SiteService {
    store: Arc<dyn SiteStore>,
    sync: ApacheSync,
}

impl SiteService {
    pub fn new(store: Arc<dyn SiteStore>, sync: ApacheSync) -> Self {
        Self { store, sync }
    }

    pub fn sync(&self) -> &ApacheSync {
        &self.sync
    }

    pub async fn list(&self) -> Result<Vec<SiteRecord>, ServiceError> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, domain: &str) -> Result<SiteRecord, ServiceError> {
        validate_domain(domain)?;
        Ok(self.store.get(domain).await?)
    }

    /// Store a new site and bring it live.
    ///
    /// The config is written before the record is stored; if that write fails
    /// the store is left untouched. An existing record with the same domain
    /// is overwritten, which makes re-running a create a safe retry.
    pub async fn create(&self, record: SiteRecord) -> Result<SiteChange, ServiceError> {
        let result = self.create_inner(record).await;
        observe("create", &result);
        result
    }

    async fn create_inner(&self, record: SiteRecord) -> Result<SiteChange, ServiceError> {
        record.validate()?;
        let previous = self.lookup(&record.domain).await?;

        self.stage(&record, previous.as_ref()).await?;
        let outcome = self.sync.activate(&record.domain).await;

        tracing::info!(domain = %record.domain, synced = outcome.is_synced(), "Site created");
        Ok(SiteChange {
            site: record,
            outcome,
        })
    }

    /// Replace the record stored under `old_domain` with `record`.
    ///
    /// When the domain changes, the old record and its OS artifacts are
    /// removed and the old site is disabled before the new one is enabled.
    pub async fn update(&self, old_domain: &str, record: SiteRecord) -> Result<SiteChange, ServiceError> {
        let result = self.update_inner(old_domain, record).await;
        observe("update", &result);
        result
    }

    async fn update_inner(&self, old_domain: &str, record: SiteRecord) -> Result<SiteChange, ServiceError> {
        validate_domain(old_domain)?;
        record.validate()?;
        let previous = self.store.get(old_domain).await?;

        if record.domain == old_domain {
            self.stage(&record, Some(&previous)).await?;
            let outcome = self.sync.activate(&record.domain).await;
            tracing::info!(domain = %record.domain, synced = outcome.is_synced(), "Site updated");
            return Ok(SiteChange {
                site: record,
                outcome,
            });
        }

        if self.store.contains(&record.domain).await? {
            return Err(SyncError::Collision {
                domain: record.domain.clone(),
                existing: "an existing site record".to_string(),
            }
            .into());
        }
        self.sync.ensure_unclaimed(&record.domain).await?;

        self.stage(&record, None).await?;
        if let Err(e) = self.forget(old_domain).await {
            // Keep the old record authoritative rather than end up with two.
            if let Err(rollback) = self.store.remove(&record.domain).await {
                tracing::error!(domain = %record.domain, error = %rollback, "Failed to roll back renamed site record");
            }
            self.sync.discard_config(&record.domain).await;
            return Err(ServiceError::Persistence(e));
        }

        let outcome = self.sync.switch(old_domain, &record.domain).await;
        tracing::info!(
            old_domain = %old_domain,
            domain = %record.domain,
            synced = outcome.is_synced(),
            "Site renamed"
        );
        Ok(SiteChange {
            site: record,
            outcome,
        })
    }

    /// Take a site offline and remove its record.
    ///
    /// The web server is updated first; its failures are reported as warnings
    /// and never keep the record alive.
    pub async fn delete(&self, domain: &str) -> Result<SiteChange, ServiceError> {
        let result = self.delete_inner(domain).await;
        observe("delete", &result);
        result
    }

    async fn delete_inner(&self, domain: &str) -> Result<SiteChange, ServiceError> {
        validate_domain(domain)?;
        let site = self.store.get(domain).await?;

        let outcome = self.sync.remove(domain).await;
        self.forget(domain).await.map_err(ServiceError::Persistence)?;

        tracing::info!(domain = %domain, synced = outcome.is_synced(), "Site deleted");
        Ok(SiteChange { site, outcome })
    }

    /// Re-apply a stored site to the web server. This is the retry path after
    /// a warning.
    pub async fn resync(&self, domain: &str) -> Result<SiteChange, ServiceError> {
        let result = async {
            validate_domain(domain)?;
            let site = self.store.get(domain).await?;
            let outcome = self.sync.apply(&site).await?;
            tracing::info!(domain = %domain, synced = outcome.is_synced(), "Site re-synced");
            Ok(SiteChange { site, outcome })
        }
        .await;
        observe("resync", &result);
        result
    }

    /// Compare a stored site with what is on disk.
    pub async fn status(&self, domain: &str) -> Result<SiteStatus, ServiceError> {
        validate_domain(domain)?;
        let site = self.store.get(domain).await?;
        let artifacts = self.sync.inspect(&site).await?;
        let drift = artifacts.drift();
        if !drift.is_empty() {
            tracing::warn!(domain = %domain, drift = ?drift, "Site is out of sync with the web server");
        }
        Ok(SiteStatus {
            site,
            artifacts,
            drift,
        })
    }

    pub async fn test_config(&self) -> Result<CommandOutput, CommandError> {
        self.sync.test().await
    }

    pub async fn reload(&self) -> Result<CommandOutput, CommandError> {
        self.sync.reload().await
    }

    /// The record currently stored for `domain`, if any. An unreadable record
    /// counts as absent so that a create can overwrite it.
    async fn lookup(&self, domain: &str) -> Result<Option<SiteRecord>, ServiceError> {
        match self.store.get(domain).await {
            Ok(site) => Ok(Some(site)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(StoreError::Corrupt { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "Overwriting unreadable site file");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the config, then the record. If the record cannot be stored,
    /// put the config back the way it was.
    async fn stage(&self, record: &SiteRecord, previous: Option<&SiteRecord>) -> Result<(), ServiceError> {
        self.sync.write_config(record).await?;

        if let Err(e) = self.store.put(record).await {
            tracing::error!(domain = %record.domain, error = %e, "Failed to store site record");
            match previous {
                Some(previous) => {
                    if let Err(restore) = self.sync.write_config(previous).await {
                        tracing::error!(domain = %record.domain, error = %restore, "Failed to restore previous site config");
                    }
                }
                None => self.sync.discard_config(&record.domain).await,
            }
            return Err(ServiceError::Persistence(e));
        }
        Ok(())
    }

    /// Remove a record, treating a concurrent removal as done.
    async fn forget(&self, domain: &str) -> Result<(), StoreError> {
        match self.store.remove(domain).await {
            Ok(()) | Err(StoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

fn observe(op: &'static str, result: &Result<SiteChange, ServiceError>) {
    let outcome = match result {
        Ok(change) if change.is_synced() => "synced",
        Ok(_) => "degraded",
        Err(e) => {
            tracing::warn!(op = op, kind = e.kind(), error = %e, "Site operation failed");
            "failed"
        }
    };
    metrics::record_operation(op, outcome);
}
