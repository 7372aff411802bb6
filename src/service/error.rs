//! Error taxonomy surfaced to callers of the site service.

use thiserror::Error;

use crate::apache::SyncError;
use crate::site::{StoreError, ValidationError};

/// Why a site operation failed. Partial OS-side failures are not errors; they
/// ride along on a successful [`SiteChange`](super::SiteChange) as warnings.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A required field is missing or contradicts the site kind.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("site {0} not found")]
    NotFound(String),

    /// The store could not be written; nothing downstream ran.
    #[error("persistence failed: {0}")]
    Persistence(#[source] StoreError),

    /// The config could not be written (or the target is taken); the store
    /// was not touched.
    #[error("sync failed: {0}")]
    SyncFailure(#[from] SyncError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(domain) => ServiceError::NotFound(domain),
            StoreError::InvalidKey { source, .. } => ServiceError::Validation(source),
            StoreError::Invalid { source, .. } => ServiceError::Validation(source),
            other => ServiceError::Persistence(other),
        }
    }
}

impl ServiceError {
    /// Short machine-readable kind, used for metrics labels and API bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "validation",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Persistence(_) => "persistence",
            ServiceError::SyncFailure(SyncError::Collision { .. }) => "collision",
            ServiceError::SyncFailure(_) => "sync_failure",
        }
    }
}
