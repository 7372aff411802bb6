//! Durable keyed persistence for site records.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

use crate::atomic_file::{remove_if_exists, write_atomic};
use crate::site::record::{validate_domain, SiteRecord, ValidationError};

/// Errors returned by a [`SiteStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("site {0} not found")]
    NotFound(String),

    #[error("invalid site key {key:?}: {source}")]
    InvalidKey {
        key: String,
        source: ValidationError,
    },

    #[error("invalid site {domain}: {source}")]
    Invalid {
        domain: String,
        source: ValidationError,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("corrupt site file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to encode site {domain}: {source}")]
    Encode {
        domain: String,
        source: serde_json::Error,
    },
}

/// Keyed storage of [`SiteRecord`]s, one independent unit per domain.
///
/// Implementations must make `put`, `remove` and `get` atomic per key and must
/// not serialize calls for different domains. Same-domain calls race
/// last-write-wins.
#[async_trait]
pub trait SiteStore: Send + Sync {
    /// All stored records, ordered by domain.
    async fn list(&self) -> Result<Vec<SiteRecord>, StoreError>;

    async fn get(&self, domain: &str) -> Result<SiteRecord, StoreError>;

    /// Create or overwrite the record keyed by `record.domain`. Records that
    /// fail [`SiteRecord::validate`] are refused, so a stored record always
    /// reads back unchanged.
    async fn put(&self, record: &SiteRecord) -> Result<(), StoreError>;

    async fn remove(&self, domain: &str) -> Result<(), StoreError>;

    async fn contains(&self, domain: &str) -> Result<bool, StoreError> {
        match self.get(domain).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// A [`SiteStore`] keeping one pretty-printed `<domain>.json` per record.
#[derive(Debug, Clone)]
pub struct FsSiteStore {
    dir: PathBuf,
}

impl FsSiteStore {
    /// Open the store, creating its directory if needed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, domain: &str) -> Result<PathBuf, StoreError> {
        validate_domain(domain).map_err(|source| StoreError::InvalidKey {
            key: domain.to_string(),
            source,
        })?;
        Ok(self.dir.join(format!("{}.json", domain)))
    }

    async fn read_record(path: &Path) -> Result<SiteRecord, StoreError> {
        let data = fs::read_to_string(path).await.map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[async_trait]
impl SiteStore for FsSiteStore {
    async fn list(&self) -> Result<Vec<SiteRecord>, StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.dir.clone(),
            source,
        };

        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut sites = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            let is_hidden = entry.file_name().to_string_lossy().starts_with('.');
            if !is_json || is_hidden {
                continue;
            }

            let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned());
            match Self::read_record(&path).await {
                Ok(site) if stem.as_deref() == Some(site.domain.as_str()) => sites.push(site),
                Ok(site) => {
                    tracing::warn!(
                        path = %path.display(),
                        domain = %site.domain,
                        "Skipping site file whose name does not match its domain"
                    );
                }
                Err(StoreError::Corrupt { path, source }) => {
                    tracing::warn!(path = %path.display(), error = %source, "Skipping unreadable site file");
                }
                Err(e) => return Err(e),
            }
        }

        sites.sort_by(|a, b| a.domain.cmp(&b.domain));
        Ok(sites)
    }

    async fn get(&self, domain: &str) -> Result<SiteRecord, StoreError> {
        let path = self.path_for(domain)?;
        match Self::read_record(&path).await {
            Err(StoreError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(domain.to_string()))
            }
            other => other,
        }
    }

    async fn put(&self, record: &SiteRecord) -> Result<(), StoreError> {
        let path = self.path_for(&record.domain)?;
        record.validate().map_err(|source| StoreError::Invalid {
            domain: record.domain.clone(),
            source,
        })?;
        let body = serde_json::to_vec_pretty(record).map_err(|source| StoreError::Encode {
            domain: record.domain.clone(),
            source,
        })?;

        write_atomic(&path, &body)
            .await
            .map_err(|source| StoreError::Io { path, source })?;

        tracing::debug!(domain = %record.domain, "Site record stored");
        Ok(())
    }

    async fn remove(&self, domain: &str) -> Result<(), StoreError> {
        let path = self.path_for(domain)?;
        match remove_if_exists(&path).await {
            Ok(true) => {
                tracing::debug!(domain = %domain, "Site record removed");
                Ok(())
            }
            Ok(false) => Err(StoreError::NotFound(domain.to_string())),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn temp_store() -> (tempfile::TempDir, FsSiteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsSiteStore::open(dir.path().join("sites")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_then_get_returns_same_record() {
        let (_dir, store) = temp_store().await;
        let record = SiteRecord::new_proxy("api.example.com", "http://127.0.0.1:5000")
            .with_alias("www.api.example.com")
            .with_ssl(true);

        store.put(&record).await.unwrap();
        assert_eq!(store.get("api.example.com").await.unwrap(), record);
        assert!(store.dir().join("api.example.com.json").exists());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (_dir, store) = temp_store().await;
        store.put(&SiteRecord::new_static("example.com", "/srv/a")).await.unwrap();
        store
            .put(&SiteRecord::new_static("example.com", "/srv/b").with_port(8080))
            .await
            .unwrap();

        let sites = store.list().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].port, 8080);
    }

    #[tokio::test]
    async fn test_missing_keys_are_not_found() {
        let (_dir, store) = temp_store().await;

        assert!(matches!(store.get("nope.com").await, Err(StoreError::NotFound(_))));
        assert!(matches!(store.remove("nope.com").await, Err(StoreError::NotFound(_))));
        assert!(!store.contains("nope.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_key_cannot_escape_directory() {
        let (_dir, store) = temp_store().await;
        assert!(matches!(
            store.get("../secrets").await,
            Err(StoreError::InvalidKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_sorted_and_skips_foreign_files() {
        let (_dir, store) = temp_store().await;
        store.put(&SiteRecord::new_static("b.com", "/srv/b")).await.unwrap();
        store.put(&SiteRecord::new_static("a.com", "/srv/a")).await.unwrap();
        std::fs::write(store.dir().join("broken.json"), "{not json").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "hello").unwrap();

        let domains: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.domain)
            .collect();
        assert_eq!(domains, vec!["a.com", "b.com"]);
    }

    #[tokio::test]
    async fn test_list_skips_record_filed_under_another_name() {
        let (_dir, store) = temp_store().await;
        store.put(&SiteRecord::new_static("a.com", "/srv/a")).await.unwrap();
        std::fs::copy(store.dir().join("a.com.json"), store.dir().join("copy.com.json")).unwrap();

        let sites = store.list().await.unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].domain, "a.com");
    }

    #[tokio::test]
    async fn test_put_refuses_record_that_would_not_read_back() {
        let (_dir, store) = temp_store().await;
        let padded = SiteRecord::new_static("example.com", "/srv/www ").with_alias(" www.example.com");

        assert!(matches!(
            store.put(&padded).await,
            Err(StoreError::Invalid { .. })
        ));
        assert!(!store.dir().join("example.com.json").exists());

        let record = SiteRecord::new_static("example.com", "/srv/www").with_alias("www.example.com");
        store.put(&record).await.unwrap();
        assert_eq!(store.get("example.com").await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_concurrent_puts_on_distinct_domains() {
        let (_dir, store) = temp_store().await;
        let writes = (0..16).map(|i| {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .put(&SiteRecord::new_static(format!("site{}.test", i), "/srv"))
                    .await
            })
        });

        for handle in writes {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(store.list().await.unwrap().len(), 16);
    }
}
