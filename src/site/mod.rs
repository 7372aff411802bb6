//! Site records and their durable store.
//!
//! # Data Flow
//! ```text
//! API JSON / <domain>.json
//!     → record.rs (SiteDraft → validated SiteRecord)
//!     → store.rs (one file per domain, atomic replace)
//! ```
//!
//! # Design Decisions
//! - `SiteKind` is a tagged variant; a record cannot carry both a document
//!   root and a proxy target
//! - The domain is the only identity; renames are delete + create
//! - No store-wide lock; same-domain writes are last-write-wins

pub mod record;
pub mod store;

pub use record::{SiteDraft, SiteKind, SiteKindTag, SiteRecord, ValidationError, DEFAULT_PORT};
pub use store::{FsSiteStore, SiteStore, StoreError};
