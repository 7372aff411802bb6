//! Site service subsystem.
//!
//! # Responsibilities
//! - Validate a submitted record before anything is touched
//! - Order store writes against web server writes so a failure never leaves
//!   an active config without a record
//! - Turn partial web server failures into warnings on a successful result
//!
//! # Data Flow
//! ```text
//! create / update
//!     → validate
//!     → ApacheSync::write_config (fatal on failure, store untouched)
//!     → SiteStore::put (fatal on failure, config rolled back)
//!     → ApacheSync::activate / switch (warnings only)
//!
//! delete
//!     → ApacheSync::remove (warnings only)
//!     → SiteStore::remove
//! ```

pub mod error;
pub mod sites;

pub use error::ServiceError;
pub use sites::{SiteChange, SiteService, SiteStatus};
