//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Every sync step logs its outcome with the domain as a field
//! - Warnings (site saved, OS out of sync) log at WARN, aborts at ERROR

pub mod logging;
pub mod metrics;
