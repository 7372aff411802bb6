//! Network helpers.
//!
//! # Data Flow
//! ```text
//! ScannerConfig (host, ports, timeout)
//!     → scanner.rs (concurrent TCP connect probes)
//!     → Vec<ActiveService> for the API
//! ```
//!
//! # Design Decisions
//! - A probe is a bare TCP connect; no protocol is spoken
//! - The scanner is read-only and never feeds the site service directly

pub mod scanner;

pub use scanner::{ActiveService, PortScanner};
