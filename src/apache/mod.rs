//! Apache integration subsystem.
//!
//! # Data Flow
//! ```text
//! SiteRecord
//!     → render.rs (pure: record → <VirtualHost> text)
//!     → sync.rs (write <available>/<domain>.conf)
//!     → control.rs (enable-site, reload-server via external commands)
//!     → SyncOutcome (Synced | Degraded(warnings)) or SyncError
//! ```
//!
//! # Design Decisions
//! - Only render/write failures are fatal; command failures become warnings
//! - Every command runs under a timeout
//! - The command surface is a trait so tests can script failures

pub mod control;
pub mod render;
pub mod sync;

pub use control::{ApacheControl, CommandControl, CommandError, CommandOutput, CommandTemplates};
pub use render::{render, render_with, TlsLayout};
pub use sync::{
    conf_file_name, ApacheLayout, ApacheSync, ArtifactStatus, SyncError, SyncOutcome, SyncResult,
    SyncStep, SyncWarning,
};
