//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! vhost-manager.toml (absent → defaults)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ManagerConfig (validated, immutable)
//!     → lifecycle::startup builds the runtime from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → new runtime swapped in via ArcSwap
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    ApacheConfig, ApiConfig, ListenerConfig, ManagerConfig, ObservabilityConfig, ScannerConfig,
    StoreConfig,
};
pub use watcher::ConfigWatcher;
