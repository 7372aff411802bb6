//! Apache virtual host manager library

pub mod atomic_file;
pub mod site;
pub mod apache;
pub mod service;
pub mod config;
pub mod net;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ManagerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use service::{ServiceError, SiteChange, SiteService};
pub use site::{SiteKind, SiteRecord};
