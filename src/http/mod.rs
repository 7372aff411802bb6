//! HTTP API subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace)
//!     → auth.rs (bearer token, when configured)
//!     → handlers.rs (JSON in, SiteService call)
//!     → response.rs (success body or { error } with status)
//!     → Send to client
//! ```

pub mod auth;
pub mod handlers;
pub mod response;
pub mod server;

pub use response::{ApiError, MutationResponse};
pub use server::{build_router, AppState, HttpServer};
