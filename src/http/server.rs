//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, timeout, request ID, auth)
//! - Serve until the shutdown future resolves

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::auth::api_auth_middleware;
use crate::http::handlers::*;
use crate::lifecycle::Runtime;

/// Application state injected into handlers.
///
/// Handlers load the current runtime once per request, so a hot reload never
/// changes the service halfway through an operation.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<Runtime>>,
}

impl AppState {
    pub fn new(runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(runtime)),
        }
    }

    pub fn runtime(&self) -> Arc<Runtime> {
        self.inner.load_full()
    }

    pub fn swap(&self, runtime: Runtime) {
        self.inner.store(Arc::new(runtime));
    }
}

/// HTTP server for the management API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let request_timeout =
            Duration::from_secs(state.runtime().config.api.request_timeout_secs);
        Self {
            router: build_router(state, request_timeout),
        }
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let api = Router::new()
        .route("/sites", get(list_sites).post(create_site))
        .route(
            "/sites/{domain}",
            get(get_site).put(update_site).delete(delete_site),
        )
        .route("/sites/{domain}/sync", post(resync_site))
        .route("/sites/{domain}/status", get(site_status))
        .route("/apache/test", get(apache_test))
        .route("/apache/reload", post(apache_reload))
        .route("/services/active", get(active_services))
        .route("/status", get(get_status))
        .layer(middleware::from_fn_with_state(state.clone(), api_auth_middleware));

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(request_timeout)),
        )
}
