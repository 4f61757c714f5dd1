//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Compile the route registry into an Axum Router
//! - Wire up global middleware (request ID, tracing, timeout, security
//!   headers, compression, body limit, error pipeline)
//! - Provide the token verifier to route middleware
//! - Bind server to listener and drain on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, extract::Extension, http::Request, middleware::from_fn, Router};
use tokio::net::TcpListener;
use tower_http::{
    compression::CompressionLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, X_REQUEST_ID};
use crate::http::response::error_pipeline;
use crate::lifecycle::ShutdownSignal;
use crate::routing::{AxumRouteSink, RouteRegistry};
use crate::security::{headers, TokenVerifier};

/// HTTP server for the compiled route table.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Compile `registry` and wrap it in the global middleware stack.
    ///
    /// Routes that fail to compile are logged and left out; the rest serve.
    pub fn new(config: ServerConfig, registry: &RouteRegistry) -> Self {
        let mut sink = AxumRouteSink::new();
        if !registry.compile_routes(&mut sink) {
            tracing::warn!("Some routes failed to compile and will not be served");
        }
        let router = Self::build_router(&config, sink.into_router());
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers are added innermost first.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, routes: Router) -> Router {
        let mut router = routes
            .layer(from_fn(error_pipeline))
            .layer(RequestBodyLimitLayer::new(config.security.max_body_size))
            .layer(CompressionLayer::new().gzip(true));

        match config.security.jwt_secret.as_deref() {
            Some(secret) => {
                let verifier = Arc::new(TokenVerifier::hs256(secret.as_bytes()));
                router = router.layer(Extension(verifier));
            }
            None => tracing::debug!("No JWT secret configured, secured routes will reject"),
        }

        if config.security.enable_headers {
            router = headers::apply(router);
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(set_request_id_layer())
    }

    /// The fully layered router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server on `listener` until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
