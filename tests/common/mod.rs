//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{body::Body, http::Request, response::Response, Router};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use route_registry::config::ServerConfig;
use route_registry::controllers::ServiceController;
use route_registry::lifecycle::Shutdown;
use route_registry::security::Claims;
use route_registry::{HttpServer, RouteRegistry};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret";

pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.security.jwt_secret = Some(SECRET.into());
    config
}

/// Registry with the service controller mounted.
pub fn service_registry() -> RouteRegistry {
    let registry = RouteRegistry::new();
    registry.mount(Arc::new(ServiceController::default()));
    registry
}

pub fn service_app() -> Router {
    HttpServer::new(test_config(), &service_registry()).router()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

/// Sign `claims` with the test secret, expiring a minute from now.
pub fn mint_token(mut claims: Claims) -> String {
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64;
    claims.stamp.get_or_insert(now + 60_000);
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Serve `registry` on an ephemeral port. Trigger the returned `Shutdown` to
/// stop; the handle finishes once the server has drained.
pub async fn spawn_server(registry: RouteRegistry) -> (SocketAddr, Shutdown, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(test_config(), &registry);
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    let handle = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });
    (addr, shutdown, handle)
}
