//! Metadata-driven HTTP route registry.
//!
//! Controllers declare their routes through annotations; the registry
//! records them as metadata and compiles the table into an Axum router.

// Core subsystems
pub mod config;
pub mod controllers;
pub mod http;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{Controller, RouteRegistry};
