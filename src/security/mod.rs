//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (security headers on every response)
//!     → route middleware (http::middleware::auth)
//!         → auth.rs (verify bearer token, expose claims)
//!     → Pass to the compiled handler
//! ```
//!
//! # Design Decisions
//! - Fail closed: a route that requires a token rejects when no verifier
//!   is configured
//! - No trust in client input

pub mod auth;
pub mod headers;

pub use auth::{AuthError, Claims, TokenVerifier};
