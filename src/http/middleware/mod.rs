//! Route middleware catalog.
//!
//! Each constructor returns a named `Middleware` that annotations attach to
//! a single endpoint. They run in registration order, before the handler.

pub mod auth;
pub mod cors;
pub mod no_cache;

pub use auth::{required_role, required_scopes, valid_jwt_needed};
pub use cors::{cors, CorsPolicy};
pub use no_cache::no_cache;
