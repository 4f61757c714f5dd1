//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, global middleware)
//!     → request.rs (request ID, typed RequestContext)
//!     → middleware/ (per-route auth, caching, CORS)
//!     → [compiled handler from routing]
//!     → response.rs (error pipeline renders failures)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestContext, X_REQUEST_ID};
pub use response::{error_pipeline, DispatchError, ForwardedError};
pub use server::HttpServer;
