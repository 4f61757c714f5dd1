//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     Controller::register (annotations.rs)
//!     → registry.rs (register_controller / endpoint / middleware / argument)
//!     → resolver.rs (binding names from declared parameter names)
//!     → model.rs (RouteTable accumulates in declaration order)
//!
//! Compile step (once):
//!     registry.compile_routes(sink)
//!     → compiler.rs (CompiledHandler per endpoint)
//!     → RouteSink::install (axum Router, middleware layered in order)
//!
//! Per request:
//!     router match → endpoint middleware → CompiledHandler::dispatch
//!     → bind arguments → target function → status + JSON
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Registration never panics or propagates; failures are logged
//! - A failing route is skipped without affecting the others

pub mod annotations;
pub mod compiler;
pub mod error;
pub mod handler;
pub mod model;
pub mod registry;
pub mod resolver;

pub use annotations::{Controller, ControllerAnnotations, MethodAnnotations, BEARER_AUTH};
pub use compiler::{AxumRouteSink, CompiledHandler, CompiledRoute, RouteSink};
pub use error::{CompileError, RegistryError};
pub use handler::{Arguments, Middleware, TargetFn};
pub use model::{BindingSource, ControllerId, HttpMethod, StatusSpec};
pub use registry::{EndpointFields, RouteRegistry, RouteSummary};
pub use resolver::{ResolveError, Signature};
