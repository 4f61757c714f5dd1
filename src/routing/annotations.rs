//! Declarative route annotations.
//!
//! A controller describes its routes through a builder instead of attribute
//! side effects. Each builder call is one annotation and forwards to exactly
//! one registry operation; failures are logged by the registry and the chain
//! continues.
//!
//! ```text
//! registry.mount(Arc::new(ServiceController))
//!     → Controller::register(annotations)
//!         .route("api")                     → register_controller
//!         .method(target)                   → register_endpoint (target)
//!             .get("echo/{echo}")           → register_endpoint (verb, path)
//!             .success_response(200, "OK")  → register_endpoint (status)
//!             .no_cache()                   → register_middleware
//!             .path(0, None)                → register_argument
//! ```

use std::sync::Arc;

use crate::http::middleware::{self, CorsPolicy};
use crate::routing::handler::{Middleware, TargetFn};
use crate::routing::model::{BindingSource, ControllerId, HttpMethod, StatusSpec};
use crate::routing::registry::{EndpointFields, RouteRegistry};

/// Security scheme handled by `MethodAnnotations::security`.
pub const BEARER_AUTH: &str = "BearerAuth";

/// A type that declares its routes to a registry.
pub trait Controller: Send + Sync + 'static {
    fn register(self: Arc<Self>, annotations: ControllerAnnotations<'_>);
}

/// Class-level annotations for one controller.
pub struct ControllerAnnotations<'r> {
    registry: &'r RouteRegistry,
    controller: ControllerId,
}

impl<'r> ControllerAnnotations<'r> {
    pub fn new(registry: &'r RouteRegistry, controller: ControllerId) -> Self {
        registry.register_controller(&controller, None);
        Self {
            registry,
            controller,
        }
    }

    pub fn id(&self) -> &ControllerId {
        &self.controller
    }

    /// Base route of the controller; an empty path means top level.
    pub fn route(self, path: &str) -> Self {
        self.registry
            .register_controller(&self.controller, Some(&format!("/{}", path)));
        self
    }

    /// Start annotating the method implemented by `target`.
    pub fn method(&self, target: TargetFn) -> MethodAnnotations<'_> {
        let method = target.name().to_string();
        self.registry
            .register_endpoint(&self.controller, &method, EndpointFields::target(target));
        MethodAnnotations {
            registry: self.registry,
            controller: &self.controller,
            method,
        }
    }
}

/// Method- and parameter-level annotations for one endpoint.
pub struct MethodAnnotations<'a> {
    registry: &'a RouteRegistry,
    controller: &'a ControllerId,
    method: String,
}

impl<'a> MethodAnnotations<'a> {
    pub fn get(self, path: &str) -> Self {
        self.verb(HttpMethod::Get, path)
    }

    pub fn post(self, path: &str) -> Self {
        self.verb(HttpMethod::Post, path)
    }

    pub fn put(self, path: &str) -> Self {
        self.verb(HttpMethod::Put, path)
    }

    pub fn patch(self, path: &str) -> Self {
        self.verb(HttpMethod::Patch, path)
    }

    pub fn delete(self, path: &str) -> Self {
        self.verb(HttpMethod::Delete, path)
    }

    /// Status and description written on success.
    pub fn success_response(self, status: impl Into<StatusSpec>, description: &str) -> Self {
        self.merge(EndpointFields::success(status, Some(description.to_string())))
    }

    /// Documents an alternative response. Has no effect on routing.
    pub fn response(self, status: impl Into<StatusSpec>, description: &str) -> Self {
        let status: StatusSpec = status.into();
        tracing::trace!(
            endpoint = %self.method,
            status = %status,
            description,
            "Response annotation is informational"
        );
        self
    }

    /// Require a security scheme. `BearerAuth` adds token validation followed
    /// by a scope check; other schemes are ignored.
    pub fn security(self, scheme: &str, scopes: &[&str]) -> Self {
        if scheme != BEARER_AUTH {
            tracing::debug!(endpoint = %self.method, scheme, "Unsupported security scheme ignored");
            return self;
        }
        let scopes: Vec<String> = scopes.iter().map(|s| s.to_string()).collect();
        self.middleware(middleware::valid_jwt_needed())
            .middleware(middleware::required_scopes(scopes))
    }

    pub fn no_cache(self) -> Self {
        self.middleware(middleware::no_cache())
    }

    pub fn cors(self, policy: CorsPolicy) -> Self {
        self.middleware(middleware::cors(policy))
    }

    /// Append arbitrary middleware; runs after any added before it.
    pub fn middleware(self, middleware: Middleware) -> Self {
        self.ensure_endpoint();
        self.registry
            .register_middleware(self.controller, &self.method, middleware);
        self
    }

    /// Bind parameter `index` from the path; `name` defaults to the declared name.
    pub fn path(self, index: usize, name: Option<&str>) -> Self {
        self.argument(index, name, BindingSource::Path)
    }

    /// Bind parameter `index` from the query string.
    pub fn query(self, index: usize, name: Option<&str>) -> Self {
        self.argument(index, name, BindingSource::Query)
    }

    /// Bind parameter `index` to the whole request body.
    pub fn body(self, index: usize, name: Option<&str>) -> Self {
        self.argument(index, name, BindingSource::Body)
    }

    fn verb(self, method: HttpMethod, path: &str) -> Self {
        self.merge(EndpointFields::route(method, format!("/{}", path)))
    }

    fn argument(self, index: usize, name: Option<&str>, source: BindingSource) -> Self {
        self.ensure_endpoint();
        self.registry
            .register_argument(self.controller, &self.method, name, index, source);
        self
    }

    fn merge(self, fields: EndpointFields) -> Self {
        self.registry
            .register_endpoint(self.controller, &self.method, fields);
        self
    }

    fn ensure_endpoint(&self) {
        self.registry
            .register_endpoint(self.controller, &self.method, EndpointFields::default());
    }
}
