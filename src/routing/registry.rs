//! Metadata registry.
//!
//! # Responsibilities
//! - Accumulate controller, endpoint, middleware and argument declarations
//!   issued in any order
//! - Merge partial endpoint metadata without clobbering earlier fields
//! - Compile the finished table into routes on a `RouteSink`
//!
//! # Design Decisions
//! - One explicit registry per application, created at startup and passed
//!   around (no global instance)
//! - Registration is serialized behind a mutex; create-if-absent never
//!   duplicates a controller or endpoint
//! - Every operation reports `bool` and logs its error; nothing propagates
//!   to the declaring code
//! - The first `compile_routes` seals the registry against further mutation

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;

use crate::routing::annotations::{Controller, ControllerAnnotations};
use crate::routing::compiler::{CompiledHandler, CompiledRoute, RouteSink};
use crate::routing::error::{CompileError, RegistryError};
use crate::routing::handler::{Middleware, TargetFn};
use crate::routing::model::{
    endpoint_path, join_paths, normalize_path, BindingSource, ControllerId, EndpointEntry,
    HttpMethod, ParameterEntry, RouteTable, StatusSpec,
};
use crate::routing::resolver::{resolve_parameter_name, ResolveError, Signature};

/// Optional endpoint fields contributed by one declaration.
///
/// `None` leaves whatever an earlier declaration set.
#[derive(Debug, Clone, Default)]
pub struct EndpointFields {
    pub path: Option<String>,
    pub http_method: Option<HttpMethod>,
    pub success_status: Option<StatusSpec>,
    pub success_description: Option<String>,
    pub target: Option<TargetFn>,
}

impl EndpointFields {
    pub fn route(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            http_method: Some(method),
            ..Self::default()
        }
    }

    pub fn success(status: impl Into<StatusSpec>, description: Option<String>) -> Self {
        Self {
            success_status: Some(status.into()),
            success_description: description,
            ..Self::default()
        }
    }

    pub fn target(target: TargetFn) -> Self {
        Self {
            target: Some(target),
            ..Self::default()
        }
    }
}

/// Flattened view of one endpoint, for listings.
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub controller: String,
    pub method_name: String,
    pub http_method: Option<HttpMethod>,
    pub path: String,
    pub success_status: String,
    pub success_description: String,
    pub middleware: Vec<String>,
    pub parameters: Vec<ParameterEntry>,
}

#[derive(Default)]
struct RegistryState {
    table: RouteTable,
    sealed: bool,
}

/// Process-wide store of route metadata.
#[derive(Default)]
pub struct RouteRegistry {
    state: Mutex<RegistryState>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let a controller declare its routes against this registry.
    pub fn mount<C: Controller>(&self, controller: Arc<C>) {
        let annotations = ControllerAnnotations::new(self, ControllerId::of::<C>());
        controller.register(annotations);
    }

    /// Create the controller entry if absent; (re)set its base path if given.
    pub fn register_controller(&self, controller: &ControllerId, base_path: Option<&str>) -> bool {
        report(self.try_register_controller(controller, base_path), controller, None)
    }

    /// Create controller and endpoint entries if absent, then merge `fields`.
    pub fn register_endpoint(
        &self,
        controller: &ControllerId,
        method_name: &str,
        fields: EndpointFields,
    ) -> bool {
        report(
            self.try_register_endpoint(controller, method_name, fields),
            controller,
            Some(method_name),
        )
    }

    /// Append middleware to an existing endpoint.
    pub fn register_middleware(
        &self,
        controller: &ControllerId,
        method_name: &str,
        middleware: Middleware,
    ) -> bool {
        report(
            self.try_register_middleware(controller, method_name, middleware),
            controller,
            Some(method_name),
        )
    }

    /// Bind the target function's parameter at `index` to a request source.
    ///
    /// Without `explicit_name` the binding name is the declared parameter name.
    pub fn register_argument(
        &self,
        controller: &ControllerId,
        method_name: &str,
        explicit_name: Option<&str>,
        index: usize,
        source: BindingSource,
    ) -> bool {
        report(
            self.try_register_argument(controller, method_name, explicit_name, index, source),
            controller,
            Some(method_name),
        )
    }

    /// Install every endpoint with a verb on `sink`, controllers and endpoints
    /// in registration order.
    ///
    /// A route that fails to build or install is logged and skipped; the rest
    /// still install. Returns `true` only if nothing failed.
    pub fn compile_routes<S: RouteSink>(&self, sink: &mut S) -> bool {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "Route compilation aborted");
                return false;
            }
        };
        state.sealed = true;

        let mut ok = true;
        for controller in &state.table.controllers {
            tracing::info!(controller = %controller.identity, "Building routes for controller");
            for endpoint in &controller.endpoints {
                let Some(method) = endpoint.http_method else {
                    tracing::debug!(
                        controller = %controller.identity,
                        endpoint = %endpoint.method_name,
                        "Endpoint has no HTTP method; skipped"
                    );
                    continue;
                };
                let path = join_paths(&controller.base_path, &endpoint.path);

                let installed = catch_unwind(AssertUnwindSafe(|| {
                    CompiledHandler::compile(endpoint, &path).and_then(|handler| {
                        sink.install(CompiledRoute {
                            method,
                            path: path.clone(),
                            middleware: endpoint.middleware.clone(),
                            handler: Arc::new(handler),
                        })
                    })
                }))
                .unwrap_or_else(|_| {
                    Err(CompileError::RouterRejected {
                        method,
                        path: path.clone(),
                    })
                });

                match installed {
                    Ok(()) => tracing::info!(
                        method = %method,
                        path = %path,
                        endpoint = %endpoint.method_name,
                        middleware = endpoint.middleware.len(),
                        "Route created"
                    ),
                    Err(e) => {
                        ok = false;
                        tracing::error!(
                            controller = %controller.identity,
                            endpoint = %endpoint.method_name,
                            method = %method,
                            path = %path,
                            error = %e,
                            "Failed to compile route"
                        );
                    }
                }
            }
        }
        ok
    }

    /// Whether `compile_routes` has run.
    pub fn is_sealed(&self) -> bool {
        self.lock().map(|s| s.sealed).unwrap_or(true)
    }

    /// Copy of one endpoint's metadata.
    pub fn endpoint(&self, controller: &ControllerId, method_name: &str) -> Option<EndpointEntry> {
        let state = self.lock().ok()?;
        state
            .table
            .controller(controller)
            .and_then(|c| c.endpoint(method_name))
            .cloned()
    }

    /// Base path of a controller, if it is known.
    pub fn base_path(&self, controller: &ControllerId) -> Option<String> {
        let state = self.lock().ok()?;
        state.table.controller(controller).map(|c| c.base_path.clone())
    }

    /// Flattened listing of every endpoint in registration order.
    pub fn snapshot(&self) -> Vec<RouteSummary> {
        let Ok(state) = self.lock() else {
            return Vec::new();
        };
        state
            .table
            .controllers
            .iter()
            .flat_map(|c| {
                c.endpoints.iter().map(move |e| RouteSummary {
                    controller: c.identity.to_string(),
                    method_name: e.method_name.clone(),
                    http_method: e.http_method,
                    path: join_paths(&c.base_path, &e.path),
                    success_status: e.success_status.to_string(),
                    success_description: e.success_description.clone(),
                    middleware: e.middleware.iter().map(|m| m.name().to_string()).collect(),
                    parameters: e.parameters.clone(),
                })
            })
            .collect()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, RegistryError> {
        self.state.lock().map_err(|_| RegistryError::Poisoned)
    }

    fn lock_unsealed(&self) -> Result<MutexGuard<'_, RegistryState>, RegistryError> {
        let state = self.lock()?;
        if state.sealed {
            return Err(RegistryError::Sealed);
        }
        Ok(state)
    }

    fn try_register_controller(
        &self,
        controller: &ControllerId,
        base_path: Option<&str>,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock_unsealed()?;
        let entry = state.table.controller_or_insert(controller);
        if let Some(base) = base_path {
            entry.base_path = normalize_path(base);
        }
        Ok(())
    }

    fn try_register_endpoint(
        &self,
        controller: &ControllerId,
        method_name: &str,
        fields: EndpointFields,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock_unsealed()?;
        let endpoint = state
            .table
            .controller_or_insert(controller)
            .endpoint_or_insert(method_name);

        if let Some(path) = fields.path {
            endpoint.path = endpoint_path(&path);
        }
        if let Some(method) = fields.http_method {
            endpoint.http_method = Some(method);
        }
        if let Some(status) = fields.success_status {
            endpoint.success_status = status;
        }
        if let Some(description) = fields.success_description {
            endpoint.success_description = description;
        }
        if let Some(target) = fields.target {
            endpoint.target = Some(target);
        }
        Ok(())
    }

    fn try_register_middleware(
        &self,
        controller: &ControllerId,
        method_name: &str,
        middleware: Middleware,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock_unsealed()?;
        let endpoint = find_endpoint(&mut state.table, controller, method_name)?;
        endpoint.middleware.push(middleware);
        Ok(())
    }

    fn try_register_argument(
        &self,
        controller: &ControllerId,
        method_name: &str,
        explicit_name: Option<&str>,
        index: usize,
        source: BindingSource,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock_unsealed()?;
        let endpoint = find_endpoint(&mut state.table, controller, method_name)?;

        if endpoint.parameter(index).is_some() {
            return Err(RegistryError::DuplicateParameter {
                controller: controller.clone(),
                method: method_name.to_string(),
                index,
            });
        }

        // An explicit name does not lift the bound set by a parsed signature.
        if let Some(len) = endpoint
            .target
            .as_ref()
            .and_then(TargetFn::signature)
            .and_then(Signature::declared_len)
        {
            if index >= len {
                return Err(RegistryError::UnresolvedArgument {
                    controller: controller.clone(),
                    method: method_name.to_string(),
                    index,
                    source: ResolveError::IndexOutOfRange { index, len },
                });
            }
        }

        let binding_name = match explicit_name {
            Some(name) => name.to_string(),
            None => {
                let resolved = match &endpoint.target {
                    Some(target) => resolve_parameter_name(target, index),
                    None => Err(ResolveError::MissingSignature(method_name.to_string())),
                };
                resolved.map_err(|source| RegistryError::UnresolvedArgument {
                    controller: controller.clone(),
                    method: method_name.to_string(),
                    index,
                    source,
                })?
            }
        };

        endpoint.parameters.push(ParameterEntry {
            index,
            source,
            binding_name,
        });
        endpoint.parameters.sort_by_key(|p| p.index);
        Ok(())
    }
}

fn find_endpoint<'t>(
    table: &'t mut RouteTable,
    controller: &ControllerId,
    method_name: &str,
) -> Result<&'t mut EndpointEntry, RegistryError> {
    table
        .controller_mut(controller)
        .ok_or_else(|| RegistryError::UnknownController(controller.clone()))?
        .endpoint_mut(method_name)
        .ok_or_else(|| RegistryError::UnknownEndpoint {
            controller: controller.clone(),
            method: method_name.to_string(),
        })
}

fn report(result: Result<(), RegistryError>, controller: &ControllerId, method: Option<&str>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(
                controller = %controller,
                endpoint = method.unwrap_or("-"),
                error = %e,
                "Route registration failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::compiler::{CompiledRoute, RouteSink};
    use crate::routing::handler::Arguments;

    fn target(name: &'static str, params: &[&str]) -> TargetFn {
        TargetFn::new(name, |_args: Arguments| async {
            Ok::<_, crate::http::response::DispatchError>("ok")
        })
        .with_signature(Signature::from_names(params.iter().copied()))
    }

    fn noop(name: &'static str) -> Middleware {
        Middleware::from_fn(name, |req, next: axum::middleware::Next| async move {
            next.run(req).await
        })
    }

    #[derive(Default)]
    struct RecordingSink {
        installed: Vec<(HttpMethod, String, Vec<String>)>,
        reject: Option<String>,
    }

    impl RouteSink for RecordingSink {
        fn install(&mut self, route: CompiledRoute) -> Result<(), CompileError> {
            if self.reject.as_deref() == Some(route.path.as_str()) {
                return Err(CompileError::RouterRejected {
                    method: route.method,
                    path: route.path,
                });
            }
            let names = route.middleware.iter().map(|m| m.name().to_string()).collect();
            self.installed.push((route.method, route.path, names));
            Ok(())
        }
    }

    #[test]
    fn test_merge_in_any_order() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");

        // Verb and success annotations before the controller route is known.
        assert!(registry.register_endpoint(&id, "get_echo", EndpointFields::success("201", None)));
        assert!(registry.register_endpoint(
            &id,
            "get_echo",
            EndpointFields::route(HttpMethod::Get, "echo/{echo}")
        ));
        assert!(registry.register_endpoint(&id, "get_echo", EndpointFields::default()));
        assert!(registry.register_controller(&id, Some("api")));
        assert!(registry.register_controller(&id, None));
        assert!(registry.register_endpoint(
            &id,
            "get_echo",
            EndpointFields::success(StatusSpec::Code(201), Some("Created".into()))
        ));

        let endpoint = registry.endpoint(&id, "get_echo").unwrap();
        assert_eq!(endpoint.http_method, Some(HttpMethod::Get));
        assert_eq!(endpoint.path, "/echo/:echo");
        assert_eq!(endpoint.success_status, StatusSpec::Code(201));
        assert_eq!(endpoint.success_description, "Created");
        assert_eq!(registry.base_path(&id).as_deref(), Some("/api"));
        assert_eq!(registry.snapshot().len(), 1);
    }

    #[test]
    fn test_duplicate_parameter_index_is_rejected() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_endpoint(&id, "get_ping", EndpointFields::target(target("get_ping", &["pong"])));

        assert!(registry.register_argument(&id, "get_ping", None, 0, BindingSource::Query));
        assert!(!registry.register_argument(&id, "get_ping", Some("other"), 0, BindingSource::Path));

        let endpoint = registry.endpoint(&id, "get_ping").unwrap();
        assert_eq!(
            endpoint.parameters,
            vec![ParameterEntry {
                index: 0,
                source: BindingSource::Query,
                binding_name: "pong".into(),
            }]
        );
    }

    #[test]
    fn test_argument_names() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_endpoint(
            &id,
            "get_ping",
            EndpointFields::target(target("get_ping", &["pong_message", "extra"])),
        );

        assert!(registry.register_argument(&id, "get_ping", Some("pong"), 0, BindingSource::Query));
        assert!(registry.register_argument(&id, "get_ping", None, 1, BindingSource::Query));
        // Out of range for the declared signature.
        assert!(!registry.register_argument(&id, "get_ping", None, 5, BindingSource::Query));

        let params = registry.endpoint(&id, "get_ping").unwrap().parameters;
        assert_eq!(params[0].binding_name, "pong");
        assert_eq!(params[1].binding_name, "extra");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_explicit_name_cannot_exceed_signature() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_controller(&id, Some("api"));

        registry.register_endpoint(&id, "one", EndpointFields::target(target("one", &["only"])));
        registry.register_endpoint(&id, "one", EndpointFields::route(HttpMethod::Get, "one"));
        assert!(!registry.register_argument(&id, "one", Some("q"), 7, BindingSource::Query));
        assert!(!registry.register_argument(&id, "one", Some("q"), usize::MAX, BindingSource::Query));
        assert!(registry.register_argument(&id, "one", Some("q"), 0, BindingSource::Query));

        registry.register_endpoint(&id, "two", EndpointFields::target(target("two", &[])));
        registry.register_endpoint(&id, "two", EndpointFields::route(HttpMethod::Get, "two"));

        let params = registry.endpoint(&id, "one").unwrap().parameters;
        assert_eq!(params.len(), 1);
        assert_eq!(params[0].index, 0);

        let mut sink = RecordingSink::default();
        assert!(registry.compile_routes(&mut sink));
        let paths: Vec<_> = sink.installed.iter().map(|(_, p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/api/one", "/api/two"]);
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_missing_references_fail() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");

        assert!(!registry.register_middleware(&id, "nope", noop("m")));
        assert!(!registry.register_argument(&id, "nope", Some("x"), 0, BindingSource::Path));

        registry.register_controller(&id, None);
        assert!(!registry.register_middleware(&id, "nope", noop("m")));
        assert!(registry.endpoint(&id, "nope").is_none());
    }

    #[test]
    fn test_compile_in_order_and_skip_metadata_only() {
        let registry = RouteRegistry::new();
        let a = ControllerId::new("A");
        let b = ControllerId::new("B");

        registry.register_controller(&a, Some("/"));
        registry.register_endpoint(&a, "ping", EndpointFields::target(target("ping", &[])));
        registry.register_endpoint(&a, "ping", EndpointFields::route(HttpMethod::Get, "ping"));
        registry.register_middleware(&a, "ping", noop("m1"));
        registry.register_middleware(&a, "ping", noop("m2"));
        registry.register_endpoint(&a, "docs_only", EndpointFields::success(200, None));

        registry.register_controller(&b, Some("/api"));
        registry.register_endpoint(&b, "echo", EndpointFields::target(target("echo", &["echo"])));
        registry.register_endpoint(&b, "echo", EndpointFields::route(HttpMethod::Post, "/echo/{echo}"));

        let mut sink = RecordingSink::default();
        assert!(registry.compile_routes(&mut sink));
        assert_eq!(
            sink.installed,
            vec![
                (HttpMethod::Get, "/ping".to_string(), vec!["m1".to_string(), "m2".to_string()]),
                (HttpMethod::Post, "/api/echo/:echo".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_compile_failure_is_isolated() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_controller(&id, Some("api"));

        // No target function: building this handler fails.
        registry.register_endpoint(&id, "a", EndpointFields::route(HttpMethod::Get, "a"));
        registry.register_endpoint(&id, "b", EndpointFields::target(target("b", &[])));
        registry.register_endpoint(&id, "b", EndpointFields::route(HttpMethod::Get, "b"));
        registry.register_endpoint(&id, "c", EndpointFields::target(target("c", &[])));
        registry.register_endpoint(&id, "c", EndpointFields::route(HttpMethod::Get, "c"));
        registry.register_endpoint(&id, "d", EndpointFields::target(target("d", &[])));
        registry.register_endpoint(&id, "d", EndpointFields::route(HttpMethod::Get, "d"));

        let mut sink = RecordingSink {
            reject: Some("/api/c".into()),
            ..Default::default()
        };
        assert!(!registry.compile_routes(&mut sink));
        let paths: Vec<_> = sink.installed.iter().map(|(_, p, _)| p.as_str()).collect();
        assert_eq!(paths, vec!["/api/b", "/api/d"]);
    }

    struct PanickingSink {
        installed: Vec<String>,
    }

    impl RouteSink for PanickingSink {
        fn install(&mut self, route: CompiledRoute) -> Result<(), CompileError> {
            if route.path == "/api/a" {
                panic!("router blew up");
            }
            self.installed.push(route.path);
            Ok(())
        }
    }

    #[test]
    fn test_panicking_route_is_isolated() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_controller(&id, Some("api"));
        for name in ["a", "b"] {
            registry.register_endpoint(&id, name, EndpointFields::target(target(name, &[])));
            registry.register_endpoint(&id, name, EndpointFields::route(HttpMethod::Get, name));
        }

        let mut sink = PanickingSink { installed: vec![] };
        assert!(!registry.compile_routes(&mut sink));
        assert_eq!(sink.installed, vec!["/api/b"]);
        // The lock survives.
        assert_eq!(registry.snapshot().len(), 2);
    }

    #[test]
    fn test_sealed_after_compile() {
        let registry = RouteRegistry::new();
        let id = ControllerId::new("Service");
        registry.register_controller(&id, Some("api"));

        let mut sink = RecordingSink::default();
        assert!(registry.compile_routes(&mut sink));
        assert!(registry.is_sealed());

        assert!(!registry.register_controller(&id, Some("other")));
        assert!(!registry.register_endpoint(&id, "late", EndpointFields::default()));
        assert_eq!(registry.base_path(&id).as_deref(), Some("/api"));

        // Compiling again only reads.
        assert!(registry.compile_routes(&mut RecordingSink::default()));
    }
}
