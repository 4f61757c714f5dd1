//! Dispatch compiler.
//!
//! # Responsibilities
//! - Turn an `EndpointEntry` into a `CompiledHandler`
//! - Bind positional arguments from path, query and body
//! - Invoke the target function and write status + JSON
//! - Install compiled routes on a router through `RouteSink`
//!
//! # Design Decisions
//! - Everything that can be checked (target present, valid status, arity)
//!   is checked at compile time, not per request
//! - Absent or empty path/query values leave the argument slot unset
//! - Failures are logged and forwarded to the error pipeline; no error body
//!   is written here
//! - Middleware runs in registration order, ahead of the handler

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::{from_fn, Next},
    response::{IntoResponse, Response},
    routing::{on, MethodRouter},
    Json, Router,
};
use serde_json::Value;

use crate::http::request::RequestContext;
use crate::observability::metrics;
use crate::routing::error::CompileError;
use crate::routing::handler::{Arguments, Middleware, TargetFn};
use crate::routing::model::{BindingSource, EndpointEntry, HttpMethod, ParameterEntry};

/// Most positional arguments a target may take. Bounds the per-request
/// argument buffer for targets registered without a signature.
pub const MAX_ARITY: usize = 64;

/// Request handler synthesized for one endpoint.
#[derive(Debug, Clone)]
pub struct CompiledHandler {
    route: String,
    target: TargetFn,
    status: StatusCode,
    parameters: Vec<ParameterEntry>,
    arity: usize,
    reads_body: bool,
}

impl CompiledHandler {
    /// Build the handler for `endpoint`, mounted at `route`.
    pub fn compile(endpoint: &EndpointEntry, route: &str) -> Result<Self, CompileError> {
        let target = endpoint
            .target
            .clone()
            .ok_or_else(|| CompileError::MissingTarget(endpoint.method_name.clone()))?;
        let status = endpoint
            .success_status
            .resolve()
            .ok_or_else(|| CompileError::InvalidStatus {
                endpoint: endpoint.method_name.clone(),
                status: endpoint.success_status.to_string(),
            })?;

        let mut parameters = endpoint.parameters.clone();
        parameters.sort_by_key(|p| p.index);
        let arity = match parameters.last() {
            Some(last) => last
                .index
                .checked_add(1)
                .filter(|arity| *arity <= MAX_ARITY)
                .ok_or_else(|| CompileError::ArityOverflow {
                    endpoint: endpoint.method_name.clone(),
                    index: last.index,
                })?,
            None => 0,
        };
        let reads_body = parameters.iter().any(|p| p.source == BindingSource::Body);

        Ok(Self {
            route: route.to_string(),
            target,
            status,
            parameters,
            arity,
            reads_body,
        })
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn target(&self) -> &TargetFn {
        &self.target
    }

    /// Assemble the positional arguments for one request.
    pub fn bind_arguments(&self, ctx: &RequestContext) -> Arguments {
        let mut args = Arguments::with_arity(self.arity);
        for param in &self.parameters {
            let value = match param.source {
                BindingSource::Path => non_empty(ctx.path(&param.binding_name)),
                BindingSource::Query => non_empty(ctx.query(&param.binding_name)),
                BindingSource::Body => ctx.body().cloned(),
            };
            if let Some(value) = value {
                args.set(param.index, value);
            }
        }
        args
    }

    /// Handle one request end to end.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let method = request.method().to_string();

        let result = match RequestContext::from_request(request, self.reads_body).await {
            Ok(ctx) => self.target.call(self.bind_arguments(&ctx)).await,
            Err(e) => Err(e),
        };

        let response = match result {
            Ok(value) => (self.status, Json(value)).into_response(),
            Err(e) => {
                tracing::error!(
                    function = %self.target.name(),
                    route = %self.route,
                    error = %e,
                    "Route handler reported error"
                );
                e.into_response()
            }
        };

        metrics::record_dispatch(&method, &self.route, response.status().as_u16(), start);
        response
    }
}

fn non_empty(value: Option<&str>) -> Option<Value> {
    value
        .filter(|v| !v.is_empty())
        .map(|v| Value::String(v.to_string()))
}

/// A fully built route, ready for installation.
#[derive(Debug, Clone)]
pub struct CompiledRoute {
    pub method: HttpMethod,
    /// Full path with `:param` placeholders.
    pub path: String,
    pub middleware: Vec<Middleware>,
    pub handler: Arc<CompiledHandler>,
}

/// Router boundary used by `RouteRegistry::compile_routes`.
pub trait RouteSink {
    fn install(&mut self, route: CompiledRoute) -> Result<(), CompileError>;
}

/// Installs compiled routes on an `axum::Router`.
#[derive(Default)]
pub struct AxumRouteSink {
    router: Router,
    installed: HashSet<(HttpMethod, String)>,
    /// Parameter-name-free path shape -> path first installed with it.
    shapes: HashMap<String, String>,
}

impl AxumRouteSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

impl RouteSink for AxumRouteSink {
    fn install(&mut self, route: CompiledRoute) -> Result<(), CompileError> {
        let axum_path = to_axum_path(&route.path)?;
        let shape = path_shape(&axum_path);

        if self.installed.contains(&(route.method, axum_path.clone())) {
            return Err(CompileError::Conflict {
                method: route.method,
                path: route.path,
                existing: "an identical route".to_string(),
            });
        }
        if let Some(existing) = self.shapes.get(&shape) {
            if existing != &axum_path {
                return Err(CompileError::Conflict {
                    method: route.method,
                    path: route.path,
                    existing: existing.clone(),
                });
            }
        }

        let handler = route.handler.clone();
        let mut method_router: MethodRouter = on(route.method.filter(), move |request: Request<Body>| {
            let handler = handler.clone();
            async move { handler.dispatch(request).await }
        });
        // The last layer added runs first.
        for middleware in route.middleware.iter().rev() {
            let middleware = middleware.clone();
            method_router = method_router.layer(from_fn(move |req: Request<Body>, next: Next| {
                middleware.call(req, next)
            }));
        }

        let candidate = self.router.clone();
        let path = axum_path.clone();
        match catch_unwind(AssertUnwindSafe(move || candidate.route(&path, method_router))) {
            Ok(router) => self.router = router,
            Err(_) => {
                return Err(CompileError::RouterRejected {
                    method: route.method,
                    path: route.path,
                })
            }
        }

        self.shapes.insert(shape, axum_path.clone());
        self.installed.insert((route.method, axum_path));
        Ok(())
    }
}

/// `/a/:x` -> `/a/{x}`, validating what axum would otherwise panic on.
fn to_axum_path(path: &str) -> Result<String, CompileError> {
    let invalid = |reason| CompileError::InvalidPath {
        path: path.to_string(),
        reason,
    };
    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.contains('{') || path.contains('}') {
        return Err(invalid("unterminated or raw placeholder"));
    }

    let mut out = String::with_capacity(path.len() + 4);
    for (i, segment) in path.split('/').enumerate() {
        if i > 0 {
            out.push('/');
        }
        match segment.strip_prefix(':') {
            Some("") => return Err(invalid("empty parameter name")),
            Some(name) if name.contains(':') => return Err(invalid("malformed parameter")),
            Some(name) => {
                out.push('{');
                out.push_str(name);
                out.push('}');
            }
            None if segment.contains(':') => return Err(invalid("parameter must span a segment")),
            None => out.push_str(segment),
        }
    }
    Ok(out)
}

fn path_shape(axum_path: &str) -> String {
    axum_path
        .split('/')
        .map(|s| if s.starts_with('{') { "{}" } else { s })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::{error_pipeline, DispatchError, ForwardedError};
    use crate::routing::model::StatusSpec;
    use serde_json::json;
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn echo_args() -> TargetFn {
        TargetFn::new("echo_args", |args: Arguments| async move {
            Ok::<_, DispatchError>(args.into_values())
        })
    }

    fn entry(target: TargetFn, params: Vec<(usize, BindingSource, &str)>) -> EndpointEntry {
        let mut entry = EndpointEntry::new(target.name().to_string());
        entry.http_method = Some(HttpMethod::Get);
        entry.target = Some(target);
        entry.parameters = params
            .into_iter()
            .map(|(index, source, name)| ParameterEntry {
                index,
                source,
                binding_name: name.to_string(),
            })
            .collect();
        entry
    }

    fn ctx(path: &[(&str, &str)], query: &[(&str, &str)], body: Option<Value>) -> RequestContext {
        let map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        RequestContext::new(map(path), map(query), body)
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_binding_order() {
        // Declared out of order on purpose.
        let endpoint = entry(
            echo_args(),
            vec![(1, BindingSource::Query, "pong"), (0, BindingSource::Path, "echo")],
        );
        let handler = CompiledHandler::compile(&endpoint, "/api/echo/:echo").unwrap();

        let args = handler.bind_arguments(&ctx(&[("echo", "hi")], &[("pong", "yo")], None));
        assert_eq!(args.into_values(), vec![Some(json!("hi")), Some(json!("yo"))]);
    }

    #[test]
    fn test_missing_and_empty_values_stay_unset() {
        let endpoint = entry(
            echo_args(),
            vec![(0, BindingSource::Query, "pong"), (2, BindingSource::Path, "id")],
        );
        let handler = CompiledHandler::compile(&endpoint, "/x").unwrap();

        let args = handler.bind_arguments(&ctx(&[("id", "")], &[], None));
        assert_eq!(args.into_values(), vec![None, None, None]);
    }

    #[test]
    fn test_body_binding_takes_whole_body() {
        let endpoint = entry(echo_args(), vec![(0, BindingSource::Body, "anything")]);
        let handler = CompiledHandler::compile(&endpoint, "/x").unwrap();
        let body = json!({"anything": 1, "other": [1, 2]});

        let args = handler.bind_arguments(&ctx(&[], &[], Some(body.clone())));
        assert_eq!(args.get(0), Some(&body));
    }

    #[test]
    fn test_compile_validation() {
        let mut endpoint = entry(echo_args(), vec![]);
        endpoint.success_status = StatusSpec::from("two hundred");
        assert!(matches!(
            CompiledHandler::compile(&endpoint, "/x"),
            Err(CompileError::InvalidStatus { .. })
        ));

        endpoint.success_status = StatusSpec::from("201");
        assert_eq!(CompiledHandler::compile(&endpoint, "/x").unwrap().status(), StatusCode::CREATED);

        endpoint.target = None;
        assert!(matches!(
            CompiledHandler::compile(&endpoint, "/x"),
            Err(CompileError::MissingTarget(_))
        ));
    }

    #[test]
    fn test_arity_overflow_is_a_compile_error() {
        let endpoint = entry(echo_args(), vec![(usize::MAX, BindingSource::Query, "q")]);
        assert!(matches!(
            CompiledHandler::compile(&endpoint, "/x"),
            Err(CompileError::ArityOverflow { index: usize::MAX, .. })
        ));

        let endpoint = entry(echo_args(), vec![(MAX_ARITY, BindingSource::Query, "q")]);
        assert!(matches!(
            CompiledHandler::compile(&endpoint, "/x"),
            Err(CompileError::ArityOverflow { index: MAX_ARITY, .. })
        ));

        let endpoint = entry(echo_args(), vec![(MAX_ARITY - 1, BindingSource::Query, "q")]);
        assert!(CompiledHandler::compile(&endpoint, "/x").is_ok());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_forwarded() {
        let target = TargetFn::new("explode", |_args: Arguments| async {
            Err::<(), _>(DispatchError::BadRequest("nope".into()))
        });
        let handler = CompiledHandler::compile(&entry(target, vec![]), "/x").unwrap();

        let response = handler
            .dispatch(Request::builder().uri("/x").body(Body::empty()).unwrap())
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.extensions().get::<ForwardedError>().is_some());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_to_axum_path() {
        assert_eq!(to_axum_path("/api/echo/:echo").unwrap(), "/api/echo/{echo}");
        assert_eq!(to_axum_path("/").unwrap(), "/");
        assert!(to_axum_path("api").is_err());
        assert!(to_axum_path("/a/:").is_err());
        assert!(to_axum_path("/a/{x").is_err());
        assert!(to_axum_path("/a/b:c").is_err());
    }

    fn route(method: HttpMethod, path: &str, target: TargetFn, middleware: Vec<Middleware>) -> CompiledRoute {
        let endpoint = entry(target, vec![(0, BindingSource::Path, "echo")]);
        CompiledRoute {
            method,
            path: path.to_string(),
            middleware,
            handler: Arc::new(CompiledHandler::compile(&endpoint, path).unwrap()),
        }
    }

    #[test]
    fn test_sink_rejects_conflicts() {
        let mut sink = AxumRouteSink::new();
        sink.install(route(HttpMethod::Get, "/e/:echo", echo_args(), vec![])).unwrap();
        // Same path, other verb: fine.
        sink.install(route(HttpMethod::Post, "/e/:echo", echo_args(), vec![])).unwrap();

        assert!(matches!(
            sink.install(route(HttpMethod::Get, "/e/:echo", echo_args(), vec![])),
            Err(CompileError::Conflict { .. })
        ));
        assert!(matches!(
            sink.install(route(HttpMethod::Put, "/e/:other", echo_args(), vec![])),
            Err(CompileError::Conflict { .. })
        ));
        assert!(matches!(
            sink.install(route(HttpMethod::Get, "relative", echo_args(), vec![])),
            Err(CompileError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order_before_handler() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let recorder = |name: &'static str| {
            let log = log.clone();
            Middleware::from_fn(name, move |req: Request<Body>, next: Next| {
                log.lock().unwrap().push(name);
                async move { next.run(req).await }
            })
        };
        let handler_log = log.clone();
        let target = TargetFn::new("get_echo", move |args: Arguments| {
            handler_log.lock().unwrap().push("handler");
            async move { Ok::<_, DispatchError>(args.string(0)) }
        });

        let mut sink = AxumRouteSink::new();
        sink.install(route(
            HttpMethod::Get,
            "/api/echo/:echo",
            target,
            vec![recorder("m1"), recorder("m2")],
        ))
        .unwrap();
        let app = sink.into_router().layer(from_fn(error_pipeline));

        let response = app
            .oneshot(Request::builder().uri("/api/echo/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!("hello"));
        assert_eq!(*log.lock().unwrap(), vec!["m1", "m2", "handler"]);
    }
}
