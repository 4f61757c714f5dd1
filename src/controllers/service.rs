//! Service and debug endpoints under `/api`.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::controllers::health::{run_checks, CheckReport, HealthCheck, HealthStatus};
use crate::http::middleware::{self, CorsPolicy};
use crate::http::response::DispatchError;
use crate::routing::{Arguments, Controller, ControllerAnnotations, TargetFn, BEARER_AUTH};
use crate::signature;

/// Health report returned by `GET /api/health`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    /// "Running" unless a check is red.
    pub status: &'static str,
    pub health: HealthStatus,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub checks: Vec<CheckReport>,
}

/// Business logic behind `ServiceController`.
pub struct ServiceEndpoints {
    started: Instant,
    checks: Vec<Arc<dyn HealthCheck>>,
}

impl ServiceEndpoints {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            checks: Vec::new(),
        }
    }

    /// Add a check to the health report.
    pub fn with_check<C: HealthCheck + 'static>(mut self, check: C) -> Self {
        self.checks.push(Arc::new(check));
        self
    }

    pub fn get_echo(&self, text: String) -> String {
        text
    }

    pub fn get_ping(&self, pong: Option<String>) -> Option<String> {
        pong
    }

    pub fn echo_body(&self, body: Option<Value>) -> Value {
        body.unwrap_or(Value::Null)
    }

    pub async fn health(&self) -> Health {
        let (health, checks) = run_checks(&self.checks).await;
        Health {
            status: if health == HealthStatus::Red {
                "Unhealthy"
            } else {
                "Running"
            },
            health,
            version: env!("CARGO_PKG_VERSION"),
            uptime_secs: self.started.elapsed().as_secs(),
            checks,
        }
    }
}

impl std::fmt::Debug for ServiceEndpoints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.checks.iter().map(|c| c.name()).collect();
        f.debug_struct("ServiceEndpoints")
            .field("started", &self.started)
            .field("checks", &names)
            .finish()
    }
}

impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct ServiceController {
    endpoints: ServiceEndpoints,
}

impl ServiceController {
    pub fn new(endpoints: ServiceEndpoints) -> Self {
        Self { endpoints }
    }

    fn target<F, T>(self: &Arc<Self>, name: &'static str, f: F) -> TargetFn
    where
        F: Fn(&ServiceEndpoints, Arguments) -> Result<T, DispatchError> + Send + Sync + 'static,
        T: Serialize + Send + 'static,
    {
        let this = Arc::clone(self);
        let f = Arc::new(f);
        TargetFn::new(name, move |args: Arguments| {
            let this = this.clone();
            let f = f.clone();
            async move { f(&this.endpoints, args) }
        })
    }
}

impl Controller for ServiceController {
    fn register(self: Arc<Self>, annotations: ControllerAnnotations<'_>) {
        let api = annotations.route("api");

        let get_echo = self
            .target("get_echo", |endpoints, args| {
                let text = args
                    .string(0)
                    .ok_or_else(|| DispatchError::BadRequest("echo is required".into()))?;
                Ok(endpoints.get_echo(text))
            })
            .with_signature(signature!(fn get_echo(&self, echo: String) -> String));
        api.method(get_echo)
            .get("echo/{echo}")
            .success_response("200", "OK")
            .response(422, "Validation Failed")
            .no_cache()
            .cors(CorsPolicy::deny())
            .path(0, None);

        let get_ping = self
            .target("get_ping", |endpoints, args| Ok(endpoints.get_ping(args.string(0))))
            .with_signature(signature!(fn get_ping(&self, pong_message: Option<String>)));
        api.method(get_ping)
            .get("ping")
            .success_response("200", "OK")
            .no_cache()
            .cors(CorsPolicy::deny())
            .query(0, Some("pong"));

        let echo_body = self
            .target("echo_body", |endpoints, args| {
                Ok(endpoints.echo_body(args.get(0).cloned()))
            })
            .with_signature(signature!(fn echo_body(&self, body_object: Value) -> Value));
        api.method(echo_body)
            .post("echo-body")
            .success_response("201", "Created")
            .no_cache()
            .cors(CorsPolicy::deny())
            .body(0, None);

        let this = Arc::clone(&self);
        let health = TargetFn::new("health", move |_args: Arguments| {
            let this = this.clone();
            async move { Ok::<_, DispatchError>(this.endpoints.health().await) }
        })
        .with_signature(signature!(async fn health(&self) -> Health));
        api.method(health).get("health").success_response(200, "OK").no_cache();

        // Same logic as ping, restricted to authenticated callers.
        let ping_secure = self
            .target("ping_secure", |endpoints, args| Ok(endpoints.get_ping(args.string(0))))
            .with_signature(signature!(fn ping_secure(&self, pong_message: Option<String>)));
        api.method(ping_secure)
            .get("ping-secure")
            .success_response("200", "OK")
            .no_cache()
            .cors(CorsPolicy::deny())
            .security(BEARER_AUTH, &[])
            .middleware(middleware::required_role("public"))
            .query(0, Some("pong"));
    }
}
