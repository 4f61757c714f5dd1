//! Route table model.
//!
//! # Responsibilities
//! - Hold controller, endpoint and parameter metadata as plain data
//! - Normalize base and endpoint paths
//! - Rewrite `{param}` placeholders to the table's `:param` form
//!
//! # Design Decisions
//! - Controllers and endpoints are kept in `Vec`s to preserve declaration order
//! - Lookups are linear; route tables are small and built once at startup
//! - Entries carry no behavior beyond field access and merging

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::routing::MethodFilter;
use serde::Serialize;

use crate::routing::handler::{Middleware, TargetFn};

/// Stable identity of a controller type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControllerId(Cow<'static, str>);

impl ControllerId {
    /// Identity derived from the controller's type name.
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self(Cow::Borrowed(std::any::type_name::<C>()))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// HTTP verbs an endpoint can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub(crate) fn filter(&self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
            HttpMethod::Put => MethodFilter::PUT,
            HttpMethod::Patch => MethodFilter::PATCH,
            HttpMethod::Delete => MethodFilter::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the request an argument is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingSource {
    Path,
    Query,
    Body,
}

impl fmt::Display for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingSource::Path => "path",
            BindingSource::Query => "query",
            BindingSource::Body => "body",
        })
    }
}

/// Success status as declared, either numeric or textual (`"201"`).
///
/// Kept unparsed until routes are compiled so a bad declaration fails only
/// its own route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSpec {
    Code(u16),
    Text(String),
}

impl StatusSpec {
    pub fn resolve(&self) -> Option<StatusCode> {
        match self {
            StatusSpec::Code(code) => StatusCode::from_u16(*code).ok(),
            StatusSpec::Text(text) => text
                .trim()
                .parse::<u16>()
                .ok()
                .and_then(|code| StatusCode::from_u16(code).ok()),
        }
    }
}

impl Default for StatusSpec {
    fn default() -> Self {
        StatusSpec::Code(200)
    }
}

impl From<u16> for StatusSpec {
    fn from(code: u16) -> Self {
        StatusSpec::Code(code)
    }
}

impl From<&str> for StatusSpec {
    fn from(text: &str) -> Self {
        StatusSpec::Text(text.to_string())
    }
}

impl From<StatusCode> for StatusSpec {
    fn from(status: StatusCode) -> Self {
        StatusSpec::Code(status.as_u16())
    }
}

impl fmt::Display for StatusSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSpec::Code(code) => write!(f, "{}", code),
            StatusSpec::Text(text) => f.write_str(text),
        }
    }
}

/// One bound argument of an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterEntry {
    /// Zero-based position in the target function's parameter list.
    pub index: usize,
    pub source: BindingSource,
    /// Request field the value is read from (ignored for body bindings).
    pub binding_name: String,
}

/// Metadata for a single business method.
#[derive(Debug, Clone)]
pub struct EndpointEntry {
    pub method_name: String,
    pub http_method: Option<HttpMethod>,
    /// Endpoint-relative path using `:param` placeholders.
    pub path: String,
    pub success_status: StatusSpec,
    pub success_description: String,
    /// At most one entry per index.
    pub parameters: Vec<ParameterEntry>,
    /// Executed in order, ahead of the handler.
    pub middleware: Vec<Middleware>,
    pub target: Option<TargetFn>,
}

impl EndpointEntry {
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            http_method: None,
            path: String::new(),
            success_status: StatusSpec::default(),
            success_description: "OK".to_string(),
            parameters: Vec::new(),
            middleware: Vec::new(),
            target: None,
        }
    }

    pub fn parameter(&self, index: usize) -> Option<&ParameterEntry> {
        self.parameters.iter().find(|p| p.index == index)
    }
}

/// Metadata for a controller and its endpoints.
#[derive(Debug, Clone)]
pub struct ControllerEntry {
    pub identity: ControllerId,
    pub base_path: String,
    pub endpoints: Vec<EndpointEntry>,
}

impl ControllerEntry {
    pub fn new(identity: ControllerId) -> Self {
        Self {
            identity,
            base_path: String::new(),
            endpoints: Vec::new(),
        }
    }

    pub fn endpoint(&self, method_name: &str) -> Option<&EndpointEntry> {
        self.endpoints.iter().find(|e| e.method_name == method_name)
    }

    pub fn endpoint_mut(&mut self, method_name: &str) -> Option<&mut EndpointEntry> {
        self.endpoints.iter_mut().find(|e| e.method_name == method_name)
    }

    /// Find the endpoint or append a fresh one.
    pub fn endpoint_or_insert(&mut self, method_name: &str) -> &mut EndpointEntry {
        match self.endpoints.iter().position(|e| e.method_name == method_name) {
            Some(pos) => &mut self.endpoints[pos],
            None => {
                self.endpoints.push(EndpointEntry::new(method_name));
                let last = self.endpoints.len() - 1;
                &mut self.endpoints[last]
            }
        }
    }
}

/// All controllers in registration order.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub controllers: Vec<ControllerEntry>,
}

impl RouteTable {
    pub fn controller(&self, identity: &ControllerId) -> Option<&ControllerEntry> {
        self.controllers.iter().find(|c| &c.identity == identity)
    }

    pub fn controller_mut(&mut self, identity: &ControllerId) -> Option<&mut ControllerEntry> {
        self.controllers.iter_mut().find(|c| &c.identity == identity)
    }

    /// Find the controller or append a fresh one. Never duplicates an identity.
    pub fn controller_or_insert(&mut self, identity: &ControllerId) -> &mut ControllerEntry {
        match self.controllers.iter().position(|c| &c.identity == identity) {
            Some(pos) => &mut self.controllers[pos],
            None => {
                self.controllers.push(ControllerEntry::new(identity.clone()));
                let last = self.controllers.len() - 1;
                &mut self.controllers[last]
            }
        }
    }
}

/// Collapse repeated separators, force a leading `/` and drop a trailing one.
///
/// An empty input stays empty so a controller without a base path adds nothing.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return if path.is_empty() { String::new() } else { "/".to_string() };
    }
    let mut out = String::with_capacity(path.len() + 1);
    for segment in segments {
        out.push('/');
        out.push_str(segment);
    }
    out
}

/// Join a controller base path and an endpoint path into a full route.
pub fn join_paths(base: &str, path: &str) -> String {
    let joined = normalize_path(&format!("{}/{}", base, path));
    if joined.is_empty() {
        "/".to_string()
    } else {
        joined
    }
}

/// Rewrite `{name}` placeholders to `:name`.
pub fn rewrite_placeholders(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for n in chars.by_ref() {
            if n == '}' {
                closed = true;
                break;
            }
            name.push(n);
        }
        if closed {
            out.push(':');
            out.push_str(name.trim());
        } else {
            // Unterminated: keep the text so the router rejects it later.
            out.push('{');
            out.push_str(&name);
        }
    }
    out
}

/// Endpoint path as stored in the table.
pub fn endpoint_path(path: &str) -> String {
    normalize_path(&rewrite_placeholders(path))
}
