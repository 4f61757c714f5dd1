//! Request handling.
//!
//! # Responsibilities
//! - Attach a request ID (`x-request-id`, UUID v4) and echo it on the response
//! - Turn an incoming request into a typed `RequestContext`
//!   (path parameters, query parameters, JSON body)
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The body is only read when an endpoint binds it
//! - An empty body is "no body", not a parse error

use std::collections::HashMap;

use axum::{
    body::Body,
    extract::{rejection::RawPathParamsRejection, FromRequestParts, Query, RawPathParams},
    http::{HeaderName, Request},
};
use serde_json::Value;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

use crate::http::response::DispatchError;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Layer that assigns a request ID when the client sent none.
pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid)
}

/// Layer that copies the request ID onto the response.
pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(X_REQUEST_ID)
}

/// Typed view of the parts of a request that arguments bind to.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    path: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Option<Value>,
}

impl RequestContext {
    pub fn new(
        path: HashMap<String, String>,
        query: HashMap<String, String>,
        body: Option<Value>,
    ) -> Self {
        Self { path, query, body }
    }

    /// Extract path and query parameters, and the JSON body if `read_body`.
    pub async fn from_request(request: Request<Body>, read_body: bool) -> Result<Self, DispatchError> {
        let (mut parts, body) = request.into_parts();

        let path = match RawPathParams::from_request_parts(&mut parts, &()).await {
            Ok(params) => params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Err(RawPathParamsRejection::MissingPathParams(_)) => HashMap::new(),
            Err(e) => return Err(DispatchError::BadRequest(e.body_text())),
        };

        let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q)
            .map_err(|e| DispatchError::BadRequest(e.body_text()))?;

        let body = if read_body {
            // Size is bounded by the body limit layer.
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|e| DispatchError::Body(e.to_string()))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                None
            } else {
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| DispatchError::Body(format!("invalid JSON: {}", e)))?;
                Some(value)
            }
        } else {
            None
        };

        Ok(Self { path, query, body })
    }

    pub fn path(&self, name: &str) -> Option<&str> {
        self.path.get(name).map(String::as_str)
    }

    pub fn query(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    /// The whole parsed body.
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}
