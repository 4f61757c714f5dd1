//! Response handling and the centralized error pipeline.
//!
//! # Responsibilities
//! - Define `DispatchError`, the failure type of compiled handlers and
//!   request middleware
//! - Forward errors as body-less responses tagged with `ForwardedError`
//! - Render forwarded errors as JSON in one place (`error_pipeline`)
//!
//! # Design Decisions
//! - Handlers never write an error body themselves
//! - Server errors hide their detail from clients; it is logged instead

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Error type for request dispatch.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("request body: {0}")]
    Body(String),

    #[error("response serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl DispatchError {
    pub fn internal(message: impl Into<String>) -> Self {
        DispatchError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::BadRequest(_) | DispatchError::Body(_) => StatusCode::BAD_REQUEST,
            DispatchError::Unauthorized => StatusCode::UNAUTHORIZED,
            DispatchError::Forbidden(_) => StatusCode::FORBIDDEN,
            DispatchError::Serialize(_) | DispatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

/// Marker carried by a response whose error still has to be rendered.
#[derive(Debug, Clone)]
pub struct ForwardedError(pub Arc<DispatchError>);

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let mut response = self.status().into_response();
        response
            .extensions_mut()
            .insert(ForwardedError(Arc::new(self)));
        response
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Render forwarded errors as `{"error": .., "message": ..}`.
///
/// Responses without a `ForwardedError` pass through untouched.
pub async fn error_pipeline(request: Request<Body>, next: Next) -> Response {
    let response = next.run(request).await;
    let (mut parts, body) = response.into_parts();
    let Some(ForwardedError(error)) = parts.extensions.remove::<ForwardedError>() else {
        return Response::from_parts(parts, body);
    };

    let payload = ErrorBody {
        error: parts.status.canonical_reason().unwrap_or("Error"),
        message: error.public_message(),
    };
    match serde_json::to_vec(&payload) {
        Ok(bytes) => {
            parts.headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to render error response");
            Response::from_parts(parts, Body::empty())
        }
    }
}
