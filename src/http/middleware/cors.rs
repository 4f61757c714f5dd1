//! Per-route CORS policy.

use axum::http::{header, HeaderValue};

use crate::routing::Middleware;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS, PUT, PATCH, DELETE, HEAD";
const ALLOW_HEADERS: &str = "X-Requested-With,Content-Type,Authorization,responseType";
const EXPOSE_HEADERS: &str = "x-total-count,x-pending-comment-count,x-next-comment-id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsPolicy {
    /// Forbid external frontends: no CORS headers leave the route.
    Deny,
    /// Allow one origin (`*` for any).
    Allow(String),
}

impl CorsPolicy {
    pub fn deny() -> Self {
        CorsPolicy::Deny
    }

    pub fn allow(origin: impl Into<String>) -> Self {
        CorsPolicy::Allow(origin.into())
    }
}

pub fn cors(policy: CorsPolicy) -> Middleware {
    Middleware::from_fn("cors", move |request, next| {
        let policy = policy.clone();
        async move {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            match policy {
                CorsPolicy::Deny => {
                    headers.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
                    headers.remove(header::ACCESS_CONTROL_ALLOW_METHODS);
                    headers.remove(header::ACCESS_CONTROL_ALLOW_HEADERS);
                    headers.remove(header::ACCESS_CONTROL_EXPOSE_HEADERS);
                    headers.remove(header::ACCESS_CONTROL_ALLOW_CREDENTIALS);
                }
                CorsPolicy::Allow(origin) => match HeaderValue::from_str(&origin) {
                    Ok(origin) => {
                        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
                        headers.insert(
                            header::ACCESS_CONTROL_ALLOW_METHODS,
                            HeaderValue::from_static(ALLOW_METHODS),
                        );
                        headers.insert(
                            header::ACCESS_CONTROL_ALLOW_HEADERS,
                            HeaderValue::from_static(ALLOW_HEADERS),
                        );
                        headers.insert(
                            header::ACCESS_CONTROL_EXPOSE_HEADERS,
                            HeaderValue::from_static(EXPOSE_HEADERS),
                        );
                    }
                    Err(_) => {
                        tracing::warn!(origin = %origin, "Invalid CORS origin, headers not set");
                    }
                },
            }
            response
        }
    })
}
