//! Security response headers.
//!
//! # Responsibilities
//! - Content security policy, referrer policy, MIME sniffing and framing rules
//! - A short default `Cache-Control` for responses that set none
//!
//! # Design Decisions
//! - Every header is `if_not_present`: route middleware such as `no_cache`
//!   wins over the global default

use axum::{
    http::{header, HeaderName, HeaderValue},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;

pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; style-src 'unsafe-inline'; script-src 'unsafe-inline' 'self'";
pub const DEFAULT_CACHE_CONTROL: &str = "max-age=4";

fn defaults() -> [(HeaderName, HeaderValue); 5] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static(CONTENT_SECURITY_POLICY),
        ),
        (header::REFERRER_POLICY, HeaderValue::from_static("same-origin")),
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (header::CACHE_CONTROL, HeaderValue::from_static(DEFAULT_CACHE_CONTROL)),
    ]
}

/// Wrap `router` so every response carries the security headers.
pub fn apply(router: Router) -> Router {
    defaults().into_iter().fold(router, |router, (name, value)| {
        router.layer(SetResponseHeaderLayer::if_not_present(name, value))
    })
}
