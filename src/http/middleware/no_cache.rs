//! Disable client and proxy caching for a route.

use axum::http::{header, HeaderName, HeaderValue};

use crate::routing::Middleware;

const SURROGATE_CONTROL: HeaderName = HeaderName::from_static("surrogate-control");

pub fn no_cache() -> Middleware {
    Middleware::from_fn("no_cache", |request, next| async move {
        let mut response = next.run(request).await;
        let headers = response.headers_mut();
        headers.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        );
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
        headers.insert(SURROGATE_CONTROL, HeaderValue::from_static("no-store"));
        response
    })
}
