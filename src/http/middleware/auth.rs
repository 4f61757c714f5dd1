//! Bearer authentication and authorization middleware.
//!
//! `valid_jwt_needed` verifies the token and stores its `Claims` in the
//! request extensions; `required_scopes` and `required_role` reuse them,
//! verifying on their own only when attached without it.

use std::sync::Arc;

use axum::{
    body::Body,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::response::DispatchError;
use crate::routing::Middleware;
use crate::security::{Claims, TokenVerifier};

pub fn valid_jwt_needed() -> Middleware {
    Middleware::from_fn("valid_jwt_needed", |mut request: Request<Body>, next: Next| async move {
        match verify(&request) {
            Ok(claims) => {
                request.extensions_mut().insert(claims);
                next.run(request).await
            }
            Err(e) => e.into_response(),
        }
    })
}

/// Every scope in `scopes` must be granted.
pub fn required_scopes(scopes: Vec<String>) -> Middleware {
    let scopes = Arc::new(scopes);
    Middleware::from_fn("required_scopes", move |request: Request<Body>, next: Next| {
        let scopes = scopes.clone();
        async move {
            let claims = match claims_of(&request) {
                Ok(c) => c,
                Err(e) => return e.into_response(),
            };
            if !claims.has_scopes(scopes.as_slice()) {
                tracing::debug!(required = ?scopes, "Token lacks required scopes");
                return DispatchError::Forbidden(format!("missing scope {}", scopes.join(" ")))
                    .into_response();
            }
            next.run(request).await
        }
    })
}

/// The token must carry `role`, or the admin role. A mismatch is treated
/// like a missing token and answered with 401.
pub fn required_role(role: impl Into<String>) -> Middleware {
    let role: Arc<str> = Arc::from(role.into());
    Middleware::from_fn("required_role", move |request: Request<Body>, next: Next| {
        let role = role.clone();
        async move {
            let claims = match claims_of(&request) {
                Ok(c) => c,
                Err(e) => return e.into_response(),
            };
            if !claims.has_role(&role) {
                tracing::debug!(required = %role, granted = ?claims.role, "Token lacks required role");
                return DispatchError::Unauthorized.into_response();
            }
            next.run(request).await
        }
    })
}

fn claims_of(request: &Request<Body>) -> Result<Claims, DispatchError> {
    match request.extensions().get::<Claims>() {
        Some(claims) => Ok(claims.clone()),
        None => verify(request),
    }
}

fn verify(request: &Request<Body>) -> Result<Claims, DispatchError> {
    let Some(verifier) = request.extensions().get::<Arc<TokenVerifier>>() else {
        return Err(DispatchError::internal("no token verifier configured"));
    };
    verifier.verify_header(request.headers()).map_err(|e| {
        tracing::debug!(error = %e, "Bearer authentication failed");
        DispatchError::Unauthorized
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::ForwardedError;
    use axum::{
        extract::Extension,
        http::{header, StatusCode},
        middleware::from_fn,
        routing::get,
        Router,
    };
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use tower::ServiceExt;

    const SECRET: &[u8] = b"middleware-secret";

    fn token(claims: &Claims) -> String {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(SECRET))
            .unwrap()
    }

    fn app(chain: Vec<Middleware>, verifier: bool) -> Router {
        let mut route = get(|request: Request<Body>| async move {
            request
                .extensions()
                .get::<Claims>()
                .and_then(|c| c.sub.clone())
                .unwrap_or_default()
        });
        for m in chain.into_iter().rev() {
            route = route.layer(from_fn(move |req: Request<Body>, next: Next| {
                let m = m.clone();
                async move { m.call(req, next).await }
            }));
        }
        let router = Router::new().route("/", route);
        if verifier {
            router.layer(Extension(Arc::new(TokenVerifier::hs256(SECRET))))
        } else {
            router
        }
    }

    async fn call(app: Router, bearer: Option<String>) -> Response {
        let mut builder = Request::builder().uri("/");
        if let Some(t) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap()
    }

    fn claims(role: &str, scope: &str) -> Claims {
        Claims {
            sub: Some("bob".into()),
            role: Some(role.into()),
            scope: Some(scope.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let response = call(app(vec![valid_jwt_needed()], true), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.extensions().get::<ForwardedError>().is_some());
    }

    #[tokio::test]
    async fn test_valid_token_exposes_claims() {
        let response = call(
            app(vec![valid_jwt_needed()], true),
            Some(token(&claims("public", ""))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"bob");
    }

    #[tokio::test]
    async fn test_scopes_and_roles() {
        let chain = || {
            vec![
                valid_jwt_needed(),
                required_scopes(vec!["read".into()]),
                required_role("public"),
            ]
        };

        let ok = call(app(chain(), true), Some(token(&claims("public", "read write")))).await;
        assert_eq!(ok.status(), StatusCode::OK);

        let admin = call(app(chain(), true), Some(token(&claims("admin", "read")))).await;
        assert_eq!(admin.status(), StatusCode::OK);

        let no_scope = call(app(chain(), true), Some(token(&claims("public", "write")))).await;
        assert_eq!(no_scope.status(), StatusCode::FORBIDDEN);

        let wrong_role = call(app(chain(), true), Some(token(&claims("staff", "read")))).await;
        assert_eq!(wrong_role.status(), StatusCode::UNAUTHORIZED);
        assert!(wrong_role.extensions().get::<ForwardedError>().is_some());
    }

    #[tokio::test]
    async fn test_role_check_verifies_on_its_own() {
        let response = call(
            app(vec![required_role("public")], true),
            Some(token(&claims("public", ""))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = call(app(vec![required_role("public")], true), None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_without_verifier_fails_closed() {
        let response = call(
            app(vec![valid_jwt_needed()], false),
            Some(token(&claims("public", ""))),
        )
        .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
