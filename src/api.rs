//! Web front-end: health check, plugin routes, bearer-token auth.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use reverie_core::config::WebConfig;
use reverie_plugins::PluginHost;
use serde_json::{json, Value};
use tracing::{info, warn};

#[derive(Clone)]
struct AuthState {
    api_key: Arc<str>,
    dev_mode: bool,
}

/// Constant-time string comparison to prevent timing attacks on token validation.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Check bearer token auth. Returns `None` if authorized, `Some(response)` if rejected.
///
/// An empty key never matches, so an unconfigured server rejects everything.
fn check_auth(headers: &HeaderMap, api_key: &str) -> Option<(StatusCode, Json<Value>)> {
    let header = match headers.get("authorization") {
        Some(h) => h,
        None => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "missing Authorization header"})),
            ));
        }
    };

    let value = match header.to_str() {
        Ok(v) => v,
        Err(_) => {
            return Some((
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid Authorization header"})),
            ));
        }
    };

    match value.strip_prefix("Bearer ") {
        Some(token) if !api_key.is_empty() && constant_time_eq(token, api_key) => None,
        _ => Some((
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid token"})),
        )),
    }
}

async fn require_token(State(auth): State<AuthState>, request: Request, next: Next) -> Response {
    if auth.dev_mode {
        return next.run(request).await;
    }
    if let Some(rejection) = check_auth(request.headers(), &auth.api_key) {
        warn!("Rejected {} {}", request.method(), request.uri().path());
        return rejection.into_response();
    }
    next.run(request).await
}

/// `GET /api/health`
async fn health(State(started): State<Instant>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": started.elapsed().as_secs(),
    }))
}

/// Health route, every plugin's routes, and the auth layer over all of them.
pub fn build_router(host: &PluginHost, config: &WebConfig, dev_mode: bool) -> Router {
    let base = Router::new()
        .route("/api/health", get(health))
        .with_state(Instant::now());
    let auth = AuthState {
        api_key: Arc::from(config.api_key.as_str()),
        dev_mode,
    };
    if dev_mode {
        info!("Dev mode: web authentication disabled");
    } else if config.api_key.is_empty() {
        warn!("web.api_key is empty, every request will be rejected");
    }

    host.mount_routes(base)
        .layer(axum::extract::DefaultBodyLimit::max(1024 * 1024))
        .layer(middleware::from_fn_with_state(auth, require_token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use reverie_plugins::PluginRegistry;
    use tower::ServiceExt;

    fn web(api_key: &str) -> WebConfig {
        WebConfig {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    fn router(api_key: &str, dev_mode: bool) -> Router {
        let host = PluginHost::new(PluginRegistry::new());
        build_router(&host, &web(api_key), dev_mode)
    }

    fn health_request(auth: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/health");
        if let Some(value) = auth {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(constant_time_eq("", ""));
    }

    #[tokio::test]
    async fn test_health_with_valid_token() {
        let resp = router("secret", false)
            .oneshot(health_request(Some("Bearer secret")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["status"], "ok");
        assert!(json["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_missing_header_rejected() {
        let resp = router("secret", false)
            .oneshot(health_request(None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "missing Authorization header");
    }

    #[tokio::test]
    async fn test_wrong_token_rejected() {
        let resp = router("secret", false)
            .oneshot(health_request(Some("Bearer nope")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["error"], "invalid token");
    }

    #[tokio::test]
    async fn test_empty_key_rejects_everything() {
        let resp = router("", false)
            .oneshot(health_request(Some("Bearer ")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_dev_mode_skips_auth() {
        let resp = router("", true)
            .oneshot(health_request(None))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_unknown_route_still_requires_auth() {
        let req = axum::http::Request::builder()
            .uri("/api/nothing")
            .body(Body::empty())
            .unwrap();
        let resp = router("secret", false).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
