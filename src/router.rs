use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::get,
};

use crate::{
    AppState,
    middleware::{RouteLimit, rate_limit},
    rate_limit::{AUTH, DEFAULT, STRICT, UnknownPolicy},
    routes,
};

// 公开路由，使用 default 策略
fn public_routes(state: &AppState) -> Result<Router<AppState>, UnknownPolicy> {
    let limit = RouteLimit::new(state.limiters.require(DEFAULT)?);
    Ok(Router::new()
        .route("/health", get(routes::health::health))
        .layer(from_fn_with_state(limit, rate_limit)))
}

// 额度查询，使用 strict 策略
fn status_routes(state: &AppState) -> Result<Router<AppState>, UnknownPolicy> {
    let limit = RouteLimit::scoped(state.limiters.require(STRICT)?, "status");
    Ok(Router::new()
        .route(
            "/rate-limits/{policy}/{identifier}",
            get(routes::rate_limit::status),
        )
        .layer(from_fn_with_state(limit, rate_limit)))
}

// 管理接口，使用 auth 策略防止令牌爆破
fn admin_routes(state: &AppState) -> Result<Router<AppState>, UnknownPolicy> {
    let limit = RouteLimit::scoped(state.limiters.require(AUTH)?, "admin");
    Ok(Router::new()
        .route(
            "/admin/rate-limits/{policy}/{identifier}",
            axum::routing::delete(routes::rate_limit::reset),
        )
        .layer(from_fn_with_state(limit, rate_limit)))
}

// 创建主路由
pub fn create_router(state: AppState) -> Result<Router, UnknownPolicy> {
    let api = Router::new()
        .merge(public_routes(&state)?)
        .merge(status_routes(&state)?)
        .merge(admin_routes(&state)?);

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(base, api)
    };

    Ok(router
        .layer(axum::middleware::from_fn(crate::middleware::log_errors))
        .with_state(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::rate_limit::{
        CleanupMode, MemoryRateLimitStore, PolicySet, RateLimitPolicy, RateLimiterRegistry,
        SystemClock,
    };
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn state(admin_token: Option<&str>) -> AppState {
        let config = Config {
            database_url: None,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            admin_token: admin_token.map(str::to_string),
            rate_limit_cleanup: "inline".into(),
            rate_limit_cleanup_interval_secs: 60,
            rate_limit_overrides: Vec::new(),
        };
        let policies =
            PolicySet::default().with(STRICT, RateLimitPolicy::new(3, 60_000).unwrap());
        let limiters = RateLimiterRegistry::new(
            policies,
            Arc::new(MemoryRateLimitStore::new()),
            Arc::new(SystemClock),
            CleanupMode::Inline,
        );
        AppState {
            config,
            limiters: Arc::new(limiters),
        }
    }

    fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-real-ip", "203.0.113.9");
        if let Some(token) = token {
            builder = builder.header("x-admin-token", token);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn json(res: axum::response::Response) -> Value {
        let body = to_bytes(res.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_is_rate_limited_by_default_policy() {
        let app = create_router(state(None)).unwrap();
        let res = app
            .oneshot(request(Method::GET, "/api/health", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["x-ratelimit-limit"], "100");
        assert_eq!(res.headers()["x-ratelimit-remaining"], "99");
        assert_eq!(json(res).await["resp_data"]["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_without_consuming_target() {
        let state = state(None);
        let app = create_router(state.clone()).unwrap();

        app.clone()
            .oneshot(request(Method::GET, "/api/health", None))
            .await
            .unwrap();

        let res = app
            .oneshot(request(
                Method::GET,
                "/api/rate-limits/default/203.0.113.9",
                None,
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json(res).await;
        assert_eq!(body["resp_data"]["limit"], 100);
        assert_eq!(body["resp_data"]["remaining"], 99);
    }

    #[tokio::test]
    async fn status_route_uses_strict_policy() {
        let app = create_router(state(None)).unwrap();
        for _ in 0..3 {
            let res = app
                .clone()
                .oneshot(request(Method::GET, "/api/rate-limits/auth/x", None))
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = app
            .oneshot(request(Method::GET, "/api/rate-limits/auth/x", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(res.headers().contains_key("retry-after"));
    }

    #[tokio::test]
    async fn unknown_policy_is_not_found() {
        let app = create_router(state(None)).unwrap();
        let res = app
            .oneshot(request(Method::GET, "/api/rate-limits/nope/x", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reset_requires_admin_token() {
        let app = create_router(state(Some("secret"))).unwrap();
        let uri = "/api/admin/rate-limits/default/203.0.113.9";

        let res = app
            .clone()
            .oneshot(request(Method::DELETE, uri, None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .clone()
            .oneshot(request(Method::DELETE, uri, Some("wrong")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(request(Method::DELETE, uri, Some("secret")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn reset_clears_window() {
        let state = state(Some("secret"));
        let app = create_router(state.clone()).unwrap();
        for _ in 0..2 {
            app.clone()
                .oneshot(request(Method::GET, "/api/health", None))
                .await
                .unwrap();
        }

        let res = app
            .oneshot(request(
                Method::DELETE,
                "/api/admin/rate-limits/default/203.0.113.9",
                Some("secret"),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let info = state
            .limiters
            .require(DEFAULT)
            .unwrap()
            .check("203.0.113.9")
            .await
            .unwrap();
        assert_eq!(info.remaining, 100);
    }

    #[tokio::test]
    async fn reset_disabled_without_configured_token() {
        let app = create_router(state(None)).unwrap();
        let res = app
            .oneshot(request(
                Method::DELETE,
                "/api/admin/rate-limits/default/x",
                Some(""),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
