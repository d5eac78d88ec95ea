use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{
    error::AppError,
    rate_limit::{RateLimiter, apply_rate_limit_headers},
    utils::client_ip,
};

/// 某个路由组使用的限流器；`scope` 用于区分同一策略下的不同路由
#[derive(Clone)]
pub struct RouteLimit {
    limiter: Arc<RateLimiter>,
    scope: Option<&'static str>,
}

impl RouteLimit {
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self {
            limiter,
            scope: None,
        }
    }

    pub fn scoped(limiter: Arc<RateLimiter>, scope: &'static str) -> Self {
        Self {
            limiter,
            scope: Some(scope),
        }
    }

    fn identifier(&self, ip: &str) -> String {
        match self.scope {
            Some(scope) => format!("{}:{}", scope, ip),
            None => ip.to_string(),
        }
    }
}

pub async fn rate_limit(
    State(route): State<RouteLimit>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let identifier = route.identifier(&client_ip(&req));
    tracing::debug!(
        policy = route.limiter.namespace(),
        identifier = %identifier,
        "rate limit consume"
    );

    match route.limiter.consume(&identifier).await {
        Ok(info) => {
            let mut response = next.run(req).await;
            apply_rate_limit_headers(response.headers_mut(), &info);
            response
        }
        Err(e) => AppError::from(e).into_response(),
    }
}
