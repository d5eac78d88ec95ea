use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::Serialize;

use crate::{
    AppState,
    error::AppError,
    rate_limit::{RateLimitInfo, RateLimiter},
    utils::success_to_api_response,
};
use std::sync::Arc;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

#[derive(Serialize)]
pub struct RateLimitStatusResponse {
    pub policy: String,
    pub identifier: String,
    #[serde(flatten)]
    pub info: RateLimitInfo,
}

#[derive(Serialize)]
pub struct RateLimitResetResponse {
    pub policy: String,
    pub identifier: String,
}

fn limiter(state: &AppState, policy: &str) -> Result<Arc<RateLimiter>, AppError> {
    state
        .limiters
        .get(policy)
        .ok_or_else(|| AppError::NotFound(format!("限流策略 {} ", policy)))
}

/// 查询剩余额度，不消耗
pub async fn status(
    State(state): State<AppState>,
    Path((policy, identifier)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let info = limiter(&state, &policy)?.check(&identifier).await?;
    Ok(success_to_api_response(RateLimitStatusResponse {
        policy,
        identifier,
        info,
    }))
}

/// 清除某个标识的窗口，需要管理员令牌
pub async fn reset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((policy, identifier)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let provided = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|h| h.to_str().ok());
    match (state.config.admin_token.as_deref(), provided) {
        (Some(expected), Some(given)) if expected == given => {}
        _ => return Err(AppError::Forbidden),
    }

    limiter(&state, &policy)?.reset(&identifier).await?;
    tracing::info!(policy = %policy, identifier = %identifier, "rate limit reset by admin");
    Ok(success_to_api_response(RateLimitResetResponse { policy, identifier }))
}
