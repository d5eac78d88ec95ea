use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::rate_limit::{
    RateLimitError, RateLimitInfo, apply_rate_limit_headers, apply_retry_after,
};
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug)]
pub enum AppError {
    Forbidden,
    NotFound(String),
    TooManyRequests {
        retry_after_secs: u64,
        info: RateLimitInfo,
    },
    InternalServerError,
}

impl From<RateLimitError> for AppError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded {
                retry_after_secs,
                info,
            } => AppError::TooManyRequests {
                retry_after_secs,
                info,
            },
            RateLimitError::Storage(e) => {
                tracing::error!("Rate limit store failure: {}", e);
                AppError::InternalServerError
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                error_to_api_response::<()>(error_codes::PERMISSION_DENIED, "禁止访问".into()),
            )
                .into_response(),
            AppError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                error_to_api_response::<()>(error_codes::NOT_FOUND, format!("{}不存在", what)),
            )
                .into_response(),
            AppError::TooManyRequests {
                retry_after_secs,
                info,
            } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    error_to_api_response::<()>(
                        error_codes::RATE_LIMIT,
                        format!("请求过于频繁，请在{}秒后重试", retry_after_secs),
                    ),
                )
                    .into_response();
                apply_rate_limit_headers(response.headers_mut(), &info);
                apply_retry_after(response.headers_mut(), retry_after_secs);
                response
            }
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response::<()>(error_codes::INTERNAL_ERROR, "内部服务器错误".into()),
            )
                .into_response(),
        }
    }
}
