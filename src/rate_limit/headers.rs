use axum::http::{HeaderMap, HeaderName, HeaderValue, header::RETRY_AFTER};

use super::types::RateLimitInfo;

pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

pub fn apply_rate_limit_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(info.reset));
}

pub fn apply_retry_after(headers: &mut HeaderMap, retry_after_secs: u64) {
    headers.insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
}
