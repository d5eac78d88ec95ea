use std::sync::Arc;

use config::Config;
use rate_limit::RateLimiterRegistry;

pub mod config;
pub mod database;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod router;
pub mod routes;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub limiters: Arc<RateLimiterRegistry>,
}
