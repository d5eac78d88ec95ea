use std::env;
use std::time::Duration;

use crate::rate_limit::{AUTH, CleanupMode, DEFAULT, PolicySet, RateLimitPolicy, STRICT};

const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub admin_token: Option<String>,
    pub rate_limit_cleanup: String,
    pub rate_limit_cleanup_interval_secs: u64,
    pub rate_limit_overrides: Vec<PolicyOverride>,
}

/// 来自环境变量的单个限流策略覆盖
#[derive(Debug, Clone, serde::Deserialize)]
pub struct PolicyOverride {
    pub name: String,
    pub requests: Option<u32>,
    pub window_ms: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let rate_limit_overrides = [DEFAULT, AUTH, STRICT]
            .into_iter()
            .map(|name| {
                let prefix = format!("RATE_LIMIT_{}", name.to_uppercase());
                PolicyOverride {
                    name: name.to_string(),
                    requests: parse_var(&format!("{}_REQUESTS", prefix)),
                    window_ms: parse_var(&format!("{}_WINDOW_MS", prefix)),
                }
            })
            .collect();

        Ok(Config {
            database_url: env::var("DATABASE_URL").ok(),
            server_host: env::var("SERVER_HOST")?,
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            api_base_uri: env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            admin_token: env::var("ADMIN_TOKEN").ok().filter(|t| !t.is_empty()),
            rate_limit_cleanup: env::var("RATE_LIMIT_CLEANUP").unwrap_or_else(|_| "inline".into()),
            rate_limit_cleanup_interval_secs: parse_var("RATE_LIMIT_CLEANUP_INTERVAL")
                .unwrap_or(DEFAULT_CLEANUP_INTERVAL_SECS),
            rate_limit_overrides,
        })
    }

    pub fn cleanup_mode(&self) -> CleanupMode {
        match self.rate_limit_cleanup.trim().to_ascii_lowercase().as_str() {
            "background" => CleanupMode::Background {
                interval: Duration::from_secs(self.rate_limit_cleanup_interval_secs.max(1)),
            },
            "inline" => CleanupMode::Inline,
            other => {
                tracing::warn!("Unknown RATE_LIMIT_CLEANUP value {:?}, using inline", other);
                CleanupMode::Inline
            }
        }
    }

    /// 内置策略叠加环境变量覆盖；非法值（为 0 或窗口过大）会被忽略
    pub fn rate_limit_policies(&self) -> PolicySet {
        let base = PolicySet::default();
        self.rate_limit_overrides
            .iter()
            .fold(base.clone(), |set, o| {
                let Some(current) = base.get(&o.name) else {
                    return set;
                };
                let requests = o.requests.unwrap_or(current.max_requests());
                let window_ms = o.window_ms.unwrap_or(current.window_ms());
                match RateLimitPolicy::new(requests, window_ms) {
                    Ok(policy) => set.with(o.name.clone(), policy),
                    Err(e) => {
                        tracing::warn!("Ignoring rate limit override for {}: {}", o.name, e);
                        set
                    }
                }
            })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
