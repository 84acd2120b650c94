use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::models::TtlTiers;
use crate::error::ConfigError;
use crate::rate_limit::FailMode;

/// 限流计数的存放位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackendKind {
    /// 共享键值存储（多实例部署）
    Store,
    /// 进程内并发表（单实例部署）
    Local,
}

impl FromStr for RateLimitBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" | "redis" => Ok(Self::Store),
            "local" | "memory" => Ok(Self::Local),
            other => Err(format!("expected `store` or `local`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: Option<String>,
    pub redis_timeout_ms: u64,
    pub server_host: String,
    pub server_port: u16,
    pub api_prefix: String,
    pub static_prefix: String,
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    pub rate_limit_backend: RateLimitBackendKind,
    pub rate_limit_fail_mode: FailMode,
    pub rate_limit_sweep_every: u64,
    pub cache_ttl: TtlTiers,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_timeout_ms: 500,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            api_prefix: "/api/".to_string(),
            static_prefix: "/static/".to_string(),
            rate_limit_window_ms: 60_000,
            rate_limit_requests: 100,
            rate_limit_backend: RateLimitBackendKind::Store,
            rate_limit_fail_mode: FailMode::Open,
            rate_limit_sweep_every: 100,
            cache_ttl: TtlTiers::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 从任意键值来源构建配置，缺省项使用默认值
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let ttl = defaults.cache_ttl;

        let api_prefix = lookup("API_PREFIX").unwrap_or(defaults.api_prefix);
        let static_prefix = lookup("STATIC_PREFIX").unwrap_or(defaults.static_prefix);

        let config = Config {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            redis_timeout_ms: parse(&lookup, "REDIS_TIMEOUT_MS", defaults.redis_timeout_ms)?,
            server_host: lookup("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: parse(&lookup, "SERVER_PORT", defaults.server_port)?,
            api_prefix: normalize_prefix(api_prefix),
            static_prefix: normalize_prefix(static_prefix),
            rate_limit_window_ms: parse(&lookup, "RATE_LIMIT_WINDOW_MS", defaults.rate_limit_window_ms)?,
            rate_limit_requests: parse(&lookup, "RATE_LIMIT_REQUESTS", defaults.rate_limit_requests)?,
            rate_limit_backend: parse(&lookup, "RATE_LIMIT_BACKEND", defaults.rate_limit_backend)?,
            rate_limit_fail_mode: parse(&lookup, "RATE_LIMIT_FAIL_MODE", defaults.rate_limit_fail_mode)?,
            rate_limit_sweep_every: parse(&lookup, "RATE_LIMIT_SWEEP_EVERY", defaults.rate_limit_sweep_every)?,
            cache_ttl: TtlTiers {
                short: parse(&lookup, "CACHE_TTL_SHORT", ttl.short)?,
                medium: parse(&lookup, "CACHE_TTL_MEDIUM", ttl.medium)?,
                long: parse(&lookup, "CACHE_TTL_LONG", ttl.long)?,
            },
        };

        if config.rate_limit_window_ms == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_MS",
                value: "0".to_string(),
                reason: "window must be at least 1ms".to_string(),
            });
        }

        Ok(config)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    pub fn redis_timeout(&self) -> Duration {
        Duration::from_millis(self.redis_timeout_ms)
    }
}

fn parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw,
            reason: e.to_string(),
        }),
    }
}

// 前缀统一为 "/xxx/" 形式，避免 "/api" 误匹配 "/apidocs"
fn normalize_prefix(raw: String) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
