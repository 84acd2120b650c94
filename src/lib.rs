use std::sync::Arc;
use std::time::Duration;

use axum::{Router, http::Uri};
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;

use cache::{ContentCacheOperations, KvAdapter, KvStore, MemoryStore, RateLimitCacheOperations, RedisStore};
use config::{Config, RateLimitBackendKind};
use content::{CachedContent, ContentRepository, MemoryContentRepository};
use error::{AppError, StoreError, panic_response};
use middleware::{Admission, log_errors};
use rate_limit::{LocalBackend, RateLimitBackend, RateLimiter};

pub mod cache;
pub mod config;
pub mod content;
pub mod error;
pub mod middleware;
pub mod rate_limit;
pub mod result;
pub mod routes;

/// 进程内存储清理过期条目的间隔
const MEMORY_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub content: CachedContent,
}

/// 按配置装配好的服务
pub struct Services {
    pub state: AppState,
    pub admission: Arc<Admission>,
    /// 未配置 Redis 时使用的进程内存储
    memory_store: Option<Arc<MemoryStore>>,
}

impl Services {
    /// 配置了 REDIS_URL 用 Redis，否则退回进程内存储
    pub async fn build(config: Config) -> Result<Self, StoreError> {
        let (store, memory_store): (Arc<dyn KvStore>, Option<Arc<MemoryStore>>) =
            match &config.redis_url {
                Some(url) => {
                    let redis = RedisStore::open(url, config.redis_timeout())?;
                    redis.warm_up().await;
                    (Arc::new(redis), None)
                }
                None => {
                    tracing::warn!("REDIS_URL not set, using in-process store");
                    let memory = Arc::new(MemoryStore::new());
                    (memory.clone(), Some(memory))
                }
            };

        let repo: Arc<dyn ContentRepository> = Arc::new(MemoryContentRepository::new());
        Ok(Self::with_parts(config, store, repo, memory_store))
    }

    /// 用给定的存储和仓库装配，测试里注入替身
    pub fn from_parts(
        config: Config,
        store: Arc<dyn KvStore>,
        repo: Arc<dyn ContentRepository>,
    ) -> Self {
        Self::with_parts(config, store, repo, None)
    }

    fn with_parts(
        config: Config,
        store: Arc<dyn KvStore>,
        repo: Arc<dyn ContentRepository>,
        memory_store: Option<Arc<MemoryStore>>,
    ) -> Self {
        let cache = ContentCacheOperations::new(KvAdapter::new(store.clone()), config.cache_ttl);

        let backend: Arc<dyn RateLimitBackend> = match config.rate_limit_backend {
            RateLimitBackendKind::Store => Arc::new(RateLimitCacheOperations::new(store)),
            RateLimitBackendKind::Local => Arc::new(LocalBackend::new()),
        };
        let limiter = Arc::new(
            RateLimiter::new(backend)
                .with_fail_mode(config.rate_limit_fail_mode)
                .with_sweep_every(config.rate_limit_sweep_every),
        );
        tracing::info!(
            backend = limiter.backend_name(),
            fail_mode = %config.rate_limit_fail_mode,
            limit = config.rate_limit_requests,
            window_ms = config.rate_limit_window_ms,
            "rate limiter configured"
        );

        let admission = Arc::new(Admission::new(limiter, &config));
        let state = AppState {
            config: Arc::new(config),
            content: CachedContent::new(repo, cache),
        };

        Self {
            state,
            admission,
            memory_store,
        }
    }

    /// 后台清理：进程内限流窗口每个窗口周期清一次，进程内存储定期清过期条目
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        let config = &self.state.config;

        if config.rate_limit_backend == RateLimitBackendKind::Local {
            tasks.push(
                self.admission
                    .limiter()
                    .spawn_sweeper(config.rate_limit_window_ms, config.rate_limit_window()),
            );
        }

        if let Some(memory) = &self.memory_store {
            let memory = Arc::clone(memory);
            tasks.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(MEMORY_PURGE_INTERVAL);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let purged = memory.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "purged expired cache entries");
                    }
                }
            }));
        }

        tasks
    }

    pub fn router(&self) -> Router {
        app(self.state.clone(), Arc::clone(&self.admission))
    }
}

/// 组装路由：API 挂在前缀下，外层依次是 panic 兜底、错误日志和请求准入
pub fn app(state: AppState, admission: Arc<Admission>) -> Router {
    let prefix = state.config.api_prefix.trim_end_matches('/').to_string();
    let api = routes::api_router();

    let router = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&prefix, api)
    };

    router
        .fallback(not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn_with_state(
            admission,
            middleware::rate_limit,
        ))
}

async fn not_found(uri: Uri) -> AppError {
    tracing::debug!(path = uri.path(), "no route");
    AppError::NotFound("Route")
}
