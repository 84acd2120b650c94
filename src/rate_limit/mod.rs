//! 固定窗口限流
//!
//! 每个客户端标识在每个对齐的时间窗口内最多放行 `limit` 个请求。
//! 计数放在哪里由 [`RateLimitBackend`] 决定：共享存储（多实例）
//! 或进程内并发表（单实例），两者可以互换。
//!
//! 窗口边界处允许突发，这是固定窗口相对滑动日志的取舍。

mod local;

pub use local::LocalBackend;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cache::models::{RateWindow, WindowCount};
use crate::error::StoreError;

/// 计数存放策略
#[async_trait]
pub trait RateLimitBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// 原子地检查并递增窗口计数；达到上限时不再递增
    async fn hit(
        &self,
        window: &RateWindow,
        limit: u32,
        window_ms: u64,
    ) -> Result<WindowCount, StoreError>;

    /// 删除已经结束的窗口，返回删除数量
    async fn sweep(&self, now_ms: i64, window_ms: u64) -> Result<usize, StoreError>;
}

/// 存储不可用时的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    /// 放行（默认），可用性优先
    #[default]
    Open,
    /// 拒绝，严格限流
    Closed,
}

impl FromStr for FailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("expected `open` or `closed`, got `{other}`")),
        }
    }
}

impl fmt::Display for FailMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailMode::Open => f.write_str("open"),
            FailMode::Closed => f.write_str("closed"),
        }
    }
}

/// 一次限流判定。网关放行/拒绝和响应头都只用这一个结果，不重复计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDecision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at_epoch_ms: i64,
    /// 距离窗口重置的秒数，向上取整，至少 1
    pub retry_after_secs: u64,
}

impl RateDecision {
    /// 窗口重置时间（秒级时间戳，向上取整）
    pub fn reset_at_epoch_secs(&self) -> i64 {
        self.reset_at_epoch_ms.div_euclid(1000) + i64::from(self.reset_at_epoch_ms.rem_euclid(1000) != 0)
    }
}

pub struct RateLimiter {
    backend: Arc<dyn RateLimitBackend>,
    fail_mode: FailMode,
    sweep_every: u64,
    checks: AtomicU64,
}

impl RateLimiter {
    pub fn new(backend: Arc<dyn RateLimitBackend>) -> Self {
        Self {
            backend,
            fail_mode: FailMode::default(),
            sweep_every: 100,
            checks: AtomicU64::new(0),
        }
    }

    pub fn with_fail_mode(mut self, fail_mode: FailMode) -> Self {
        self.fail_mode = fail_mode;
        self
    }

    /// 每 `every` 次检查触发一次后台清理（默认 100，约 1% 的请求），0 表示关闭
    pub fn with_sweep_every(mut self, every: u64) -> Self {
        self.sweep_every = every;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn check_and_increment(&self, identity: &str, limit: u32, window_ms: u64) -> RateDecision {
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.check_and_increment_at(identity, limit, window_ms, now_ms)
            .await
    }

    /// 在给定时刻做一次检查
    pub async fn check_and_increment_at(
        &self,
        identity: &str,
        limit: u32,
        window_ms: u64,
        now_ms: i64,
    ) -> RateDecision {
        let window_ms = window_ms.max(1);
        let window = RateWindow::new(identity, now_ms, window_ms);
        let reset_at_epoch_ms = window.reset_at(window_ms);
        let retry_after_secs = ((reset_at_epoch_ms - now_ms).max(0) as u64).div_ceil(1000).max(1);

        let decision = match self.backend.hit(&window, limit, window_ms).await {
            Ok(hit) => RateDecision {
                admitted: hit.admitted,
                limit,
                remaining: if hit.admitted {
                    u64::from(limit).saturating_sub(hit.count) as u32
                } else {
                    0
                },
                reset_at_epoch_ms,
                retry_after_secs,
            },
            Err(e) => {
                counter!("admission_store_failures_total", "op" => "rate_limit").increment(1);
                warn!(
                    backend = self.backend.name(),
                    identity,
                    fail_mode = %self.fail_mode,
                    "rate limit check failed: {}",
                    e
                );
                let admitted = self.fail_mode == FailMode::Open;
                RateDecision {
                    admitted,
                    limit,
                    remaining: if admitted { limit } else { 0 },
                    reset_at_epoch_ms,
                    retry_after_secs,
                }
            }
        };

        self.maybe_sweep(now_ms, window_ms);
        decision
    }

    /// 周期性清理任务，主要给进程内后端用
    pub fn spawn_sweeper(&self, window_ms: u64, every: Duration) -> JoinHandle<()> {
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now_ms = chrono::Utc::now().timestamp_millis();
                sweep(backend.as_ref(), now_ms, window_ms).await;
            }
        })
    }

    fn maybe_sweep(&self, now_ms: i64, window_ms: u64) {
        if self.sweep_every == 0 {
            return;
        }
        let n = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % self.sweep_every != 0 {
            return;
        }
        // 不阻塞当前请求
        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            sweep(backend.as_ref(), now_ms, window_ms).await;
        });
    }
}

async fn sweep(backend: &dyn RateLimitBackend, now_ms: i64, window_ms: u64) -> usize {
    match backend.sweep(now_ms, window_ms).await {
        Ok(removed) => {
            debug!(backend = backend.name(), removed, "swept stale rate limit windows");
            removed
        }
        Err(e) => {
            warn!(backend = backend.name(), "rate limit sweep failed: {}", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::operations::RateLimitCacheOperations;
    use crate::cache::operations::kv::testing::FailingStore;
    use crate::cache::store::{KvStore, MemoryStore};

    fn store_limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(RateLimitCacheOperations::new(Arc::new(MemoryStore::new()))))
            .with_sweep_every(0)
    }

    fn limiters() -> Vec<RateLimiter> {
        vec![
            store_limiter(),
            RateLimiter::new(Arc::new(LocalBackend::new())).with_sweep_every(0),
        ]
    }

    #[tokio::test]
    async fn concrete_window_scenario() {
        for limiter in limiters() {
            let mut remaining = Vec::new();
            for t in [0, 100, 200] {
                let decision = limiter.check_and_increment_at("A", 3, 1000, t).await;
                assert!(decision.admitted, "{}", limiter.backend_name());
                remaining.push(decision.remaining);
            }
            assert_eq!(remaining, vec![2, 1, 0]);

            let rejected = limiter.check_and_increment_at("A", 3, 1000, 300).await;
            assert!(!rejected.admitted);
            assert_eq!(rejected.remaining, 0);
            assert_eq!(rejected.reset_at_epoch_ms, 1000);
            assert_eq!(rejected.retry_after_secs, 1);

            let fresh = limiter.check_and_increment_at("A", 3, 1000, 1001).await;
            assert!(fresh.admitted);
            assert_eq!(fresh.remaining, 2);
            assert_eq!(fresh.reset_at_epoch_ms, 2000);
        }
    }

    #[tokio::test]
    async fn limit_admits_exactly_limit_requests() {
        for limiter in limiters() {
            let limit = 10;
            for k in 1..=limit {
                let decision = limiter.check_and_increment_at("ip:1.2.3.4", limit, 60_000, 5_000).await;
                assert!(decision.admitted);
                assert_eq!(decision.remaining, limit - k);
            }
            let over = limiter.check_and_increment_at("ip:1.2.3.4", limit, 60_000, 5_001).await;
            assert!(!over.admitted);
            assert_eq!(over.retry_after_secs, 55);

            // 其他客户端不受影响
            assert!(limiter.check_and_increment_at("ip:5.6.7.8", limit, 60_000, 5_002).await.admitted);
        }
    }

    #[tokio::test]
    async fn rejected_requests_do_not_grow_the_count() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(Arc::new(RateLimitCacheOperations::new(store.clone())))
            .with_sweep_every(0);

        for _ in 0..20 {
            limiter.check_and_increment_at("A", 2, 1000, 10).await;
        }
        assert_eq!(store.get("rate_limit:A:0").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checks_never_exceed_limit() {
        for limiter in limiters() {
            let limiter = Arc::new(limiter);
            let mut handles = Vec::new();
            for _ in 0..50 {
                let limiter = Arc::clone(&limiter);
                handles.push(tokio::spawn(async move {
                    limiter.check_and_increment_at("burst", 20, 1000, 0).await.admitted
                }));
            }

            let mut admitted = 0;
            for handle in handles {
                if handle.await.unwrap() {
                    admitted += 1;
                }
            }
            assert_eq!(admitted, 20, "{}", limiter.backend_name());
        }
    }

    #[tokio::test]
    async fn store_failure_fails_open_by_default() {
        let limiter = RateLimiter::new(Arc::new(RateLimitCacheOperations::new(Arc::new(FailingStore))))
            .with_sweep_every(0);
        for t in 0..5 {
            let decision = limiter.check_and_increment_at("A", 1, 1000, t).await;
            assert!(decision.admitted);
            assert_eq!(decision.remaining, 1);
        }
    }

    #[tokio::test]
    async fn store_failure_can_fail_closed() {
        let limiter = RateLimiter::new(Arc::new(RateLimitCacheOperations::new(Arc::new(FailingStore))))
            .with_fail_mode(FailMode::Closed)
            .with_sweep_every(0);
        let decision = limiter.check_and_increment_at("A", 5, 1000, 0).await;
        assert!(!decision.admitted);
        assert_eq!(decision.remaining, 0);
    }

    #[tokio::test]
    async fn sampled_sweep_runs_in_background() {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(Arc::new(RateLimitCacheOperations::new(store.clone())))
            .with_sweep_every(2);

        limiter.check_and_increment_at("A", 5, 1000, 0).await;
        // 第二次检查落在下一个窗口并触发清理
        limiter.check_and_increment_at("A", 5, 1000, 1500).await;

        for _ in 0..50 {
            if store.get("rate_limit:A:0").await.unwrap().is_none() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(store.get("rate_limit:A:0").await.unwrap().is_none());
        assert!(store.get("rate_limit:A:1000").await.unwrap().is_some());
    }

    #[test]
    fn reset_seconds_round_up() {
        let mut decision = RateDecision {
            admitted: true,
            limit: 1,
            remaining: 0,
            reset_at_epoch_ms: 60_000,
            retry_after_secs: 1,
        };
        assert_eq!(decision.reset_at_epoch_secs(), 60);
        decision.reset_at_epoch_ms = 60_001;
        assert_eq!(decision.reset_at_epoch_secs(), 61);
    }

    #[test]
    fn fail_mode_parses() {
        assert_eq!("OPEN".parse::<FailMode>(), Ok(FailMode::Open));
        assert_eq!("closed".parse::<FailMode>(), Ok(FailMode::Closed));
        assert!("maybe".parse::<FailMode>().is_err());
    }
}
