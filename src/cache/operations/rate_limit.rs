use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::keys::{RATE_LIMIT_PATTERN, rate_limit_keys::parse_window_start};
use crate::cache::models::{RateWindow, WindowCount};
use crate::cache::store::KvStore;
use crate::error::StoreError;
use crate::rate_limit::RateLimitBackend;

/// 速率限制缓存操作
///
/// 计数放在共享存储里，多个实例看到同一个窗口。
/// 窗口键自带过期时间，清理只是顺手回收。
pub struct RateLimitCacheOperations {
    store: Arc<dyn KvStore>,
}

impl RateLimitCacheOperations {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl RateLimitBackend for RateLimitCacheOperations {
    fn name(&self) -> &'static str {
        "store"
    }

    async fn hit(
        &self,
        window: &RateWindow,
        limit: u32,
        window_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        self.store
            .increment_window(&window.key(), u64::from(limit), window_ms)
            .await
    }

    async fn sweep(&self, now_ms: i64, window_ms: u64) -> Result<usize, StoreError> {
        let stale: Vec<String> = self
            .store
            .scan_keys(RATE_LIMIT_PATTERN)
            .await?
            .into_iter()
            .filter(|key| {
                parse_window_start(key)
                    .is_some_and(|start| start.saturating_add(window_ms as i64) <= now_ms)
            })
            .collect();

        if stale.is_empty() {
            return Ok(0);
        }
        self.store.delete_keys(&stale).await
    }
}
