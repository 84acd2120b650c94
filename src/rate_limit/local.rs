use async_trait::async_trait;
use dashmap::DashMap;

use super::RateLimitBackend;
use crate::cache::models::{RateWindow, WindowCount};
use crate::error::StoreError;

/// 进程内计数，键为 (客户端标识, 窗口起点)
///
/// 只适合单实例部署；多实例之间计数不共享。
/// 旧窗口靠 `sweep` 回收，不回收也不影响判定，新窗口总是新键。
#[derive(Default)]
pub struct LocalBackend {
    windows: DashMap<(String, i64), u64>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimitBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn hit(
        &self,
        window: &RateWindow,
        limit: u32,
        _window_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let mut count = self
            .windows
            .entry((window.identity.clone(), window.window_start))
            .or_insert(0);

        if *count >= u64::from(limit) {
            return Ok(WindowCount {
                count: *count,
                admitted: false,
            });
        }

        *count += 1;
        Ok(WindowCount {
            count: *count,
            admitted: true,
        })
    }

    async fn sweep(&self, now_ms: i64, window_ms: u64) -> Result<usize, StoreError> {
        let before = self.windows.len();
        self.windows
            .retain(|(_, start), _| start.saturating_add(window_ms as i64) > now_ms);
        Ok(before.saturating_sub(self.windows.len()))
    }
}
