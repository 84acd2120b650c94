use crate::cache::keys::rate_limit_keys;

/// 某个客户端所在的固定窗口
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateWindow {
    pub identity: String,
    /// 按窗口长度对齐的起始时间（毫秒时间戳）
    pub window_start: i64,
}

impl RateWindow {
    pub fn new(identity: &str, now_ms: i64, window_ms: u64) -> Self {
        Self {
            identity: identity.to_string(),
            window_start: align_window(now_ms, window_ms),
        }
    }

    pub fn key(&self) -> String {
        rate_limit_keys::window_key(&self.identity, self.window_start)
    }

    /// 下一个窗口边界（毫秒时间戳）
    pub fn reset_at(&self, window_ms: u64) -> i64 {
        self.window_start + window_ms as i64
    }
}

/// 一次原子计数的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// 操作后的计数；被拒绝时为当前值，不再递增
    pub count: u64,
    pub admitted: bool,
}

/// floor(now / window) * window，负时间戳同样向下取整
pub fn align_window(now_ms: i64, window_ms: u64) -> i64 {
    let window = window_ms.max(1) as i64;
    now_ms.div_euclid(window) * window
}
