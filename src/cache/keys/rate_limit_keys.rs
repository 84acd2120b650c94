/// 限流窗口键前缀
const RATE_LIMIT_PREFIX: &str = "rate_limit:";

/// 所有限流窗口
pub const RATE_LIMIT_PATTERN: &str = "rate_limit:*";

/// 生成窗口键：客户端标识 + 窗口起点
pub fn window_key(identity: &str, window_start: i64) -> String {
    format!("{}{}:{}", RATE_LIMIT_PREFIX, identity, window_start)
}

/// 从窗口键中取出窗口起点，标识本身可能包含冒号，所以从右侧切
pub fn parse_window_start(key: &str) -> Option<i64> {
    let rest = key.strip_prefix(RATE_LIMIT_PREFIX)?;
    let (_, start) = rest.rsplit_once(':')?;
    start.parse().ok()
}
