//! 键值存储后端
//!
//! `KvStore` 是缓存与限流共用的最小操作集。生产环境用 `RedisStore`，
//! 单实例部署或测试用 `MemoryStore`。实现只负责报告错误，
//! 降级策略（当作未命中、放行）由上层决定。

mod memory;
mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;

use crate::cache::models::WindowCount;
use crate::error::StoreError;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// 读取原始值，不存在或已过期时返回 `None`
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// 原子地写入并设置过期时间（秒），覆盖旧值
    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError>;

    /// 窗口计数：当前值小于 `limit` 时加一并放行，否则保持不变并拒绝。
    /// 键第一次出现时设置 `ttl_ms` 毫秒的过期时间。整个过程是一次原子操作。
    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl_ms: u64,
    ) -> Result<WindowCount, StoreError>;

    /// 列出匹配 glob 模式的键
    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// 批量删除，返回实际删除的数量
    async fn delete_keys(&self, keys: &[String]) -> Result<usize, StoreError>;
}

/// Redis 风格的 glob 匹配：`*`、`?`、`[abc]`、`[a-z]`、`[^a]`，`\` 转义
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    // 最近一个 `*` 之后的模式位置，以及它当前吞到的文本位置
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() {
            match p[pi] {
                '*' => {
                    star = Some((pi + 1, ti));
                    pi += 1;
                    continue;
                }
                '?' => {
                    pi += 1;
                    ti += 1;
                    continue;
                }
                '[' => match match_class(&p, pi, t[ti]) {
                    Some((true, next)) => {
                        pi = next;
                        ti += 1;
                        continue;
                    }
                    Some((false, _)) => {}
                    // 没有闭合的 `[` 按字面匹配
                    None if t[ti] == '[' => {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                    None => {}
                },
                '\\' if pi + 1 < p.len() => {
                    if p[pi + 1] == t[ti] {
                        pi += 2;
                        ti += 1;
                        continue;
                    }
                }
                c => {
                    if c == t[ti] {
                        pi += 1;
                        ti += 1;
                        continue;
                    }
                }
            }
        }

        match star {
            Some((after_star, consumed)) => {
                pi = after_star;
                ti = consumed + 1;
                star = Some((after_star, consumed + 1));
            }
            None => return false,
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn match_class(p: &[char], start: usize, ch: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = i < p.len() && p[i] == '^';
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < p.len() && p[i] != ']' {
        let mut lo = p[i];
        if lo == '\\' && i + 1 < p.len() {
            i += 1;
            lo = p[i];
        }
        if i + 2 < p.len() && p[i + 1] == '-' && p[i + 2] != ']' {
            let hi = p[i + 2];
            if lo <= ch && ch <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if lo == ch {
                matched = true;
            }
            i += 1;
        }
    }

    if i >= p.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
