use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{KvStore, glob_match};
use crate::cache::models::WindowCount;
use crate::error::StoreError;

struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 进程内存储
///
/// 与 Redis 语义保持一致：写入原子覆盖、到期即不可见、按 glob 枚举。
/// 过期条目在读取或枚举时顺带清掉。
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 未过期的条目数
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Ok(Some(entry.value.clone()));
            }
        }
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError> {
        let expires_at = Instant::now() + Duration::from_secs(ttl_secs.max(1));
        self.entries
            .insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let fresh = || Entry {
            value: "0".to_string(),
            expires_at: now + Duration::from_millis(ttl_ms.max(1)),
        };

        // entry 持有分片写锁，读-判断-写在锁内完成
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(fresh);
        if entry.is_expired(now) {
            *entry = fresh();
        }

        let current: u64 = entry
            .value
            .parse()
            .map_err(|_| StoreError::Backend(format!("value at {key} is not an integer")))?;

        if current >= limit {
            return Ok(WindowCount {
                count: current,
                admitted: false,
            });
        }

        entry.value = (current + 1).to_string();
        Ok(WindowCount {
            count: current + 1,
            admitted: true,
        })
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        self.purge_expired();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| glob_match(pattern, e.key()))
            .map(|e| e.key().clone())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, StoreError> {
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }
}
