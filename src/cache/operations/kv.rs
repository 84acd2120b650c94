use std::sync::Arc;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::cache::store::KvStore;
use crate::error::StoreError;

/// 键值存储适配器
///
/// 对上层屏蔽存储故障：读失败当作未命中，写和删失败只记日志。
/// 缓存只是优化，存储宕机不能阻塞请求。
#[derive(Clone)]
pub struct KvAdapter {
    store: Arc<dyn KvStore>,
}

impl KvAdapter {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// 读取并反序列化；不存在、反序列化失败、存储不可用都返回 `None`
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                store_failure("get", key, &e);
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, "cached value could not be deserialized, treating as miss: {}", e);
                None
            }
        }
    }

    /// 序列化后写入，覆盖旧值
    pub async fn set_with_ttl<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl_secs: u64) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, "value could not be serialized, skipping cache write: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set_ex(key, json, ttl_secs).await {
            store_failure("set", key, &e);
        }
    }

    /// 枚举匹配的键并一次性删除，尽力而为，返回删除数量
    pub async fn delete_by_pattern(&self, pattern: &str) -> usize {
        let keys = match self.store.scan_keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                store_failure("scan", pattern, &e);
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        match self.store.delete_keys(&keys).await {
            Ok(removed) => removed,
            Err(e) => {
                store_failure("delete", pattern, &e);
                0
            }
        }
    }
}

fn store_failure(op: &'static str, target: &str, err: &StoreError) {
    counter!("admission_store_failures_total", "op" => op).increment(1);
    warn!(op, target, "key-value store operation failed: {}", err);
}
