use std::future::Future;

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::kv::KvAdapter;
use crate::cache::keys::{category_invalidation_patterns, post_invalidation_patterns};
use crate::cache::models::{TtlTier, TtlTiers};

/// 查询结果缓存操作
///
/// 读穿透：调用方先 `get`，未命中时自行查询再 `set`。
/// 写后失效：文章或分类写入成功后、返回给客户端之前调用 `invalidate_*`。
/// 与失效并发的读请求最多多看到一次旧数据，直到下一次失效或过期。
#[derive(Clone)]
pub struct ContentCacheOperations {
    kv: KvAdapter,
    tiers: TtlTiers,
}

impl ContentCacheOperations {
    pub fn new(kv: KvAdapter, tiers: TtlTiers) -> Self {
        Self { kv, tiers }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.kv.get(key).await;
        if value.is_some() {
            counter!("cache_hit_total").increment(1);
            debug!(key, "cache hit");
        } else {
            counter!("cache_miss_total").increment(1);
            debug!(key, "cache miss");
        }
        value
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, tier: TtlTier) {
        self.kv
            .set_with_ttl(key, value, self.tiers.seconds(tier))
            .await;
    }

    pub async fn invalidate(&self, pattern: &str) {
        let removed = self.kv.delete_by_pattern(pattern).await;
        counter!("cache_invalidations_total").increment(1);
        debug!(pattern, removed, "cache invalidated");
    }

    /// 文章写入后调用；改名时同时传入新旧 slug
    pub async fn invalidate_post(&self, slugs: &[&str]) {
        for pattern in post_invalidation_patterns(slugs) {
            self.invalidate(&pattern).await;
        }
    }

    /// 分类写入后调用
    pub async fn invalidate_category(&self, slug: &str) {
        for pattern in category_invalidation_patterns(slug) {
            self.invalidate(&pattern).await;
        }
    }

    /// 命中直接返回；未命中执行 `fetch` 并回填。`fetch` 出错时不写缓存
    pub async fn remember<T, E, F, Fut>(&self, key: &str, tier: TtlTier, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(cached) = self.get::<T>(key).await {
            return Ok(cached);
        }

        let fresh = fetch().await?;
        self.set(key, &fresh, tier).await;
        Ok(fresh)
    }
}
