use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client as RedisClient, RedisResult, Script, aio::MultiplexedConnection};
use tokio::sync::OnceCell;

use super::KvStore;
use crate::cache::models::WindowCount;
use crate::error::StoreError;

/// 每轮 SCAN 建议返回的键数
const SCAN_BATCH: usize = 500;

/// 计数与过期在一个脚本里完成，多个实例并发请求也不会同时越过上限
const WINDOW_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local limit = tonumber(ARGV[1])
if current >= limit then
    return {current, 0}
end
current = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return {current, 1}
"#;

/// Redis 存储
///
/// 进程内共享一条多路复用连接。启动时尝试建立，失败后在下一次操作时重试。
pub struct RedisStore {
    client: RedisClient,
    conn: OnceCell<MultiplexedConnection>,
    timeout: Duration,
    window_script: Script,
}

impl RedisStore {
    pub fn open(redis_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = RedisClient::open(redis_url)?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            timeout,
            window_script: Script::new(WINDOW_SCRIPT),
        })
    }

    /// 提前建立连接；失败只记录日志，请求路径上会再次尝试
    pub async fn warm_up(&self) {
        match self.connection().await {
            Ok(_) => tracing::info!("redis connection established"),
            Err(e) => tracing::warn!("redis not reachable at startup, will retry lazily: {}", e),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                tokio::time::timeout(self.timeout, self.client.get_multiplexed_async_connection())
                    .await
                    .map_err(|_| StoreError::Timeout(self.timeout))?
                    .map_err(StoreError::from)
            })
            .await?;
        Ok(conn.clone())
    }

    async fn run<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        self.run(async move { conn.get::<_, Option<String>>(key).await })
            .await
    }

    async fn set_ex(&self, key: &str, value: String, ttl_secs: u64) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        // SETEX 不接受 0
        let ttl_secs = ttl_secs.max(1);
        self.run(async move { conn.set_ex::<_, _, ()>(key, value, ttl_secs).await })
            .await
    }

    async fn increment_window(
        &self,
        key: &str,
        limit: u64,
        ttl_ms: u64,
    ) -> Result<WindowCount, StoreError> {
        let mut conn = self.connection().await?;
        let mut invocation = self.window_script.key(key);
        invocation.arg(limit).arg(ttl_ms.max(1));

        let (count, admitted): (u64, i64) = self
            .run(async move { invocation.invoke_async(&mut conn).await })
            .await?;

        Ok(WindowCount {
            count,
            admitted: admitted == 1,
        })
    }

    async fn scan_keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.connection().await?;
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = self
                .run(async {
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn)
                        .await
                })
                .await?;

            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN 可能重复返回同一个键
        keys.sort_unstable();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let keys = keys.to_vec();
        let removed: usize = self.run(async move { conn.del(keys).await }).await?;
        Ok(removed)
    }
}
