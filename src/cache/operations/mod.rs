/// 缓存操作
/// 存储适配、查询结果缓存、限流计数

pub mod content;
pub mod kv;
pub mod rate_limit;

pub use content::ContentCacheOperations;
pub use kv::KvAdapter;
pub use rate_limit::RateLimitCacheOperations;
