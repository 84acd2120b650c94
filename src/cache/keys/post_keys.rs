use serde::Serialize;

use super::{canonical_json, escape_glob};

/// 单篇文章缓存键前缀
const POST_PREFIX: &str = "post:";

/// 文章聚合结果（列表、精选、热度榜）缓存键前缀
const POSTS_PREFIX: &str = "posts:";

/// 任何文章变更都会影响全部聚合结果
pub const POSTS_PATTERN: &str = "posts:*";

/// 全部单篇文章
pub const POST_PATTERN: &str = "post:*";

/// 生成单篇文章缓存键
pub fn post_key(slug: &str) -> String {
    format!("{}{}", POST_PREFIX, slug)
}

/// 生成文章列表缓存键，过滤条件按规范化 JSON 编码
pub fn posts_list_key<F: Serialize>(filter: &F) -> String {
    format!("{}{}", POSTS_PREFIX, canonical_json(filter))
}

pub fn featured_posts_key() -> String {
    format!("{}featured", POSTS_PREFIX)
}

pub fn trending_posts_key(limit: u32) -> String {
    format!("{}trending:{}", POSTS_PREFIX, limit)
}

/// 文章写入后需要删除的键模式
pub fn post_invalidation_patterns(slugs: &[&str]) -> Vec<String> {
    let mut patterns: Vec<String> = slugs
        .iter()
        .map(|slug| post_key(&escape_glob(slug)))
        .collect();
    patterns.dedup();
    patterns.push(POSTS_PATTERN.to_string());
    patterns
}
