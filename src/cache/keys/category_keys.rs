use super::{
    escape_glob,
    post_keys::{POST_PATTERN, POSTS_PATTERN},
};

/// 单个分类缓存键前缀
const CATEGORY_PREFIX: &str = "category:";

pub const CATEGORIES_PATTERN: &str = "categories:*";

pub fn categories_all_key() -> String {
    "categories:all".to_string()
}

pub fn category_key(slug: &str) -> String {
    format!("{}{}", CATEGORY_PREFIX, slug)
}

/// 分类写入后需要删除的键模式；列表和单篇文章都内嵌分类信息，一并失效
pub fn category_invalidation_patterns(slug: &str) -> Vec<String> {
    vec![
        category_key(&escape_glob(slug)),
        CATEGORIES_PATTERN.to_string(),
        POSTS_PATTERN.to_string(),
        POST_PATTERN.to_string(),
    ]
}
