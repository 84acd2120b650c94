/// 缓存键模块
/// 所有键都是 "<命名空间>:<标识>" 形式，失效时按命名空间通配删除

pub mod category_keys;
pub mod post_keys;
pub mod rate_limit_keys;

pub use category_keys::{CATEGORIES_PATTERN, categories_all_key, category_invalidation_patterns, category_key};
pub use post_keys::{
    POSTS_PATTERN, featured_posts_key, post_invalidation_patterns, post_key, posts_list_key,
    trending_posts_key,
};
pub use rate_limit_keys::{RATE_LIMIT_PATTERN, window_key};

use serde::Serialize;
use serde_json::{Map, Value};

/// 规范化 JSON：对象字段按键排序、去掉 null 字段。
/// 相同的过滤条件总是得到同一个字符串，不同的条件不会相撞。
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(value) => canonicalize(value).to_string(),
        // 只有带非字符串键的 map 才会失败，过滤条件里不存在这种类型
        Err(e) => {
            tracing::warn!("failed to canonicalize cache key input: {}", e);
            String::from("null")
        }
    }
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, canonicalize(v)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// 转义 glob 元字符，让标识在通配表达式里按字面匹配
pub fn escape_glob(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_json_sorts_and_drops_nulls() {
        let a = json!({ "search": null, "published": true, "limit": 10 });
        let b = json!({ "limit": 10, "published": true });
        assert_eq!(canonical_json(&a), canonical_json(&b));
        assert_eq!(canonical_json(&b), r#"{"limit":10,"published":true}"#);
    }

    #[test]
    fn canonical_json_recurses() {
        let value = json!({ "z": { "b": 1, "a": null, "c": [ { "y": 2, "x": 1 } ] } });
        assert_eq!(canonical_json(&value), r#"{"z":{"b":1,"c":[{"x":1,"y":2}]}}"#);
    }

    #[test]
    fn glob_metacharacters_are_escaped() {
        assert_eq!(escape_glob("hello-world"), "hello-world");
        assert_eq!(escape_glob("a*b?[c]"), r"a\*b\?\[c\]");
    }
}
