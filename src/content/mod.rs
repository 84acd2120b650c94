//! 文章与分类的数据访问
//!
//! `ContentRepository` 是查询层的接口，`CachedContent` 在它前面加上
//! 读穿透缓存和写后失效。

mod cached;
mod memory;
mod models;

pub use cached::CachedContent;
pub use memory::MemoryContentRepository;
pub use models::{Category, CategorySummary, NewCategory, NewPost, Post, PostFilter, PostUpdate};

use async_trait::async_trait;
use thiserror::Error;

/// 热度榜最多返回的条数
pub const MAX_TRENDING_LIMIT: u32 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Invalid(String),
}

#[async_trait]
pub trait ContentRepository: Send + Sync {
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, ContentError>;
    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError>;
    /// 已发布文章按浏览量排序，`limit` 限制在 1..=MAX_TRENDING_LIMIT
    async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentError>;
    async fn featured_posts(&self) -> Result<Vec<Post>, ContentError>;
    async fn list_categories(&self) -> Result<Vec<Category>, ContentError>;
    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, ContentError>;

    async fn create_post(&self, post: NewPost) -> Result<Post, ContentError>;
    async fn update_post(&self, slug: &str, update: PostUpdate) -> Result<Post, ContentError>;
    async fn delete_post(&self, slug: &str) -> Result<Post, ContentError>;
    async fn toggle_publish(&self, slug: &str) -> Result<Post, ContentError>;
    /// 返回新的浏览量
    async fn record_view(&self, slug: &str) -> Result<u64, ContentError>;
    async fn create_category(&self, category: NewCategory) -> Result<Category, ContentError>;
    async fn delete_category(&self, slug: &str) -> Result<Category, ContentError>;
}
