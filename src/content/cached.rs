use std::sync::Arc;

use super::{
    Category, ContentError, ContentRepository, MAX_TRENDING_LIMIT, NewCategory, NewPost, Post,
    PostFilter, PostUpdate,
};
use crate::cache::ContentCacheOperations;
use crate::cache::TtlTier;
use crate::cache::keys::{
    categories_all_key, category_key, featured_posts_key, post_key, posts_list_key,
    trending_posts_key,
};

/// 带缓存的内容服务
///
/// 读：先查缓存，未命中再查仓库并按层级回填；查不到的结果不缓存。
/// 写：仓库写入成功后先失效相关键，再返回结果。
#[derive(Clone)]
pub struct CachedContent {
    repo: Arc<dyn ContentRepository>,
    cache: ContentCacheOperations,
}

impl CachedContent {
    pub fn new(repo: Arc<dyn ContentRepository>, cache: ContentCacheOperations) -> Self {
        Self { repo, cache }
    }

    pub async fn list_posts(&self, filter: PostFilter) -> Result<Vec<Post>, ContentError> {
        let filter = filter.normalized();
        let key = posts_list_key(&filter);
        self.cache
            .remember(&key, TtlTier::Medium, || self.repo.list_posts(&filter))
            .await
    }

    pub async fn post_by_slug(&self, slug: &str) -> Result<Post, ContentError> {
        let key = post_key(slug);
        if let Some(post) = self.cache.get::<Post>(&key).await {
            return Ok(post);
        }

        let post = self
            .repo
            .post_by_slug(slug)
            .await?
            .ok_or(ContentError::NotFound("Post"))?;
        self.cache.set(&key, &post, TtlTier::Medium).await;
        Ok(post)
    }

    /// 浏览量变化快，用短层级，靠过期刷新。条数先收敛到合法范围，
    /// 等价的请求共用一个键
    pub async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentError> {
        let limit = limit.clamp(1, MAX_TRENDING_LIMIT);
        let key = trending_posts_key(limit);
        self.cache
            .remember(&key, TtlTier::Short, || self.repo.trending_posts(limit))
            .await
    }

    pub async fn featured_posts(&self) -> Result<Vec<Post>, ContentError> {
        self.cache
            .remember(&featured_posts_key(), TtlTier::Medium, || {
                self.repo.featured_posts()
            })
            .await
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, ContentError> {
        self.cache
            .remember(&categories_all_key(), TtlTier::Long, || {
                self.repo.list_categories()
            })
            .await
    }

    pub async fn category_by_slug(&self, slug: &str) -> Result<Category, ContentError> {
        let key = category_key(slug);
        if let Some(category) = self.cache.get::<Category>(&key).await {
            return Ok(category);
        }

        let category = self
            .repo
            .category_by_slug(slug)
            .await?
            .ok_or(ContentError::NotFound("Category"))?;
        self.cache.set(&key, &category, TtlTier::Long).await;
        Ok(category)
    }

    pub async fn create_post(&self, post: NewPost) -> Result<Post, ContentError> {
        let created = self.repo.create_post(post).await?;
        self.cache.invalidate_post(&[&created.slug]).await;
        Ok(created)
    }

    /// 标题变化会改 slug，新旧两个键都要删
    pub async fn update_post(&self, slug: &str, update: PostUpdate) -> Result<Post, ContentError> {
        let updated = self.repo.update_post(slug, update).await?;
        self.cache.invalidate_post(&[slug, &updated.slug]).await;
        Ok(updated)
    }

    pub async fn delete_post(&self, slug: &str) -> Result<Post, ContentError> {
        let deleted = self.repo.delete_post(slug).await?;
        self.cache.invalidate_post(&[&deleted.slug]).await;
        Ok(deleted)
    }

    pub async fn toggle_publish(&self, slug: &str) -> Result<Post, ContentError> {
        let post = self.repo.toggle_publish(slug).await?;
        self.cache.invalidate_post(&[&post.slug]).await;
        Ok(post)
    }

    /// 只计数，不失效；热度榜随短层级过期更新
    pub async fn record_view(&self, slug: &str) -> Result<u64, ContentError> {
        self.repo.record_view(slug).await
    }

    pub async fn create_category(&self, category: NewCategory) -> Result<Category, ContentError> {
        let created = self.repo.create_category(category).await?;
        self.cache.invalidate_category(&created.slug).await;
        Ok(created)
    }

    pub async fn delete_category(&self, slug: &str) -> Result<Category, ContentError> {
        let deleted = self.repo.delete_category(slug).await?;
        self.cache.invalidate_category(&deleted.slug).await;
        Ok(deleted)
    }
}
