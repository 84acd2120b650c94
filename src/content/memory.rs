use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{
    Category, ContentError, ContentRepository, MAX_TRENDING_LIMIT, NewCategory, NewPost, Post,
    PostFilter, PostUpdate,
};

const FEATURED_COUNT: usize = 3;

#[derive(Debug, Clone)]
struct PostRecord {
    id: i64,
    title: String,
    slug: String,
    content: String,
    excerpt: Option<String>,
    thumbnail: Option<String>,
    published: bool,
    views: u64,
    category_ids: Vec<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    posts: BTreeMap<i64, PostRecord>,
    categories: BTreeMap<i64, Category>,
    next_post_id: i64,
    next_category_id: i64,
}

impl State {
    fn to_post(&self, record: &PostRecord) -> Post {
        Post {
            id: record.id,
            title: record.title.clone(),
            slug: record.slug.clone(),
            content: record.content.clone(),
            excerpt: record.excerpt.clone(),
            thumbnail: record.thumbnail.clone(),
            published: record.published,
            views: record.views,
            categories: record
                .category_ids
                .iter()
                .filter_map(|id| self.categories.get(id).map(Category::summary))
                .collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn post_id_by_slug(&self, slug: &str) -> Option<i64> {
        self.posts.values().find(|p| p.slug == slug).map(|p| p.id)
    }

    fn check_categories(&self, ids: &[i64]) -> Result<Vec<i64>, ContentError> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        match ids.iter().find(|id| !self.categories.contains_key(id)) {
            Some(missing) => Err(ContentError::Invalid(format!("unknown category id {missing}"))),
            None => Ok(ids),
        }
    }

    /// 新发布的在前
    fn newest_first(&self) -> Vec<&PostRecord> {
        let mut posts: Vec<&PostRecord> = self.posts.values().collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        posts
    }
}

/// 内存中的文章仓库，供单机运行和测试使用
#[derive(Default)]
pub struct MemoryContentRepository {
    state: RwLock<State>,
}

impl MemoryContentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

/// 由标题生成 slug，冲突时追加毫秒时间戳
fn unique_slug(text: &str, taken: impl Fn(&str) -> bool) -> Result<String, ContentError> {
    let base = slug::slugify(text);
    if base.is_empty() {
        return Err(ContentError::Invalid(
            "title must contain at least one letter or digit".to_string(),
        ));
    }
    if !taken(&base) {
        return Ok(base);
    }

    let stamped = format!("{}-{}", base, Utc::now().timestamp_millis());
    let mut candidate = stamped.clone();
    let mut n = 2;
    while taken(&candidate) {
        candidate = format!("{stamped}-{n}");
        n += 1;
    }
    Ok(candidate)
}

fn matches_search(record: &PostRecord, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    record.title.to_lowercase().contains(&needle)
        || record.content.to_lowercase().contains(&needle)
        || record
            .excerpt
            .as_deref()
            .is_some_and(|e| e.to_lowercase().contains(&needle))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl ContentRepository for MemoryContentRepository {
    async fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>, ContentError> {
        let filter = filter.clone().normalized();
        let state = self.state.read().await;

        Ok(state
            .newest_first()
            .into_iter()
            .filter(|p| filter.published.is_none_or(|published| p.published == published))
            .filter(|p| filter.category_id.is_none_or(|id| p.category_ids.contains(&id)))
            .filter(|p| filter.search.as_deref().is_none_or(|s| matches_search(p, s)))
            .skip(filter.offset.unwrap_or(0) as usize)
            .take(filter.limit.unwrap_or(PostFilter::DEFAULT_LIMIT) as usize)
            .map(|p| state.to_post(p))
            .collect())
    }

    async fn post_by_slug(&self, slug: &str) -> Result<Option<Post>, ContentError> {
        let state = self.state.read().await;
        Ok(state
            .posts
            .values()
            .find(|p| p.slug == slug)
            .map(|p| state.to_post(p)))
    }

    async fn trending_posts(&self, limit: u32) -> Result<Vec<Post>, ContentError> {
        let state = self.state.read().await;
        let mut posts: Vec<&PostRecord> = state
            .newest_first()
            .into_iter()
            .filter(|p| p.published)
            .collect();
        // 稳定排序，浏览量相同的保持新旧顺序
        posts.sort_by(|a, b| b.views.cmp(&a.views));

        Ok(posts
            .into_iter()
            .take(limit.clamp(1, MAX_TRENDING_LIMIT) as usize)
            .map(|p| state.to_post(p))
            .collect())
    }

    async fn featured_posts(&self) -> Result<Vec<Post>, ContentError> {
        let state = self.state.read().await;
        Ok(state
            .newest_first()
            .into_iter()
            .filter(|p| p.published)
            .take(FEATURED_COUNT)
            .map(|p| state.to_post(p))
            .collect())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, ContentError> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn category_by_slug(&self, slug: &str) -> Result<Option<Category>, ContentError> {
        let state = self.state.read().await;
        Ok(state.categories.values().find(|c| c.slug == slug).cloned())
    }

    async fn create_post(&self, post: NewPost) -> Result<Post, ContentError> {
        post.validate()?;
        let mut state = self.state.write().await;

        let category_ids = state.check_categories(&post.category_ids)?;
        let slug = unique_slug(&post.title, |s| state.post_id_by_slug(s).is_some())?;
        state.next_post_id += 1;
        let now = Utc::now();

        let record = PostRecord {
            id: state.next_post_id,
            title: post.title.trim().to_string(),
            slug,
            content: post.content,
            excerpt: blank_to_none(post.excerpt),
            thumbnail: blank_to_none(post.thumbnail),
            published: post.published,
            views: 0,
            category_ids,
            created_at: now,
            updated_at: now,
        };

        let created = state.to_post(&record);
        state.posts.insert(record.id, record);
        Ok(created)
    }

    async fn update_post(&self, slug: &str, update: PostUpdate) -> Result<Post, ContentError> {
        update.validate()?;
        let mut state = self.state.write().await;

        let id = state.post_id_by_slug(slug).ok_or(ContentError::NotFound("Post"))?;
        let category_ids = match &update.category_ids {
            Some(ids) => Some(state.check_categories(ids)?),
            None => None,
        };
        let new_slug = match &update.title {
            Some(title) => Some(unique_slug(title, |s| {
                state.post_id_by_slug(s).is_some_and(|other| other != id)
            })?),
            None => None,
        };

        let record = state
            .posts
            .get_mut(&id)
            .ok_or(ContentError::NotFound("Post"))?;
        if let Some(title) = update.title {
            record.title = title.trim().to_string();
        }
        if let Some(slug) = new_slug {
            record.slug = slug;
        }
        if let Some(content) = update.content {
            record.content = content;
        }
        if update.excerpt.is_some() {
            record.excerpt = blank_to_none(update.excerpt);
        }
        if update.thumbnail.is_some() {
            record.thumbnail = blank_to_none(update.thumbnail);
        }
        if let Some(published) = update.published {
            record.published = published;
        }
        if let Some(ids) = category_ids {
            record.category_ids = ids;
        }
        record.updated_at = Utc::now();

        let record = record.clone();
        Ok(state.to_post(&record))
    }

    async fn delete_post(&self, slug: &str) -> Result<Post, ContentError> {
        let mut state = self.state.write().await;
        let id = state.post_id_by_slug(slug).ok_or(ContentError::NotFound("Post"))?;
        let record = state
            .posts
            .remove(&id)
            .ok_or(ContentError::NotFound("Post"))?;
        Ok(state.to_post(&record))
    }

    async fn toggle_publish(&self, slug: &str) -> Result<Post, ContentError> {
        let mut state = self.state.write().await;
        let id = state.post_id_by_slug(slug).ok_or(ContentError::NotFound("Post"))?;
        let record = state
            .posts
            .get_mut(&id)
            .ok_or(ContentError::NotFound("Post"))?;
        record.published = !record.published;
        record.updated_at = Utc::now();

        let record = record.clone();
        Ok(state.to_post(&record))
    }

    async fn record_view(&self, slug: &str) -> Result<u64, ContentError> {
        let mut state = self.state.write().await;
        let record = state
            .posts
            .values_mut()
            .find(|p| p.slug == slug)
            .ok_or(ContentError::NotFound("Post"))?;
        record.views += 1;
        Ok(record.views)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, ContentError> {
        category.validate()?;
        let mut state = self.state.write().await;

        let slug = unique_slug(&category.name, |s| {
            state.categories.values().any(|c| c.slug == s)
        })?;
        state.next_category_id += 1;
        let now = Utc::now();

        let created = Category {
            id: state.next_category_id,
            name: category.name.trim().to_string(),
            slug,
            description: blank_to_none(category.description),
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn delete_category(&self, slug: &str) -> Result<Category, ContentError> {
        let mut state = self.state.write().await;
        let id = state
            .categories
            .values()
            .find(|c| c.slug == slug)
            .map(|c| c.id)
            .ok_or(ContentError::NotFound("Category"))?;

        let removed = state
            .categories
            .remove(&id)
            .ok_or(ContentError::NotFound("Category"))?;
        for post in state.posts.values_mut() {
            post.category_ids.retain(|c| *c != id);
        }
        Ok(removed)
    }
}
