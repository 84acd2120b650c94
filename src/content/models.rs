use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ContentError;

/// 文章列表里内嵌的分类信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn summary(&self) -> CategorySummary {
        CategorySummary {
            id: self.id,
            name: self.name.clone(),
            slug: self.slug.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub thumbnail: Option<String>,
    pub published: bool,
    pub views: u64,
    pub categories: Vec<CategorySummary>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub category_ids: Vec<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub thumbnail: Option<String>,
    pub published: Option<bool>,
    pub category_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// 文章列表过滤条件，序列化后参与缓存键
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFilter {
    pub published: Option<bool>,
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl PostFilter {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 100;

    /// 补齐默认值，让等价的查询落到同一个缓存键上
    pub fn normalized(self) -> Self {
        Self {
            published: self.published,
            category_id: self.category_id,
            search: self
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            limit: Some(
                self.limit
                    .unwrap_or(Self::DEFAULT_LIMIT)
                    .clamp(1, Self::MAX_LIMIT),
            ),
            offset: Some(self.offset.unwrap_or(0)),
        }
    }
}

const TITLE_MAX: usize = 200;
const CONTENT_MAX: usize = 50_000;
const EXCERPT_MAX: usize = 500;
const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 500;

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ContentError> {
    let len = value.chars().count();
    if len < min {
        return Err(ContentError::Invalid(format!("{field} is required")));
    }
    if len > max {
        return Err(ContentError::Invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(())
}

impl NewPost {
    pub fn validate(&self) -> Result<(), ContentError> {
        check_len("title", self.title.trim(), 1, TITLE_MAX)?;
        check_len("content", self.content.trim(), 1, CONTENT_MAX)?;
        if let Some(excerpt) = &self.excerpt {
            check_len("excerpt", excerpt, 0, EXCERPT_MAX)?;
        }
        Ok(())
    }
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), ContentError> {
        if let Some(title) = &self.title {
            check_len("title", title.trim(), 1, TITLE_MAX)?;
        }
        if let Some(content) = &self.content {
            check_len("content", content.trim(), 1, CONTENT_MAX)?;
        }
        if let Some(excerpt) = &self.excerpt {
            check_len("excerpt", excerpt, 0, EXCERPT_MAX)?;
        }
        Ok(())
    }
}

impl NewCategory {
    pub fn validate(&self) -> Result<(), ContentError> {
        check_len("name", self.name.trim(), 1, NAME_MAX)?;
        if let Some(description) = &self.description {
            check_len("description", description, 0, DESCRIPTION_MAX)?;
        }
        Ok(())
    }
}
