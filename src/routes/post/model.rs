use serde::{Deserialize, Serialize};

/// 热度榜默认条数
pub const DEFAULT_TRENDING_LIMIT: u32 = 5;

#[derive(Debug, Deserialize)]
pub struct TrendingQuery {
    pub limit: Option<u32>,
}

impl TrendingQuery {
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_TRENDING_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct ViewCount {
    pub views: u64,
}
