use serde::{Deserialize, Serialize};

/// 缓存时效档位，由调用方按数据变化频率选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtlTier {
    /// 热度榜等高频变化的计算结果
    Short,
    /// 文章内容、列表
    #[default]
    Medium,
    /// 分类等低频变化数据（写入时显式失效）
    Long,
}

/// 各档位对应的秒数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTiers {
    pub short: u64,
    pub medium: u64,
    pub long: u64,
}

impl Default for TtlTiers {
    fn default() -> Self {
        Self {
            short: 60 * 5,
            medium: 60 * 30,
            long: 60 * 60 * 24,
        }
    }
}

impl TtlTiers {
    pub fn seconds(&self, tier: TtlTier) -> u64 {
        match tier {
            TtlTier::Short => self.short,
            TtlTier::Medium => self.medium,
            TtlTier::Long => self.long,
        }
    }
}
