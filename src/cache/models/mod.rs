/// 缓存数据模型
pub mod rate_limit;
pub mod ttl;

pub use rate_limit::{RateWindow, WindowCount, align_window};
pub use ttl::{TtlTier, TtlTiers};
