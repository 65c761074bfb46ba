//! # Textile Cache
//!
//! 換算係數緩存與待重算訂單追蹤

pub mod conversion_cache;
pub mod dirty_tracking;

// Re-export 主要類型
pub use conversion_cache::ConversionCache;
pub use dirty_tracking::DirtyTracker;
