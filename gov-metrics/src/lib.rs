pub mod cache;
pub mod collector;
pub mod error;
pub mod snapshot_store;
pub mod ticker;

pub use cache::{RedisSharedCache, SharedCache};
pub use collector::{
    MetricsCollector, DEFAULT_COLLECT_INTERVAL, DEFAULT_L1_TTL, DEFAULT_L2_TTL,
    DEFAULT_RETENTION_DAYS,
};
pub use error::MetricsError;
pub use snapshot_store::SnapshotStore;
pub use ticker::{Cleaner, CollectionCleaner, RetentionCleaner};
