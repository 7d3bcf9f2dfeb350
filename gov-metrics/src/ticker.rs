use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::collector::MetricsCollector;

/// Mirrors `hook-janitor`'s `Cleaner` trait: one periodic unit of work with
/// no return value, driven by a `cleanup_loop`-style ticker in the binary
/// crate.
#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn cleanup(&self);
}

/// Drives the 5-minute snapshot-collection job.
pub struct CollectionCleaner {
    collector: Arc<MetricsCollector>,
}

impl CollectionCleaner {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Cleaner for CollectionCleaner {
    async fn cleanup(&self) {
        self.collector.collect_all().await;
    }
}

/// Drives the daily (02:00 UTC) retention-deletion job.
pub struct RetentionCleaner {
    collector: Arc<MetricsCollector>,
}

impl RetentionCleaner {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }
}

#[async_trait]
impl Cleaner for RetentionCleaner {
    async fn cleanup(&self) {
        self.collector.cleanup_all(Utc::now()).await;
    }
}
