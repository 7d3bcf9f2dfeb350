use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub index: i32,
    pub size: i64,
    pub offset_lag: i64,
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMeta {
    pub partitions: Vec<PartitionMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cluster_id: String,
    pub captured_at: DateTime<Utc>,
    pub topics: BTreeMap<String, TopicMeta>,
    pub broker_count: u32,
    pub total_partitions: u64,
    pub leader_distribution: BTreeMap<i32, u64>,
}

impl MetricsSnapshot {
    /// Minimum/maximum/average partition size per topic, computed lazily on
    /// demand rather than stored.
    pub fn partition_size_stats(&self, topic: &str) -> Option<(i64, i64, f64)> {
        let meta = self.topics.get(topic)?;
        if meta.partitions.is_empty() {
            return None;
        }
        let sizes: Vec<i64> = meta.partitions.iter().map(|p| p.size).collect();
        let min = *sizes.iter().min().unwrap();
        let max = *sizes.iter().max().unwrap();
        let avg = sizes.iter().sum::<i64>() as f64 / sizes.len() as f64;
        Some((min, max, avg))
    }

    /// Partitions per broker, a simple health ratio derived from the
    /// leader distribution.
    pub fn partitions_per_broker(&self) -> f64 {
        if self.broker_count == 0 {
            return 0.0;
        }
        self.total_partitions as f64 / self.broker_count as f64
    }
}
