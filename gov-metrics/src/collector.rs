use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use gov_adapters::KafkaTopicAdapter;
use gov_common::{MetricsSnapshot, PartitionMeta, TopicMeta};
use gov_connections::ConnectionManager;

use crate::cache::{LocalCache, SharedCache};
use crate::error::MetricsError;
use crate::snapshot_store::SnapshotStore;

pub const DEFAULT_L1_TTL: Duration = Duration::from_secs(15);
pub const DEFAULT_L2_TTL: Duration = Duration::from_secs(15);
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_RETENTION_DAYS: i64 = 7;

/// Joins `describe_cluster`/`list_topics`/`describe_topics`/
/// `describe_log_dirs` into one [`MetricsSnapshot`].
async fn assemble_snapshot(
    adapter: &dyn KafkaTopicAdapter,
    cluster_id: &str,
) -> Result<MetricsSnapshot, MetricsError> {
    let brokers = adapter.describe_cluster().await?;
    let names = adapter.list_topics().await?;
    let descriptions = adapter.describe_topics(&names).await?;
    let log_dirs = adapter.describe_log_dirs().await?;

    let mut log_dir_index: HashMap<(String, i32), (i64, i64)> = HashMap::new();
    for entry in log_dirs {
        log_dir_index.insert((entry.topic, entry.partition), (entry.size, entry.offset_lag));
    }

    let mut topics: BTreeMap<String, TopicMeta> = BTreeMap::new();
    let mut total_partitions: u64 = 0;
    let mut leader_distribution: BTreeMap<i32, u64> = BTreeMap::new();

    for (name, description) in descriptions {
        let mut partitions = Vec::with_capacity(description.partitions.len());
        for partition in description.partitions {
            let (size, offset_lag) = log_dir_index
                .get(&(name.clone(), partition.id))
                .copied()
                .unwrap_or((0, 0));
            *leader_distribution.entry(partition.leader).or_insert(0) += 1;
            partitions.push(PartitionMeta {
                index: partition.id,
                size,
                offset_lag,
                leader: partition.leader,
                replicas: partition.replicas,
                isr: partition.isrs,
            });
        }
        total_partitions += partitions.len() as u64;
        topics.insert(name, TopicMeta { partitions });
    }

    Ok(MetricsSnapshot {
        cluster_id: cluster_id.to_string(),
        captured_at: Utc::now(),
        topics,
        broker_count: brokers.len() as u32,
        total_partitions,
        leader_distribution,
    })
}

/// Serves [`MetricsSnapshot`]s through the L1/L2/L3 cache hierarchy and
/// drives the periodic collection/retention jobs.
///
/// Read/write helpers that already hold a resolved adapter
/// (`*_with_adapter`) do the actual snapshot work and are what the test
/// suite exercises against `MockKafkaTopicAdapter`; the cluster-id-only
/// entry points resolve the adapter via the connection manager and are
/// what the HTTP handlers and the periodic ticker call.
pub struct MetricsCollector {
    connections: Arc<ConnectionManager>,
    l1: LocalCache,
    l2: Arc<dyn SharedCache>,
    l3: Arc<dyn SnapshotStore>,
    l2_ttl: Duration,
    retention_days: i64,
}

impl MetricsCollector {
    pub fn new(
        connections: Arc<ConnectionManager>,
        l2: Arc<dyn SharedCache>,
        l3: Arc<dyn SnapshotStore>,
    ) -> Self {
        Self {
            connections,
            l1: LocalCache::new(DEFAULT_L1_TTL),
            l2,
            l3,
            l2_ttl: DEFAULT_L2_TTL,
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Read path: L1 -> L2 -> fetch-and-fill-both.
    #[instrument(skip(self))]
    pub async fn get(&self, cluster_id: &str) -> Result<MetricsSnapshot, MetricsError> {
        if let Some(snapshot) = self.l1.get(cluster_id).await {
            return Ok(snapshot);
        }
        if let Some(snapshot) = self.l2.get(cluster_id).await {
            self.l1.put(snapshot.clone()).await;
            return Ok(snapshot);
        }
        self.refresh(cluster_id).await
    }

    /// Bypasses both caches, fetches from Kafka, and rewrites L1 and L2.
    #[instrument(skip(self))]
    pub async fn refresh(&self, cluster_id: &str) -> Result<MetricsSnapshot, MetricsError> {
        let adapter = self.connections.get_kafka_admin(cluster_id).await?;
        let snapshot = assemble_snapshot(adapter.as_ref(), cluster_id).await?;
        self.l1.put(snapshot.clone()).await;
        self.l2.put(&snapshot, self.l2_ttl).await;
        Ok(snapshot)
    }

    /// Write path: builds a fresh snapshot, fills L1/L2, and persists it to
    /// L3. Invoked by the periodic ticker, once per active cluster.
    #[instrument(skip(self))]
    pub async fn collect(&self, cluster_id: &str) -> Result<MetricsSnapshot, MetricsError> {
        let adapter = self.connections.get_kafka_admin(cluster_id).await?;
        self.collect_with_adapter(cluster_id, adapter.as_ref()).await
    }

    async fn collect_with_adapter(
        &self,
        cluster_id: &str,
        adapter: &dyn KafkaTopicAdapter,
    ) -> Result<MetricsSnapshot, MetricsError> {
        let snapshot = assemble_snapshot(adapter, cluster_id).await?;
        self.l1.put(snapshot.clone()).await;
        self.l2.put(&snapshot, self.l2_ttl).await;
        self.l3
            .save(&snapshot)
            .await
            .map_err(MetricsError::Store)?;
        info!(cluster_id, total_partitions = snapshot.total_partitions, "metrics snapshot collected");
        Ok(snapshot)
    }

    /// Runs `collect` for every active cluster endpoint, logging (but not
    /// aborting on) a single cluster's failure.
    pub async fn collect_all(&self) {
        for cluster_id in self.connections.active_cluster_ids().await {
            if let Err(error) = self.collect(&cluster_id).await {
                warn!(cluster_id, %error, "metrics collection failed for cluster");
            }
        }
    }

    /// Deletes snapshots older than `retention_days` for `cluster_id`.
    /// Idempotent: a second run over an already-cleaned range is a no-op.
    #[instrument(skip(self))]
    pub async fn cleanup(&self, cluster_id: &str, now: DateTime<Utc>) -> Result<u64, MetricsError> {
        self.l3
            .delete_older_than(cluster_id, self.retention_days, now)
            .await
            .map_err(MetricsError::Store)
    }

    /// Runs `cleanup` for every active cluster endpoint.
    pub async fn cleanup_all(&self, now: DateTime<Utc>) {
        for cluster_id in self.connections.active_cluster_ids().await {
            if let Err(error) = self.cleanup(&cluster_id, now).await {
                warn!(cluster_id, %error, "metrics retention cleanup failed for cluster");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::mock::InMemorySharedCache;
    use crate::snapshot_store::mock::InMemorySnapshotStore;
    use gov_adapters::mock::MockKafkaTopicAdapter;
    use gov_adapters::{PartitionDescription, TopicDescription};
    use gov_common::{Endpoint, EndpointKind};
    use gov_connections::endpoint_store::mock::InMemoryEndpointStore;
    use gov_connections::EndpointStore;
    use serde_json::json;

    fn topic_with_partitions(partitions: u32, replication_factor: u16) -> TopicDescription {
        TopicDescription {
            partition_count: partitions,
            replication_factor,
            config: BTreeMap::new(),
            partitions: (0..partitions as i32)
                .map(|id| PartitionDescription {
                    id,
                    leader: id % 3,
                    replicas: vec![0, 1, 2],
                    isrs: vec![0, 1, 2],
                })
                .collect(),
        }
    }

    fn collector() -> (MetricsCollector, Arc<InMemorySnapshotStore>) {
        let connections = Arc::new(ConnectionManager::new(Arc::new(InMemoryEndpointStore::default())));
        let l3 = Arc::new(InMemorySnapshotStore::default());
        (
            MetricsCollector::new(connections, Arc::new(InMemorySharedCache::default()), l3.clone()),
            l3,
        )
    }

    #[tokio::test]
    async fn assemble_snapshot_joins_descriptions_and_log_dirs() {
        let adapter = MockKafkaTopicAdapter::default().with_topic("orders", topic_with_partitions(2, 3));
        let snapshot = assemble_snapshot(&adapter, "c1").await.unwrap();
        assert_eq!(snapshot.cluster_id, "c1");
        assert_eq!(snapshot.total_partitions, 2);
        assert_eq!(snapshot.topics["orders"].partitions.len(), 2);
    }

    #[tokio::test]
    async fn collect_with_adapter_fills_all_three_layers() {
        let (collector, l3) = collector();
        let adapter = MockKafkaTopicAdapter::default().with_topic("orders", topic_with_partitions(3, 3));

        let snapshot = collector.collect_with_adapter("c1", &adapter).await.unwrap();
        assert_eq!(snapshot.total_partitions, 3);
        assert!(l3.latest("c1").await.is_some());
        assert!(collector.l1.get("c1").await.is_some());
    }

    #[tokio::test]
    async fn get_serves_from_l1_once_filled() {
        let (collector, _l3) = collector();
        let adapter = MockKafkaTopicAdapter::default().with_topic("orders", topic_with_partitions(1, 3));
        let first = collector.collect_with_adapter("c1", &adapter).await.unwrap();
        let cached = collector.get("c1").await.unwrap();
        assert_eq!(cached, first);
    }

    #[tokio::test]
    async fn cleanup_is_idempotent() {
        let (collector, _l3) = collector();
        let adapter = MockKafkaTopicAdapter::default().with_topic("orders", topic_with_partitions(1, 3));
        collector.collect_with_adapter("c1", &adapter).await.unwrap();

        let now = Utc::now();
        let first = collector.cleanup("c1", now).await.unwrap();
        let second = collector.cleanup("c1", now).await.unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 0);
    }

    #[tokio::test]
    async fn collect_propagates_not_found_for_missing_cluster() {
        let connections = Arc::new(ConnectionManager::new(Arc::new(InMemoryEndpointStore::default())));
        let collector = MetricsCollector::new(
            connections,
            Arc::new(InMemorySharedCache::default()),
            Arc::new(InMemorySnapshotStore::default()),
        );
        let err = collector.collect("missing").await.unwrap_err();
        assert!(matches!(err, MetricsError::Connection(_)));
    }

    #[tokio::test]
    async fn active_cluster_ids_drives_collect_all() {
        let store = Arc::new(
            InMemoryEndpointStore::default().with(Endpoint {
                id: "c1".to_string(),
                kind: EndpointKind::Cluster,
                coordinates: json!({ "bootstrap_servers": "localhost:9092" }),
                credentials: json!({}),
                tls: None,
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
        );
        assert_eq!(store.list_active(EndpointKind::Cluster).await, vec!["c1".to_string()]);
    }
}
