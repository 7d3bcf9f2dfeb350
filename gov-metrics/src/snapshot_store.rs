use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gov_common::MetricsSnapshot;

/// Persistence boundary for the `metrics_snapshot(cluster_id, captured_at
/// PK, payload JSON)` table. The DB session layer itself is treated as an
/// external collaborator; callers depend only on this trait, mirroring the
/// `MetadataStore`/`EndpointStore` boundaries elsewhere in the workspace.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &MetricsSnapshot) -> Result<(), String>;

    async fn latest(&self, cluster_id: &str) -> Option<MetricsSnapshot>;

    async fn history(
        &self,
        cluster_id: &str,
        since: DateTime<Utc>,
    ) -> Vec<MetricsSnapshot>;

    /// Deletes snapshots captured more than `retention_days` before `now`.
    /// Idempotent: re-running against an already-cleaned range deletes
    /// nothing and returns `Ok(0)`.
    async fn delete_older_than(
        &self,
        cluster_id: &str,
        retention_days: i64,
        now: DateTime<Utc>,
    ) -> Result<u64, String>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemorySnapshotStore {
        pub rows: Mutex<BTreeMap<String, Vec<MetricsSnapshot>>>,
        pub fail_save: Mutex<bool>,
    }

    impl InMemorySnapshotStore {
        pub fn failing_save(self) -> Self {
            *self.fail_save.lock().unwrap() = true;
            self
        }
    }

    #[async_trait]
    impl SnapshotStore for InMemorySnapshotStore {
        async fn save(&self, snapshot: &MetricsSnapshot) -> Result<(), String> {
            if *self.fail_save.lock().unwrap() {
                return Err("simulated snapshot store outage".to_string());
            }
            self.rows
                .lock()
                .unwrap()
                .entry(snapshot.cluster_id.clone())
                .or_default()
                .push(snapshot.clone());
            Ok(())
        }

        async fn latest(&self, cluster_id: &str) -> Option<MetricsSnapshot> {
            self.rows
                .lock()
                .unwrap()
                .get(cluster_id)
                .and_then(|rows| rows.iter().max_by_key(|s| s.captured_at).cloned())
        }

        async fn history(&self, cluster_id: &str, since: DateTime<Utc>) -> Vec<MetricsSnapshot> {
            self.rows
                .lock()
                .unwrap()
                .get(cluster_id)
                .map(|rows| rows.iter().filter(|s| s.captured_at >= since).cloned().collect())
                .unwrap_or_default()
        }

        async fn delete_older_than(
            &self,
            cluster_id: &str,
            retention_days: i64,
            now: DateTime<Utc>,
        ) -> Result<u64, String> {
            let cutoff = now - chrono::Duration::days(retention_days);
            let mut rows = self.rows.lock().unwrap();
            let Some(entries) = rows.get_mut(cluster_id) else {
                return Ok(0);
            };
            let before = entries.len();
            entries.retain(|s| s.captured_at >= cutoff);
            Ok((before - entries.len()) as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::InMemorySnapshotStore;
    use std::collections::BTreeMap;

    fn snapshot(cluster_id: &str, captured_at: DateTime<Utc>) -> MetricsSnapshot {
        MetricsSnapshot {
            cluster_id: cluster_id.to_string(),
            captured_at,
            topics: BTreeMap::new(),
            broker_count: 1,
            total_partitions: 0,
            leader_distribution: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn delete_older_than_is_idempotent() {
        let store = InMemorySnapshotStore::default();
        let now = Utc::now();
        store.save(&snapshot("c1", now - chrono::Duration::days(10))).await.unwrap();
        store.save(&snapshot("c1", now)).await.unwrap();

        let deleted = store.delete_older_than("c1", 7, now).await.unwrap();
        assert_eq!(deleted, 1);
        let deleted_again = store.delete_older_than("c1", 7, now).await.unwrap();
        assert_eq!(deleted_again, 0);
        assert_eq!(store.history("c1", now - chrono::Duration::days(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn latest_returns_most_recent_snapshot() {
        let store = InMemorySnapshotStore::default();
        let now = Utc::now();
        store.save(&snapshot("c1", now - chrono::Duration::hours(1))).await.unwrap();
        store.save(&snapshot("c1", now)).await.unwrap();
        assert_eq!(store.latest("c1").await.unwrap().captured_at, now);
    }
}
