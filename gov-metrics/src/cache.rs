use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use gov_common::MetricsSnapshot;
use tokio::sync::RwLock;
use tracing::warn;

/// L1: a single snapshot per cluster with a TTL, local to this process.
pub struct LocalCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (MetricsSnapshot, Instant)>>,
}

impl LocalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, cluster_id: &str) -> Option<MetricsSnapshot> {
        let entries = self.entries.read().await;
        let (snapshot, fetched_at) = entries.get(cluster_id)?;
        if fetched_at.elapsed() > self.ttl {
            return None;
        }
        Some(snapshot.clone())
    }

    pub async fn put(&self, snapshot: MetricsSnapshot) {
        self.entries
            .write()
            .await
            .insert(snapshot.cluster_id.clone(), (snapshot, Instant::now()));
    }

    pub async fn invalidate(&self, cluster_id: &str) {
        self.entries.write().await.remove(cluster_id);
    }
}

fn redis_key(cluster_id: &str) -> String {
    format!("metrics:cluster:{cluster_id}:snapshot")
}

/// L2: the shared cache backing cross-worker fan-out. Modeled on
/// `common_hypercache::HyperCacheReader`'s Redis-then-fallback read order
/// and `inc()`-based hit/miss counters, though here the write path is
/// write-through on the periodic job's schedule rather than read-through
/// on miss (see DESIGN.md).
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, cluster_id: &str) -> Option<MetricsSnapshot>;
    async fn put(&self, snapshot: &MetricsSnapshot, ttl: Duration);
    async fn invalidate(&self, cluster_id: &str);
}

pub struct RedisSharedCache {
    client: redis::Client,
}

impl RedisSharedCache {
    pub fn new(redis_url: &str) -> redis::RedisResult<Self> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
        })
    }
}

#[async_trait]
impl SharedCache for RedisSharedCache {
    async fn get(&self, cluster_id: &str) -> Option<MetricsSnapshot> {
        let key = redis_key(cluster_id);
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(error) => {
                warn!(%error, "gov-metrics: redis connection failed, treating as cache miss");
                metrics::counter!("gov_metrics_cache_get", "layer" => "l2", "outcome" => "error")
                    .increment(1);
                return None;
            }
        };
        let raw: Option<String> = match redis::cmd("GET").arg(&key).query_async(&mut conn).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "gov-metrics: redis GET failed");
                metrics::counter!("gov_metrics_cache_get", "layer" => "l2", "outcome" => "error")
                    .increment(1);
                return None;
            }
        };
        match raw.and_then(|raw| serde_json::from_str(&raw).ok()) {
            Some(snapshot) => {
                metrics::counter!("gov_metrics_cache_get", "layer" => "l2", "outcome" => "hit")
                    .increment(1);
                Some(snapshot)
            }
            None => {
                metrics::counter!("gov_metrics_cache_get", "layer" => "l2", "outcome" => "miss")
                    .increment(1);
                None
            }
        }
    }

    async fn put(&self, snapshot: &MetricsSnapshot, ttl: Duration) {
        let key = redis_key(&snapshot.cluster_id);
        let Ok(raw) = serde_json::to_string(snapshot) else {
            warn!("gov-metrics: failed to serialize snapshot for {}", snapshot.cluster_id);
            return;
        };
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => conn,
            Err(error) => {
                warn!(%error, "gov-metrics: redis connection failed on write-through");
                return;
            }
        };
        let result: redis::RedisResult<()> = redis::cmd("SET")
            .arg(&key)
            .arg(raw)
            .arg("EX")
            .arg(ttl.as_secs())
            .query_async(&mut conn)
            .await;
        if let Err(error) = result {
            warn!(%error, cluster_id = %snapshot.cluster_id, "gov-metrics: redis SET failed");
        }
    }

    async fn invalidate(&self, cluster_id: &str) {
        let key = redis_key(cluster_id);
        if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
            let _: redis::RedisResult<()> = redis::cmd("DEL").arg(&key).query_async(&mut conn).await;
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemorySharedCache {
        entries: Mutex<HashMap<String, MetricsSnapshot>>,
    }

    #[async_trait]
    impl SharedCache for InMemorySharedCache {
        async fn get(&self, cluster_id: &str) -> Option<MetricsSnapshot> {
            self.entries.lock().unwrap().get(cluster_id).cloned()
        }

        async fn put(&self, snapshot: &MetricsSnapshot, _ttl: Duration) {
            self.entries
                .lock()
                .unwrap()
                .insert(snapshot.cluster_id.clone(), snapshot.clone());
        }

        async fn invalidate(&self, cluster_id: &str) {
            self.entries.lock().unwrap().remove(cluster_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn snapshot(cluster_id: &str) -> MetricsSnapshot {
        MetricsSnapshot {
            cluster_id: cluster_id.to_string(),
            captured_at: Utc::now(),
            topics: BTreeMap::new(),
            broker_count: 3,
            total_partitions: 0,
            leader_distribution: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn local_cache_expires_after_ttl() {
        let cache = LocalCache::new(Duration::from_millis(10));
        cache.put(snapshot("c1")).await;
        assert!(cache.get("c1").await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn local_cache_invalidate_removes_entry() {
        let cache = LocalCache::new(Duration::from_secs(60));
        cache.put(snapshot("c1")).await;
        cache.invalidate("c1").await;
        assert!(cache.get("c1").await.is_none());
    }

    #[tokio::test]
    async fn shared_cache_mock_roundtrips() {
        let cache = mock::InMemorySharedCache::default();
        cache.put(&snapshot("c1"), Duration::from_secs(30)).await;
        let got = cache.get("c1").await.unwrap();
        assert_eq!(got.cluster_id, "c1");
    }
}
