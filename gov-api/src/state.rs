use std::sync::Arc;

use gov_common::health::{HealthHandle, HealthRegistry};
use gov_connections::ConnectionManager;
use gov_metrics::{MetricsCollector, RedisSharedCache, SharedCache};
use gov_planner::event_bus::EventBus;
use gov_planner::policy_admin::PolicyAdmin;
use gov_planner::schema::{SchemaApplier, SchemaPlanner};
use gov_planner::topic::{TopicApplier, TopicPlanner};
use gov_policy::engine::{PolicyFailureMode, SchemaPolicyEngine, TopicPolicyEngine};

use crate::config::Config;
use crate::stores::{
    PostgresEndpointStore, PostgresMetadataStore, PostgresPolicyStore, PostgresSnapshotStore,
};

/// Everything a handler needs, assembled once at startup by explicit
/// constructor injection,
/// mirroring how `capture::router::router` takes its collaborators as
/// plain constructor arguments rather than resolving them from a registry.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub metadata_store: Arc<PostgresMetadataStore>,
    pub policy_store: Arc<PostgresPolicyStore>,
    pub endpoint_store: Arc<PostgresEndpointStore>,
    pub metrics_collector: Arc<MetricsCollector>,
    pub topic_planner: Arc<TopicPlanner>,
    pub topic_applier: Arc<TopicApplier>,
    pub schema_planner: Arc<SchemaPlanner>,
    pub schema_applier: Arc<SchemaApplier>,
    pub policy_admin: Arc<PolicyAdmin>,
    pub event_bus: Arc<EventBus>,
    pub failure_mode: PolicyFailureMode,
    pub health: HealthRegistry,
    /// Re-reported by the scheduler's ticker loop every tick (`main.rs`); a
    /// stalled scheduler turns `/_health` unhealthy, mirroring
    /// `hook-worker`'s `worker_liveness` handle.
    pub scheduler_health: Arc<HealthHandle>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config) -> eyre::Result<Self> {
        let endpoint_store = Arc::new(PostgresEndpointStore::new(
            &config.database_url,
            config.max_pg_connections,
        )?);
        let metadata_store = Arc::new(PostgresMetadataStore::new(
            &config.database_url,
            config.max_pg_connections,
        )?);
        let policy_store = Arc::new(PostgresPolicyStore::new(
            &config.database_url,
            config.max_pg_connections,
        )?);
        let snapshot_store = Arc::new(PostgresSnapshotStore::new(
            &config.database_url,
            config.max_pg_connections,
        )?);

        let connections = Arc::new(ConnectionManager::new(endpoint_store.clone()));

        let shared_cache: Arc<dyn SharedCache> =
            Arc::new(RedisSharedCache::new(&config.redis_url)?);

        let metrics_collector = Arc::new(
            MetricsCollector::new(connections.clone(), shared_cache, snapshot_store)
                .with_retention_days(config.metrics_retention_days),
        );

        let failure_mode = PolicyFailureMode {
            fail_closed: config.policy_fail_closed,
        };

        let topic_planner = Arc::new(TopicPlanner::new(TopicPolicyEngine::default()));
        let topic_applier = Arc::new(TopicApplier::new(metadata_store.clone()));

        let event_bus = Arc::new(EventBus::default());
        let schema_planner = Arc::new(SchemaPlanner::new(SchemaPolicyEngine::default()));
        let schema_applier = Arc::new(SchemaApplier::new(metadata_store.clone(), event_bus.clone()));

        let policy_admin = Arc::new(PolicyAdmin::new(policy_store.clone()));

        let health = HealthRegistry::new("gov-api");
        let scheduler_health = Arc::new(
            health
                .register(
                    "scheduler".to_string(),
                    chrono::Duration::seconds(2 * config.collection_interval_secs as i64),
                )
                .await,
        );
        scheduler_health.report_healthy().await;

        Ok(Self {
            connections,
            metadata_store,
            policy_store,
            endpoint_store,
            metrics_collector,
            topic_planner,
            topic_applier,
            schema_planner,
            schema_applier,
            policy_admin,
            event_bus,
            failure_mode,
            health,
            scheduler_health,
            config,
        })
    }
}
