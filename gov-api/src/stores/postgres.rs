use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use gov_common::{
    AuditAction, AuditRecord, AuditStatus, AuditTarget, Endpoint, EndpointKind, Plan, Policy,
    PolicyStatus, PolicyTargetEnvironment, PolicyType, TopicConfig, TopicMetadata,
};
use gov_connections::EndpointStore;
use gov_metrics::SnapshotStore;
use gov_planner::metadata_store::{MetadataStore, SchemaArtifact};
use gov_planner::policy_admin::PolicyStore;

fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect_lazy(database_url)
}

fn endpoint_kind_str(kind: EndpointKind) -> &'static str {
    match kind {
        EndpointKind::Cluster => "cluster",
        EndpointKind::Registry => "registry",
        EndpointKind::Storage => "storage",
    }
}

fn parse_endpoint_kind(s: &str) -> EndpointKind {
    match s {
        "registry" => EndpointKind::Registry,
        "storage" => EndpointKind::Storage,
        _ => EndpointKind::Cluster,
    }
}

/// Backs `ClusterEndpoint`/`RegistryEndpoint`/`StorageEndpoint` rows
///. Mutations here are the trigger for the connection
/// manager's cache invalidation, performed by the caller after a successful
/// write (see `handlers::endpoints`).
pub struct PostgresEndpointStore {
    pool: PgPool,
}

impl PostgresEndpointStore {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: connect(database_url, max_connections)?,
        })
    }

    pub async fn upsert(&self, endpoint: &Endpoint) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO endpoint (id, kind, coordinates, credentials, tls, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (kind, id) DO UPDATE SET
                coordinates = EXCLUDED.coordinates,
                credentials = EXCLUDED.credentials,
                tls = EXCLUDED.tls,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(&endpoint.id)
        .bind(endpoint_kind_str(endpoint.kind))
        .bind(&endpoint.coordinates)
        .bind(&endpoint.credentials)
        .bind(&endpoint.tls)
        .bind(endpoint.is_active)
        .bind(endpoint.created_at)
        .bind(endpoint.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_active(&self, kind: EndpointKind, id: &str, is_active: bool) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE endpoint SET is_active = $1, updated_at = now() WHERE kind = $2 AND id = $3")
            .bind(is_active)
            .bind(endpoint_kind_str(kind))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_endpoint(row: &sqlx::postgres::PgRow) -> Endpoint {
    Endpoint {
        id: row.get("id"),
        kind: parse_endpoint_kind(row.get("kind")),
        coordinates: row.get("coordinates"),
        credentials: row.get("credentials"),
        tls: row.get("tls"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl EndpointStore for PostgresEndpointStore {
    async fn get(&self, kind: EndpointKind, id: &str) -> Option<Endpoint> {
        sqlx::query("SELECT id, kind, coordinates, credentials, tls, is_active, created_at, updated_at FROM endpoint WHERE kind = $1 AND id = $2")
            .bind(endpoint_kind_str(kind))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .as_ref()
            .map(row_to_endpoint)
    }

    async fn list_active(&self, kind: EndpointKind) -> Vec<String> {
        sqlx::query("SELECT id FROM endpoint WHERE kind = $1 AND is_active")
            .bind(endpoint_kind_str(kind))
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.iter().map(|r| r.get::<String, _>("id")).collect())
            .unwrap_or_default()
    }
}

/// Backs `topic_metadata`, `topic_plan`, `schema_artifact`, and `audit_log`.
/// Each method is its own transactional session, as the `MetadataStore`
/// contract requires; cross-call atomicity (e.g. create-then-save) is the
/// applier's job, not this store's.
pub struct PostgresMetadataStore {
    pool: PgPool,
}

impl PostgresMetadataStore {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: connect(database_url, max_connections)?,
        })
    }
}

#[async_trait]
impl MetadataStore for PostgresMetadataStore {
    async fn save_topic_metadata(
        &self,
        name: &str,
        metadata: &TopicMetadata,
        config: &TopicConfig,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), String> {
        let owner = metadata.owners.first().cloned().unwrap_or_default();
        let tags = serde_json::to_value(&metadata.tags).map_err(|e| e.to_string())?;
        let config_json = serde_json::to_value(config).map_err(|e| e.to_string())?;
        sqlx::query(
            "INSERT INTO topic_metadata (topic_name, owner, doc, tags, config, created_by, updated_by, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6, $7, $7)
             ON CONFLICT (topic_name) DO UPDATE SET
                owner = EXCLUDED.owner,
                doc = EXCLUDED.doc,
                tags = EXCLUDED.tags,
                config = EXCLUDED.config,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at",
        )
        .bind(name)
        .bind(&owner)
        .bind(&metadata.doc)
        .bind(tags)
        .bind(config_json)
        .bind(actor)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_topic_metadata(&self, name: &str) -> Result<(), String> {
        sqlx::query("DELETE FROM topic_metadata WHERE topic_name = $1")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn get_topic_metadata(&self, name: &str) -> Option<(TopicMetadata, TopicConfig)> {
        let row = sqlx::query("SELECT owner, doc, tags, config FROM topic_metadata WHERE topic_name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()?;
        let owner: String = row.get("owner");
        let doc: Option<String> = row.get("doc");
        let tags_json: Value = row.get("tags");
        let config_json: Value = row.get("config");
        let tags: Vec<String> = serde_json::from_value(tags_json).ok()?;
        let config: TopicConfig = serde_json::from_value(config_json).ok()?;
        Some((
            TopicMetadata {
                owners: vec![owner],
                doc,
                tags,
            },
            config,
        ))
    }

    async fn save_plan(&self, plan: &Plan, created_by: &str, now: DateTime<Utc>) -> Result<(), String> {
        let plan_json = serde_json::to_value(plan).map_err(|e| e.to_string())?;
        sqlx::query(
            "INSERT INTO topic_plan (change_id, env, plan_data, can_apply, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (change_id) DO UPDATE SET
                plan_data = EXCLUDED.plan_data,
                can_apply = EXCLUDED.can_apply",
        )
        .bind(&plan.change_id)
        .bind(plan.env.as_str())
        .bind(plan_json)
        .bind(plan.can_apply())
        .bind(created_by)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn save_schema_artifact(&self, artifact: SchemaArtifact) -> Result<(), String> {
        sqlx::query(
            "INSERT INTO schema_artifact (subject, version, storage_url, checksum, change_id)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (subject, version) DO UPDATE SET
                storage_url = EXCLUDED.storage_url,
                checksum = EXCLUDED.checksum,
                change_id = EXCLUDED.change_id",
        )
        .bind(&artifact.subject)
        .bind(artifact.version)
        .bind(&artifact.storage_url)
        .bind(&artifact.checksum)
        .bind(&artifact.change_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn delete_schema_artifact(&self, subject: &str) -> Result<(), String> {
        sqlx::query("DELETE FROM schema_artifact WHERE subject = $1")
            .bind(subject)
            .execute(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn count_schema_versions(&self, subject: &str) -> Result<u32, String> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM schema_artifact WHERE subject = $1")
            .bind(subject)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        let n: i64 = row.get("n");
        Ok(n as u32)
    }

    async fn append_audit(&self, record: AuditRecord) -> Result<(), String> {
        sqlx::query(
            "INSERT INTO audit_log (change_id, action, target, actor, status, message, snapshot, team, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&record.change_id)
        .bind(audit_action_str(record.action))
        .bind(audit_target_str(record.target))
        .bind(&record.actor)
        .bind(audit_status_str(record.status))
        .bind(&record.message)
        .bind(&record.snapshot)
        .bind(&record.team)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn audit_records_for(&self, change_id: &str) -> Vec<AuditRecord> {
        sqlx::query(
            "SELECT change_id, action, target, actor, status, message, snapshot, team, timestamp
             FROM audit_log WHERE change_id = $1 ORDER BY timestamp ASC",
        )
        .bind(change_id)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.iter().map(row_to_audit_record).collect())
        .unwrap_or_default()
    }
}

fn audit_action_str(action: AuditAction) -> &'static str {
    match action {
        AuditAction::DryRun => "DRY_RUN",
        AuditAction::Apply => "APPLY",
        AuditAction::Create => "CREATE",
        AuditAction::Delete => "DELETE",
        AuditAction::AlterConfig => "ALTER_CONFIG",
        AuditAction::AlterPartitions => "ALTER_PARTITIONS",
        AuditAction::Upload => "UPLOAD",
    }
}

fn parse_audit_action(s: &str) -> AuditAction {
    match s {
        "DRY_RUN" => AuditAction::DryRun,
        "CREATE" => AuditAction::Create,
        "DELETE" => AuditAction::Delete,
        "ALTER_CONFIG" => AuditAction::AlterConfig,
        "ALTER_PARTITIONS" => AuditAction::AlterPartitions,
        "UPLOAD" => AuditAction::Upload,
        _ => AuditAction::Apply,
    }
}

fn audit_target_str(target: AuditTarget) -> &'static str {
    match target {
        AuditTarget::Batch => "batch",
        AuditTarget::Topic => "topic",
        AuditTarget::Schema => "schema",
    }
}

fn parse_audit_target(s: &str) -> AuditTarget {
    match s {
        "topic" => AuditTarget::Topic,
        "schema" => AuditTarget::Schema,
        _ => AuditTarget::Batch,
    }
}

fn audit_status_str(status: AuditStatus) -> &'static str {
    match status {
        AuditStatus::Started => "STARTED",
        AuditStatus::Completed => "COMPLETED",
        AuditStatus::PartiallyCompleted => "PARTIALLY_COMPLETED",
        AuditStatus::Failed => "FAILED",
    }
}

fn parse_audit_status(s: &str) -> AuditStatus {
    match s {
        "COMPLETED" => AuditStatus::Completed,
        "PARTIALLY_COMPLETED" => AuditStatus::PartiallyCompleted,
        "FAILED" => AuditStatus::Failed,
        _ => AuditStatus::Started,
    }
}

fn row_to_audit_record(row: &sqlx::postgres::PgRow) -> AuditRecord {
    AuditRecord::new(
        row.get::<String, _>("change_id"),
        parse_audit_action(row.get("action")),
        parse_audit_target(row.get("target")),
        row.get::<String, _>("actor"),
        parse_audit_status(row.get("status")),
        row.get("message"),
        row.get("snapshot"),
        row.get("team"),
        row.get("timestamp"),
    )
}

fn policy_type_str(t: PolicyType) -> &'static str {
    match t {
        PolicyType::Naming => "NAMING",
        PolicyType::Guardrail => "GUARDRAIL",
    }
}

fn parse_policy_type(s: &str) -> PolicyType {
    match s {
        "GUARDRAIL" => PolicyType::Guardrail,
        _ => PolicyType::Naming,
    }
}

fn policy_status_str(s: PolicyStatus) -> &'static str {
    match s {
        PolicyStatus::Draft => "DRAFT",
        PolicyStatus::Active => "ACTIVE",
        PolicyStatus::Archived => "ARCHIVED",
    }
}

fn parse_policy_status(s: &str) -> PolicyStatus {
    match s {
        "ACTIVE" => PolicyStatus::Active,
        "ARCHIVED" => PolicyStatus::Archived,
        _ => PolicyStatus::Draft,
    }
}

fn policy_target_str(t: PolicyTargetEnvironment) -> &'static str {
    match t {
        PolicyTargetEnvironment::Dev => "dev",
        PolicyTargetEnvironment::Stg => "stg",
        PolicyTargetEnvironment::Prod => "prod",
        PolicyTargetEnvironment::Total => "total",
    }
}

fn parse_policy_target(s: &str) -> PolicyTargetEnvironment {
    match s {
        "stg" => PolicyTargetEnvironment::Stg,
        "prod" => PolicyTargetEnvironment::Prod,
        "total" => PolicyTargetEnvironment::Total,
        _ => PolicyTargetEnvironment::Dev,
    }
}

fn row_to_policy(row: &sqlx::postgres::PgRow) -> Policy {
    Policy {
        policy_id: row.get("policy_id"),
        policy_type: parse_policy_type(row.get("type")),
        version: row.get("version"),
        status: parse_policy_status(row.get("status")),
        target_environment: parse_policy_target(row.get("target_environment")),
        name: row.get("name"),
        description: row.get("description"),
        content: row.get("content"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

/// Backs the `policy(policy_id, version, ...)` table, `PRIMARY KEY
/// (policy_id, version)`{
    pool: PgPool,
}

impl PostgresPolicyStore {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: connect(database_url, max_connections)?,
        })
    }
}

#[async_trait]
impl PolicyStore for PostgresPolicyStore {
    async fn insert(&self, policy: Policy) -> Result<(), String> {
        sqlx::query(
            "INSERT INTO policy (policy_id, version, type, status, target_environment, name, description, content, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&policy.policy_id)
        .bind(policy.version)
        .bind(policy_type_str(policy.policy_type))
        .bind(policy_status_str(policy.status))
        .bind(policy_target_str(policy.target_environment))
        .bind(&policy.name)
        .bind(&policy.description)
        .bind(&policy.content)
        .bind(&policy.created_by)
        .bind(policy.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn versions_of(&self, policy_id: &str) -> Vec<Policy> {
        sqlx::query("SELECT * FROM policy WHERE policy_id = $1 ORDER BY version ASC")
            .bind(policy_id)
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.iter().map(row_to_policy).collect())
            .unwrap_or_default()
    }

    async fn get(&self, policy_id: &str, version: i32) -> Option<Policy> {
        sqlx::query("SELECT * FROM policy WHERE policy_id = $1 AND version = $2")
            .bind(policy_id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .as_ref()
            .map(row_to_policy)
    }

    async fn set_status(&self, policy_id: &str, version: i32, status: PolicyStatus) -> Result<(), String> {
        sqlx::query("UPDATE policy SET status = $1 WHERE policy_id = $2 AND version = $3")
            .bind(policy_status_str(status))
            .bind(policy_id)
            .bind(version)
            .execute(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn active_for(&self, policy_type: PolicyType, target_environment: PolicyTargetEnvironment) -> Option<Policy> {
        sqlx::query("SELECT * FROM policy WHERE type = $1 AND target_environment = $2 AND status = 'ACTIVE'")
            .bind(policy_type_str(policy_type))
            .bind(policy_target_str(target_environment))
            .fetch_optional(&self.pool)
            .await
            .ok()
            .flatten()
            .as_ref()
            .map(row_to_policy)
    }

    async fn all_active(&self) -> Vec<Policy> {
        sqlx::query("SELECT * FROM policy WHERE status = 'ACTIVE'")
            .fetch_all(&self.pool)
            .await
            .map(|rows| rows.iter().map(row_to_policy).collect())
            .unwrap_or_default()
    }
}

/// Backs the `metrics_snapshot(cluster_id, captured_at PK, payload JSON)`
/// table: the L3 tier of the metrics cache hierarchy.
pub struct PostgresSnapshotStore {
    pool: PgPool,
}

impl PostgresSnapshotStore {
    pub fn new(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        Ok(Self {
            pool: connect(database_url, max_connections)?,
        })
    }
}

#[async_trait]
impl SnapshotStore for PostgresSnapshotStore {
    async fn save(&self, snapshot: &gov_common::MetricsSnapshot) -> Result<(), String> {
        let payload = serde_json::to_value(snapshot).map_err(|e| e.to_string())?;
        sqlx::query(
            "INSERT INTO metrics_snapshot (cluster_id, captured_at, payload)
             VALUES ($1, $2, $3)
             ON CONFLICT (cluster_id, captured_at) DO UPDATE SET payload = EXCLUDED.payload",
        )
        .bind(&snapshot.cluster_id)
        .bind(snapshot.captured_at)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    async fn latest(&self, cluster_id: &str) -> Option<gov_common::MetricsSnapshot> {
        let row = sqlx::query(
            "SELECT payload FROM metrics_snapshot WHERE cluster_id = $1 ORDER BY captured_at DESC LIMIT 1",
        )
        .bind(cluster_id)
        .fetch_optional(&self.pool)
        .await
        .ok()
        .flatten()?;
        let payload: Value = row.get("payload");
        serde_json::from_value(payload).ok()
    }

    async fn history(&self, cluster_id: &str, since: DateTime<Utc>) -> Vec<gov_common::MetricsSnapshot> {
        sqlx::query(
            "SELECT payload FROM metrics_snapshot WHERE cluster_id = $1 AND captured_at >= $2 ORDER BY captured_at ASC",
        )
        .bind(cluster_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map(|rows| {
            rows.iter()
                .filter_map(|r| serde_json::from_value(r.get::<Value, _>("payload")).ok())
                .collect()
        })
        .unwrap_or_default()
    }

    async fn delete_older_than(&self, cluster_id: &str, retention_days: i64, now: DateTime<Utc>) -> Result<u64, String> {
        let cutoff = now - chrono::Duration::days(retention_days);
        let result = sqlx::query("DELETE FROM metrics_snapshot WHERE cluster_id = $1 AND captured_at < $2")
            .bind(cluster_id)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| e.to_string())?;
        Ok(result.rows_affected())
    }
}
