use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use gov_adapters::KafkaTopicAdapter;
use gov_common::{ApplyResult, Environment, Plan, SpecAction, TopicSpec};
use gov_planner::metadata_store::MetadataStore;
use gov_planner::policy_admin::PolicyStore;

use crate::error::ApiError;
use crate::state::AppState;
use crate::yaml::parse_topic_batch;

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub cluster_id: String,
}

#[derive(Debug, Serialize)]
pub struct TopicListItem {
    pub name: String,
    pub owners: Vec<String>,
    pub partition_count: u32,
    pub replication_factor: u16,
    pub environment: Environment,
    pub tags: Vec<String>,
    pub doc: Option<String>,
}

/// `GET /topics?cluster_id=…`: live cluster state joined with this
/// service's governed metadata.
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
) -> Result<Json<Vec<TopicListItem>>, ApiError> {
    let adapter = state.connections.get_kafka_admin(&q.cluster_id).await?;
    let names = adapter.list_topics().await.map_err(|e| ApiError::Backend(e.to_string()))?;
    let described = adapter
        .describe_topics(&names)
        .await
        .map_err(|e| ApiError::Backend(e.to_string()))?;

    let mut items = Vec::with_capacity(described.len());
    for (name, desc) in described {
        let governed = state.metadata_store.get_topic_metadata(&name).await;
        let (owners, doc, tags) = match governed {
            Some((metadata, _config)) => (metadata.owners, metadata.doc, metadata.tags),
            None => (Vec::new(), None, Vec::new()),
        };
        items.push(TopicListItem {
            environment: Environment::from_resource_name(&name),
            name,
            owners,
            partition_count: desc.partition_count,
            replication_factor: desc.replication_factor,
            tags,
            doc,
        });
    }
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(items))
}

/// `POST /topics/batch/dry-run?cluster_id=…`: builds a `Plan`, does not
/// touch the cluster or the metadata store.
pub async fn dry_run(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    body: String,
) -> Result<Json<Plan>, ApiError> {
    let batch = parse_topic_batch(&body)?;
    let adapter = state.connections.get_kafka_admin(&q.cluster_id).await?;
    let policies = state.policy_store.all_active().await;
    let plan = state
        .topic_planner
        .plan(
            &batch.change_id,
            batch.env,
            &batch.specs,
            &policies,
            state.failure_mode,
            adapter.as_ref(),
        )
        .await?;
    Ok(Json(plan))
}

/// `POST /topics/batch/apply?cluster_id=…`: re-plans (to catch staleness
/// itself inside the applier), then applies.
pub async fn apply(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    body: String,
) -> Result<Json<ApplyResult>, ApiError> {
    let batch = parse_topic_batch(&body)?;
    let adapter = state.connections.get_kafka_admin(&q.cluster_id).await?;
    let policies = state.policy_store.all_active().await;
    let now = Utc::now();

    let plan = state
        .topic_planner
        .plan(
            &batch.change_id,
            batch.env,
            &batch.specs,
            &policies,
            state.failure_mode,
            adapter.as_ref(),
        )
        .await?;

    let specs_by_name: BTreeMap<String, TopicSpec> = batch
        .specs
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect();

    let result = state
        .topic_applier
        .apply(&plan, &specs_by_name, adapter.as_ref(), "api", now)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub message: String,
}

/// `POST /topics/bulk-delete?cluster_id=…` body: `[name]`.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    Json(names): Json<Vec<String>>,
) -> Result<(StatusCode, Json<BulkDeleteResponse>), ApiError> {
    let adapter = state.connections.get_kafka_admin(&q.cluster_id).await?;
    let now = Utc::now();

    let specs: Vec<TopicSpec> = names
        .iter()
        .map(|name| TopicSpec::new(name.clone(), SpecAction::Delete, None, None))
        .collect::<Result<_, _>>()?;

    let env = specs
        .first()
        .map(|s| s.environment())
        .unwrap_or(Environment::Unknown);
    let change_id = format!("bulk-delete-{}", Utc::now().timestamp_millis());

    let policies = state.policy_store.all_active().await;
    let plan = state
        .topic_planner
        .plan(&change_id, env, &specs, &policies, state.failure_mode, adapter.as_ref())
        .await?;

    let specs_by_name: BTreeMap<String, TopicSpec> =
        specs.into_iter().map(|s| (s.name.clone(), s)).collect();
    let result = state
        .topic_applier
        .apply(&plan, &specs_by_name, adapter.as_ref(), "api", now)
        .await?;

    for name in &result.applied {
        state.metadata_store.delete_topic_metadata(name).await.ok();
    }

    let failed_names: Vec<String> = result.failed.iter().map(|f| f.name.clone()).collect();
    let message = format!(
        "{} succeeded, {} failed",
        result.applied.len(),
        failed_names.len()
    );
    Ok((
        StatusCode::OK,
        Json(BulkDeleteResponse {
            succeeded: result.applied,
            failed: failed_names,
            message,
        }),
    ))
}
