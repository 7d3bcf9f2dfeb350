use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gov_common::{MetricsSnapshot, TopicMeta};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub cluster_id: String,
}

/// `GET /metrics/topics/{name}?cluster_id=…`: the last cached/collected
/// snapshot, sliced down to one topic's view.
pub async fn topic_metrics(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(q): Query<ClusterQuery>,
) -> Result<Json<TopicMeta>, ApiError> {
    let snapshot: MetricsSnapshot = state.metrics_collector.get(&q.cluster_id).await?;
    snapshot
        .topics
        .get(&name)
        .cloned()
        .map(Json)
        .ok_or(ApiError::NotFound(name))
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub task_id: String,
    pub status: &'static str,
}

/// `POST /metrics/sync?cluster_id=…`: an async-trigger shape (`202
/// Accepted`, `status: "processing"`); since collection here completes
/// before the handler returns, the response still reports `"processing"`
/// for API-shape parity, with `task_id` naming the cluster actually
/// refreshed.
pub async fn sync(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
) -> Result<(StatusCode, Json<SyncResponse>), ApiError> {
    state.metrics_collector.refresh(&q.cluster_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SyncResponse {
            task_id: Uuid::new_v4().to_string(),
            status: "processing",
        }),
    ))
}
