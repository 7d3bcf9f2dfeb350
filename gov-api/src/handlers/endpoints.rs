//! Registers and tests the `ClusterEndpoint`/`RegistryEndpoint`/
//! `StorageEndpoint` rows the connection manager resolves ids against.
//! `get_kafka_admin` et al. have nothing to resolve without a place to
//! register endpoints.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use gov_common::{Endpoint, EndpointKind};
use gov_connections::EndpointStore;

use crate::error::ApiError;
use crate::state::AppState;

fn parse_kind(s: &str) -> Result<EndpointKind, ApiError> {
    match s {
        "cluster" => Ok(EndpointKind::Cluster),
        "registry" => Ok(EndpointKind::Registry),
        "storage" => Ok(EndpointKind::Storage),
        other => Err(crate::error::validation_error(vec![format!(
            "kind: unrecognized endpoint kind '{other}'"
        )])),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpsertEndpointRequest {
    pub id: String,
    pub kind: String,
    pub coordinates: Value,
    pub credentials: Value,
    #[serde(default)]
    pub tls: Option<Value>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

pub async fn upsert(
    State(state): State<AppState>,
    Json(req): Json<UpsertEndpointRequest>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&req.kind)?;
    let now = Utc::now();
    let endpoint = Endpoint {
        id: req.id,
        kind,
        coordinates: req.coordinates,
        credentials: req.credentials,
        tls: req.tls,
        is_active: req.is_active,
        created_at: now,
        updated_at: now,
    };
    state
        .endpoint_store
        .upsert(&endpoint)
        .await
        .map_err(|e| ApiError::Backend(e.to_string()))?;
    state.connections.invalidate(kind, &endpoint.id).await;
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct ListEndpointsQuery {
    pub kind: String,
}

pub async fn list_active(
    State(state): State<AppState>,
    Query(q): Query<ListEndpointsQuery>,
) -> Result<Json<Vec<String>>, ApiError> {
    let kind = parse_kind(&q.kind)?;
    Ok(Json(state.endpoint_store.list_active(kind).await))
}

pub async fn get(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<Endpoint>, ApiError> {
    let kind = parse_kind(&kind)?;
    state
        .endpoint_store
        .get(kind, &id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(id))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let kind = parse_kind(&kind)?;
    if state.endpoint_store.get(kind, &id).await.is_none() {
        return Err(ApiError::NotFound(id));
    }
    state
        .endpoint_store
        .set_active(kind, &id, false)
        .await
        .map_err(|e| ApiError::Backend(e.to_string()))?;
    state.connections.invalidate(kind, &id).await;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
    pub latency_ms: u64,
    pub metadata: String,
}

pub async fn test_connection(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, String)>,
) -> Result<Json<TestConnectionResponse>, ApiError> {
    let kind = parse_kind(&kind)?;
    let result = state.connections.test_connection(kind, &id).await;
    Ok(Json(TestConnectionResponse {
        success: result.success,
        latency_ms: result.latency_ms,
        metadata: result.metadata,
    }))
}
