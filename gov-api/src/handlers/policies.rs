use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use gov_common::{Policy, PolicyTargetEnvironment, PolicyType};
use gov_planner::policy_admin::PolicyStore;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreatePolicyRequest {
    pub policy_type: PolicyType,
    pub target_environment: PolicyTargetEnvironment,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub content: Value,
    pub created_by: String,
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreatePolicyRequest>,
) -> Result<(StatusCode, Json<Policy>), ApiError> {
    let policy = state
        .policy_admin
        .create(
            req.policy_type,
            req.target_environment,
            req.name,
            req.description,
            req.content,
            req.created_by,
            Utc::now(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(policy)))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePolicyRequest {
    pub content: Value,
    #[serde(default)]
    pub description: Option<String>,
    pub created_by: String,
}

/// `PUT /policies/{policy_id}`: creates a new DRAFT version rather than
/// mutating the one named.
pub async fn update(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
    Json(req): Json<UpdatePolicyRequest>,
) -> Result<Json<Policy>, ApiError> {
    let policy = state
        .policy_admin
        .update(&policy_id, req.content, req.description, req.created_by, Utc::now())
        .await?;
    Ok(Json(policy))
}

pub async fn versions(
    State(state): State<AppState>,
    Path(policy_id): Path<String>,
) -> Json<Vec<Policy>> {
    Json(state.policy_store.versions_of(&policy_id).await)
}

pub async fn get(
    State(state): State<AppState>,
    Path((policy_id, version)): Path<(String, i32)>,
) -> Result<Json<Policy>, ApiError> {
    state
        .policy_store
        .get(&policy_id, version)
        .await
        .map(Json)
        .ok_or(ApiError::NotFound(policy_id))
}

pub async fn list_active(State(state): State<AppState>) -> Json<Vec<Policy>> {
    Json(state.policy_admin.active_policies().await)
}

pub async fn activate(
    State(state): State<AppState>,
    Path((policy_id, version)): Path<(String, i32)>,
) -> Result<StatusCode, ApiError> {
    state.policy_admin.activate(&policy_id, version).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn archive(
    State(state): State<AppState>,
    Path((policy_id, version)): Path<(String, i32)>,
) -> Result<StatusCode, ApiError> {
    state.policy_admin.archive(&policy_id, version).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rollback(
    State(state): State<AppState>,
    Path((policy_id, version)): Path<(String, i32)>,
) -> Result<StatusCode, ApiError> {
    state.policy_admin.rollback(&policy_id, version).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    Path((policy_id, version)): Path<(String, i32)>,
) -> Result<StatusCode, ApiError> {
    state.policy_admin.delete(&policy_id, version).await?;
    Ok(StatusCode::NO_CONTENT)
}
