use std::collections::BTreeMap;

use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use gov_adapters::{ObjectStorageAdapter, SchemaRegistryAdapter};
use gov_common::{
    ApplyResult, CompatibilityMode, Environment, Plan, SchemaSpec, SchemaType, TopicMetadata,
};
use gov_planner::metadata_store::MetadataStore;
use gov_planner::metadata_store::SchemaArtifact;

use crate::error::{validation_error, ApiError};
use crate::state::AppState;
use crate::upload::{artifact_key, bundle_subject, extract_zip, raw_upload_key, validate_content, validate_extension};
use crate::yaml::parse_schema_batch;

#[derive(Debug, Deserialize)]
pub struct ClusterQuery {
    pub cluster_id: String,
}

/// `POST /schemas/batch/dry-run?cluster_id=…`.
pub async fn dry_run(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    body: String,
) -> Result<Json<Plan>, ApiError> {
    let batch = parse_schema_batch(&body)?;
    let adapter = state.connections.get_schema_registry(&q.cluster_id).await?;
    let plan = state
        .schema_planner
        .plan(&batch.change_id, batch.env, &batch.specs, adapter.as_ref())
        .await?;
    Ok(Json(plan))
}

/// `POST /schemas/batch/apply?cluster_id=…`.
pub async fn apply(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    body: String,
) -> Result<Json<ApplyResult>, ApiError> {
    let batch = parse_schema_batch(&body)?;
    let adapter = state.connections.get_schema_registry(&q.cluster_id).await?;
    let now = Utc::now();

    let plan = state
        .schema_planner
        .plan(&batch.change_id, batch.env, &batch.specs, adapter.as_ref())
        .await?;

    let specs_by_name: BTreeMap<String, SchemaSpec> = batch
        .specs
        .into_iter()
        .map(|s| (s.subject.clone(), s))
        .collect();

    let result = state
        .schema_applier
        .apply(&plan, &specs_by_name, adapter.as_ref(), &BTreeMap::new(), "api", now)
        .await?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct DeleteSubjectResponse {
    pub safe_to_delete: bool,
    pub deleted_versions: Vec<i32>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteSubjectQuery {
    pub cluster_id: String,
    #[serde(default)]
    pub force: bool,
}

pub async fn delete_subject(
    State(state): State<AppState>,
    axum::extract::Path(subject): axum::extract::Path<String>,
    Query(q): Query<DeleteSubjectQuery>,
) -> Result<Json<DeleteSubjectResponse>, ApiError> {
    let adapter = state.connections.get_schema_registry(&q.cluster_id).await?;
    let change_id = format!("delete-{subject}-{}", Utc::now().timestamp_millis());
    let outcome = state
        .schema_applier
        .delete_subject(&subject, q.force, adapter.as_ref(), "api", Utc::now(), &change_id)
        .await?;
    Ok(Json(DeleteSubjectResponse {
        safe_to_delete: outcome.safe_to_delete,
        deleted_versions: outcome.deleted_versions,
        reason: outcome.reason,
    }))
}

#[derive(Debug, Default)]
struct UploadForm {
    change_id: Option<String>,
    env: Option<String>,
    owner: Option<String>,
    compatibility: Option<String>,
    files: Vec<(String, Vec<u8>)>,
}

#[derive(Debug, Serialize)]
pub struct UploadedArtifact {
    pub subject: String,
    pub version: i32,
    pub schema_id: i32,
    pub storage_url: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub upload_id: String,
    pub change_id: String,
    pub registered: Vec<UploadedArtifact>,
    pub failed: Vec<gov_common::FailedItem>,
}

fn schema_type_for(filename: &str) -> SchemaType {
    if filename.ends_with(".proto") {
        SchemaType::Protobuf
    } else {
        SchemaType::Avro
    }
}

/// `POST /schemas/upload` multipart: files + env + change_id + owner +
/// compatibility. Requires `cluster_id` as a query param to resolve which
/// registry/storage endpoints to register against; `ConnectionManager` has
/// nothing to resolve without one.
pub async fn upload(
    State(state): State<AppState>,
    Query(q): Query<ClusterQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResult>), ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| validation_error(vec![format!("multipart: {e}")]))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "change_id" => {
                form.change_id = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| validation_error(vec![e.to_string()]))?,
                )
            }
            "env" => {
                form.env = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| validation_error(vec![e.to_string()]))?,
                )
            }
            "owner" => {
                form.owner = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| validation_error(vec![e.to_string()]))?,
                )
            }
            "compatibility" => {
                form.compatibility = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| validation_error(vec![e.to_string()]))?,
                )
            }
            "files" | "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| validation_error(vec![format!("{filename}: {e}")]))?;
                form.files.push((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let change_id = form
        .change_id
        .ok_or_else(|| validation_error(vec!["change_id: required".to_string()]))?;
    let env_str = form
        .env
        .ok_or_else(|| validation_error(vec!["env: required".to_string()]))?;
    let env: Environment = env_str
        .parse()
        .map_err(|_| validation_error(vec![format!("env: unrecognized environment '{env_str}'")]))?;
    let owner = form
        .owner
        .ok_or_else(|| validation_error(vec!["owner: required".to_string()]))?;
    let compatibility = match form.compatibility.as_deref() {
        Some("BACKWARD") | None => CompatibilityMode::Backward,
        Some("BACKWARD_TRANSITIVE") => CompatibilityMode::BackwardTransitive,
        Some("FORWARD") => CompatibilityMode::Forward,
        Some("FORWARD_TRANSITIVE") => CompatibilityMode::ForwardTransitive,
        Some("FULL") => CompatibilityMode::Full,
        Some("FULL_TRANSITIVE") => CompatibilityMode::FullTransitive,
        Some("NONE") => CompatibilityMode::None,
        Some(other) => {
            return Err(validation_error(vec![format!(
                "compatibility: unrecognized mode '{other}'"
            )]))
        }
    };

    if form.files.is_empty() {
        return Err(validation_error(vec!["files: at least one file is required".to_string()]));
    }

    let upload_id = Uuid::new_v4().to_string();
    let (storage, _bucket) = state.connections.get_object_storage(&q.cluster_id).await?;
    let registry = state.connections.get_schema_registry(&q.cluster_id).await?;

    let mut entries: Vec<(String, String, Vec<u8>)> = Vec::new();
    for (filename, bytes) in &form.files {
        validate_extension(filename)?;
        if filename.to_ascii_lowercase().ends_with(".zip") {
            for extracted in extract_zip(bytes)? {
                validate_content(&extracted.name, &extracted.bytes, state.config.max_upload_bytes)?;
                entries.push((bundle_subject(filename), extracted.name, extracted.bytes));
            }
        } else {
            validate_content(filename, bytes, state.config.max_upload_bytes)?;
            let subject = filename
                .rsplit_once('.')
                .map(|(stem, _)| stem.to_string())
                .unwrap_or_else(|| filename.clone());
            entries.push((subject, filename.clone(), bytes.clone()));
        }
    }

    let mut registered = Vec::new();
    let mut failed = Vec::new();
    let now = Utc::now();

    for (subject, filename, bytes) in entries {
        let raw_key = raw_upload_key(env.as_str(), &upload_id, &filename);
        let raw_metadata = vec![
            ("change_id".to_string(), change_id.clone()),
            ("upload_id".to_string(), upload_id.clone()),
            ("schema_type".to_string(), format!("{:?}", schema_type_for(&filename))),
        ];
        if let Err(e) = storage.put(&raw_key, bytes.clone(), Some(raw_metadata)).await {
            failed.push(gov_common::FailedItem {
                name: subject.clone(),
                error: e.to_string(),
                action: gov_common::PlanAction::Create,
            });
            continue;
        }

        let literal = String::from_utf8_lossy(&bytes).to_string();
        let spec = match SchemaSpec::new(
            subject.clone(),
            schema_type_for(&filename),
            compatibility,
            Some(literal.clone()),
            None,
            Vec::new(),
            Some(TopicMetadata {
                owners: vec![owner.clone()],
                doc: None,
                tags: Vec::new(),
            }),
            false,
        ) {
            Ok(spec) => spec,
            Err(e) => {
                failed.push(gov_common::FailedItem {
                    name: subject.clone(),
                    error: e.to_string(),
                    action: gov_common::PlanAction::Create,
                });
                continue;
            }
        };

        match registry.register_schema(&spec).await {
            Ok((version, schema_id)) => {
                let artifact_storage_key = artifact_key(env.as_str(), &subject, version);
                let storage_url = storage
                    .put(&artifact_storage_key, literal.into_bytes(), None)
                    .await
                    .unwrap_or_default();
                let checksum = format!("{:x}", Sha256::digest(bytes.as_slice()));
                state
                    .metadata_store
                    .save_schema_artifact(SchemaArtifact {
                        subject: subject.clone(),
                        version,
                        storage_url: Some(storage_url.clone()),
                        checksum,
                        change_id: change_id.clone(),
                    })
                    .await
                    .map_err(ApiError::MetadataStore)?;
                registered.push(UploadedArtifact {
                    subject,
                    version,
                    schema_id,
                    storage_url,
                });
            }
            Err(e) => failed.push(gov_common::FailedItem {
                name: subject,
                error: e.to_string(),
                action: gov_common::PlanAction::Create,
            }),
        }
    }

    state
        .metadata_store
        .append_audit(gov_common::AuditRecord::new(
            change_id.clone(),
            gov_common::AuditAction::Upload,
            gov_common::AuditTarget::Schema,
            "api",
            if failed.is_empty() {
                gov_common::AuditStatus::Completed
            } else if registered.is_empty() {
                gov_common::AuditStatus::Failed
            } else {
                gov_common::AuditStatus::PartiallyCompleted
            },
            None,
            None,
            None,
            now,
        ))
        .await
        .map_err(ApiError::MetadataStore)?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResult {
            upload_id,
            change_id,
            registered,
            failed,
        }),
    ))
}
