use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{instrument, warn};
use uuid::Uuid;

use gov_adapters::SchemaRegistryAdapter;
use gov_common::{
    fingerprint::hash_hex, sort_stable, ApplyResult, AuditAction, AuditRecord, AuditStatus,
    AuditTarget, Environment, FailedItem, Plan, PlanAction, PlanItem, SchemaSpec,
};
use gov_policy::SchemaPolicyEngine;

use crate::error::{ApplyError, PlanError};
use crate::event_bus::{EventBus, SchemaRegisteredEvent};
use crate::metadata_store::{MetadataStore, SchemaArtifact};

const SAFE_DELETE_VERSION_THRESHOLD: u32 = 10;

/// Resolved literal bytes for a spec. File/Yaml-backed sources are expected
/// to have already been read into `schema_literal` by the upload handler
/// before the spec reaches the planner; a bare `SchemaSource` with no literal has nothing to diff against.
fn literal(spec: &SchemaSpec) -> &str {
    spec.schema_literal.as_deref().unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct SchemaPlanner {
    pub policy_engine: SchemaPolicyEngine,
}

impl SchemaPlanner {
    pub fn new(policy_engine: SchemaPolicyEngine) -> Self {
        Self { policy_engine }
    }

    #[instrument(skip_all, fields(change_id = %change_id))]
    pub async fn plan(
        &self,
        change_id: &str,
        env: Environment,
        specs: &[SchemaSpec],
        adapter: &dyn SchemaRegistryAdapter,
    ) -> Result<Plan, PlanError> {
        let subjects: Vec<String> = specs.iter().map(|s| s.subject.clone()).collect();
        let current = adapter.describe_subjects(&subjects).await?;

        let mut items = Vec::with_capacity(specs.len());
        let mut compatibility_reports = Vec::with_capacity(specs.len());
        for spec in specs {
            compatibility_reports.push(adapter.check_compatibility(spec).await);
            items.push(schema_plan_item(spec, current.get(&spec.subject)));
        }

        let mut violations = self.policy_engine.validate_batch(specs);
        sort_stable(&mut violations);

        Ok(Plan::new(change_id, env, items, violations, compatibility_reports))
    }
}

fn schema_plan_item(spec: &SchemaSpec, existing: Option<&gov_adapters::SubjectDescription>) -> PlanItem {
    let target_hash = hash_hex(&[literal(spec)]);
    let target_config = Some(BTreeMap::from([("schema_hash".to_string(), target_hash.clone())]));

    match existing {
        None => PlanItem {
            name: spec.subject.clone(),
            action: PlanAction::Create,
            diff: BTreeMap::from([("status".to_string(), "new->registered".to_string())]),
            current_config: None,
            target_config,
        },
        Some(desc) if desc.hash == target_hash => PlanItem {
            name: spec.subject.clone(),
            action: PlanAction::None,
            diff: BTreeMap::new(),
            current_config: Some(BTreeMap::from([("schema_hash".to_string(), desc.hash.clone())])),
            target_config,
        },
        Some(desc) => PlanItem {
            name: spec.subject.clone(),
            action: PlanAction::Alter,
            diff: BTreeMap::from([("schema_hash".to_string(), format!("{}->{}", desc.hash, target_hash))]),
            current_config: Some(BTreeMap::from([("schema_hash".to_string(), desc.hash.clone())])),
            target_config,
        },
    }
}

fn assumed_hash(item: &PlanItem) -> Option<String> {
    item.diff
        .get("schema_hash")
        .and_then(|s| s.split_once("->"))
        .map(|(old, _)| old.to_string())
}

#[derive(Debug, Clone)]
pub struct SchemaDeleteOutcome {
    pub safe_to_delete: bool,
    pub deleted_versions: Vec<i32>,
    pub reason: Option<String>,
}

/// Registers/updates schema subjects one at a time: each subject is its own
/// transactional unit, so there is no batch-level rollback of prior
/// subjects when a later one fails.
pub struct SchemaApplier {
    metadata_store: Arc<dyn MetadataStore>,
    event_bus: Arc<EventBus>,
}

impl SchemaApplier {
    pub fn new(metadata_store: Arc<dyn MetadataStore>, event_bus: Arc<EventBus>) -> Self {
        Self {
            metadata_store,
            event_bus,
        }
    }

    #[instrument(skip_all, fields(change_id = %plan.change_id))]
    pub async fn apply(
        &self,
        plan: &Plan,
        specs_by_name: &BTreeMap<String, SchemaSpec>,
        adapter: &dyn SchemaRegistryAdapter,
        storage_urls: &BTreeMap<String, String>,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ApplyResult, ApplyError> {
        self.write_batch_audit(&plan.change_id, actor, AuditStatus::Started, None, now)
            .await?;

        if !plan.can_apply() {
            let message = plan
                .violations
                .iter()
                .map(|v| v.message.clone())
                .collect::<Vec<_>>()
                .join("; ");
            self.write_batch_audit(&plan.change_id, actor, AuditStatus::Failed, Some(message), now)
                .await
                .ok();
            return Err(ApplyError::PolicyViolation(plan.violations.clone()));
        }

        if let Err(e) = self.check_staleness(plan, adapter).await {
            self.write_batch_audit(&plan.change_id, actor, AuditStatus::Failed, Some(e.to_string()), now)
                .await
                .ok();
            return Err(e);
        }

        let mut applied = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        let mut artifacts = Vec::new();

        for item in plan.items.iter().filter(|i| i.action != PlanAction::None) {
            let Some(spec) = specs_by_name.get(&item.name) else {
                continue;
            };
            if spec.dry_run_only {
                skipped.push(item.name.clone());
                continue;
            }
            self.apply_one(
                item,
                spec,
                adapter,
                storage_urls,
                actor,
                now,
                &plan.change_id,
                &mut applied,
                &mut failed,
                &mut artifacts,
            )
            .await;
        }
        skipped.extend(
            plan.items
                .iter()
                .filter(|i| i.action == PlanAction::None)
                .map(|i| i.name.clone()),
        );

        let result = ApplyResult {
            change_id: plan.change_id.clone(),
            env: plan.env,
            applied,
            skipped,
            failed,
            audit_id: Uuid::new_v4().to_string(),
            artifacts,
        };

        self.write_batch_audit(&plan.change_id, actor, result.status(), None, now)
            .await?;
        Ok(result)
    }

    async fn check_staleness(&self, plan: &Plan, adapter: &dyn SchemaRegistryAdapter) -> Result<(), ApplyError> {
        let alter_names: Vec<String> = plan
            .items
            .iter()
            .filter(|i| i.action == PlanAction::Alter)
            .map(|i| i.name.clone())
            .collect();
        if alter_names.is_empty() {
            return Ok(());
        }
        let live = adapter.describe_subjects(&alter_names).await?;
        for item in plan.items.iter().filter(|i| i.action == PlanAction::Alter) {
            let Some(assumed) = assumed_hash(item) else {
                continue;
            };
            if let Some(desc) = live.get(&item.name) {
                if desc.hash != assumed {
                    return Err(ApplyError::Stale);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_one(
        &self,
        item: &PlanItem,
        spec: &SchemaSpec,
        adapter: &dyn SchemaRegistryAdapter,
        storage_urls: &BTreeMap<String, String>,
        actor: &str,
        now: DateTime<Utc>,
        change_id: &str,
        applied: &mut Vec<String>,
        failed: &mut Vec<FailedItem>,
        artifacts: &mut Vec<String>,
    ) {
        match adapter.register_schema(spec).await {
            Ok((version, schema_id)) => {
                let checksum = hash_hex(&[literal(spec)]);
                let artifact = SchemaArtifact {
                    subject: spec.subject.clone(),
                    version,
                    storage_url: storage_urls.get(&spec.subject).cloned(),
                    checksum,
                    change_id: change_id.to_string(),
                };
                if let Some(url) = artifact.storage_url.clone() {
                    artifacts.push(url);
                }
                if let Err(e) = self.metadata_store.save_schema_artifact(artifact).await {
                    warn!(subject = %spec.subject, error = %e, "schema artifact persistence failed");
                }
                if let Err(e) = adapter.set_compatibility_mode(&spec.subject, spec.compatibility_mode).await {
                    warn!(subject = %spec.subject, error = %e, "failed to set compatibility mode after registration");
                }

                self.event_bus.publish(SchemaRegisteredEvent {
                    subject: spec.subject.clone(),
                    version,
                    schema_id,
                    change_id: change_id.to_string(),
                });

                applied.push(item.name.clone());
                self.write_item_audit(change_id, actor, AuditStatus::Completed, None, now)
                    .await
                    .ok();
            }
            Err(e) => {
                let message = e.to_string();
                failed.push(FailedItem {
                    name: item.name.clone(),
                    error: message.clone(),
                    action: item.action,
                });
                self.write_item_audit(change_id, actor, AuditStatus::Failed, Some(message), now)
                    .await
                    .ok();
            }
        }
    }

    /// Deletes a subject entirely, refusing when it carries many versions or
    /// is a PROD subject unless `force` is set.
    pub async fn delete_subject(
        &self,
        subject: &str,
        force: bool,
        adapter: &dyn SchemaRegistryAdapter,
        actor: &str,
        now: DateTime<Utc>,
        change_id: &str,
    ) -> Result<SchemaDeleteOutcome, ApplyError> {
        let version_count = self
            .metadata_store
            .count_schema_versions(subject)
            .await
            .map_err(ApplyError::MetadataStore)?;
        let env = Environment::from_resource_name(subject);

        if !force && (version_count >= SAFE_DELETE_VERSION_THRESHOLD || env == Environment::Prod) {
            return Ok(SchemaDeleteOutcome {
                safe_to_delete: false,
                deleted_versions: Vec::new(),
                reason: Some(format!(
                    "subject '{subject}' has {version_count} version(s) or is in prod; refusing without force"
                )),
            });
        }

        let deleted_versions = adapter.delete_subject(subject).await?;
        self.metadata_store
            .delete_schema_artifact(subject)
            .await
            .map_err(ApplyError::MetadataStore)?;

        let record = AuditRecord::new(
            change_id,
            AuditAction::Delete,
            AuditTarget::Schema,
            actor,
            AuditStatus::Completed,
            None,
            None,
            None,
            now,
        );
        self.metadata_store
            .append_audit(record)
            .await
            .map_err(ApplyError::MetadataStore)?;

        Ok(SchemaDeleteOutcome {
            safe_to_delete: true,
            deleted_versions,
            reason: None,
        })
    }

    async fn write_batch_audit(
        &self,
        change_id: &str,
        actor: &str,
        status: AuditStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ApplyError> {
        let record = AuditRecord::new(change_id, AuditAction::Apply, AuditTarget::Batch, actor, status, message, None, None, now);
        self.metadata_store
            .append_audit(record)
            .await
            .map_err(ApplyError::MetadataStore)
    }

    async fn write_item_audit(
        &self,
        change_id: &str,
        actor: &str,
        status: AuditStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ApplyError> {
        let record = AuditRecord::new(change_id, AuditAction::Upload, AuditTarget::Schema, actor, status, message, None, None, now);
        self.metadata_store
            .append_audit(record)
            .await
            .map_err(ApplyError::MetadataStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_adapters::mock::MockSchemaRegistryAdapter;
    use gov_common::{CompatibilityMode, SchemaType};

    use crate::metadata_store::mock::InMemoryMetadataStore;

    fn schema_spec(subject: &str, literal: &str) -> SchemaSpec {
        SchemaSpec::new(
            subject,
            SchemaType::Avro,
            CompatibilityMode::Backward,
            Some(literal.to_string()),
            None,
            vec![],
            Some(gov_common::TopicMetadata {
                owners: vec!["data-platform".to_string()],
                doc: None,
                tags: vec![],
            }),
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn plan_marks_new_subject_as_create() {
        let planner = SchemaPlanner::default();
        let adapter = MockSchemaRegistryAdapter::default();
        let spec = schema_spec("dev.user-value", "{}");
        let plan = planner
            .plan("CHG-1", Environment::Dev, &[spec], &adapter)
            .await
            .unwrap();
        assert_eq!(plan.items[0].action, PlanAction::Create);
    }

    #[tokio::test]
    async fn apply_registers_and_persists_artifact() {
        let adapter = MockSchemaRegistryAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let planner = SchemaPlanner::default();
        let applier = SchemaApplier::new(store.clone(), Arc::new(EventBus::empty()));

        let spec = schema_spec("dev.user-value", "{}");
        let plan = planner
            .plan("CHG-1", Environment::Dev, &[spec.clone()], &adapter)
            .await
            .unwrap();

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.subject.clone(), spec);

        let result = applier
            .apply(&plan, &specs_by_name, &adapter, &BTreeMap::new(), "tester", Utc::now())
            .await
            .unwrap();

        assert_eq!(result.applied, vec!["dev.user-value".to_string()]);
        assert_eq!(store.schema_artifacts.lock().unwrap().get("dev.user-value").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn apply_rejects_plan_with_blocking_violations() {
        let adapter = MockSchemaRegistryAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let planner = SchemaPlanner::default();
        let applier = SchemaApplier::new(store.clone(), Arc::new(EventBus::empty()));

        let spec = SchemaSpec::new(
            "dev.user-value",
            SchemaType::Avro,
            CompatibilityMode::Backward,
            Some("{}".to_string()),
            None,
            vec![],
            None,
            false,
        )
        .unwrap();
        let plan = planner
            .plan("CHG-1", Environment::Dev, &[spec.clone()], &adapter)
            .await
            .unwrap();
        assert!(!plan.can_apply());

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.subject.clone(), spec);

        let err = applier
            .apply(&plan, &specs_by_name, &adapter, &BTreeMap::new(), "tester", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::PolicyViolation(_)));

        let records = store.audit_records_for("CHG-1").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, AuditStatus::Started);
        assert_eq!(records[1].status, AuditStatus::Failed);
        assert_eq!(records[1].action, AuditAction::Apply);
    }

    #[tokio::test]
    async fn delete_refuses_prod_subject_without_force() {
        let adapter = MockSchemaRegistryAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let applier = SchemaApplier::new(store, Arc::new(EventBus::empty()));

        let outcome = applier
            .delete_subject("prod.user-value", false, &adapter, "tester", Utc::now(), "CHG-1")
            .await
            .unwrap();
        assert!(!outcome.safe_to_delete);
    }

    #[tokio::test]
    async fn delete_proceeds_with_force() {
        let adapter = MockSchemaRegistryAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let applier = SchemaApplier::new(store, Arc::new(EventBus::empty()));

        let outcome = applier
            .delete_subject("prod.user-value", true, &adapter, "tester", Utc::now(), "CHG-1")
            .await
            .unwrap();
        assert!(outcome.safe_to_delete);
    }
}
