use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, instrument, warn};
use uuid::Uuid;

use gov_adapters::{KafkaTopicAdapter, TopicDescription};
use gov_common::{
    sort_stable, ApplyResult, AuditAction, AuditRecord, AuditStatus, AuditTarget, FailedItem, Plan,
    PlanAction, PlanItem, Policy, SpecAction, TopicConfig, TopicSpec, Violation,
};
use gov_policy::{PolicyFailureMode, TopicPolicyEngine};

use crate::diff::{check_change_legality, diff_configs};
use crate::error::{ApplyError, PlanError};
use crate::metadata_store::MetadataStore;

/// Builds `Plan`s for a `TopicBatch` against a plan-time snapshot of the
/// backend.
#[derive(Debug, Clone, Default)]
pub struct TopicPlanner {
    pub policy_engine: TopicPolicyEngine,
}

impl TopicPlanner {
    pub fn new(policy_engine: TopicPolicyEngine) -> Self {
        Self { policy_engine }
    }

    #[instrument(skip_all, fields(change_id = %batch_change_id))]
    pub async fn plan(
        &self,
        batch_change_id: &str,
        env: gov_common::Environment,
        specs: &[TopicSpec],
        policies: &[Policy],
        mode: PolicyFailureMode,
        adapter: &dyn KafkaTopicAdapter,
    ) -> Result<Plan, PlanError> {
        let names: Vec<String> = specs.iter().map(|s| s.name.clone()).collect();
        let current = adapter.describe_topics(&names).await?;

        let mut items = Vec::with_capacity(specs.len());
        let mut violations = Vec::new();
        for spec in specs {
            let existing = current.get(&spec.name);
            let (item, mut item_violations) = plan_item(spec, existing);
            violations.append(&mut item_violations);
            items.push(item);
        }

        let mut policy_violations = self.policy_engine.validate_batch(specs, policies, mode);
        violations.append(&mut policy_violations);
        sort_stable(&mut violations);

        Ok(Plan::new(batch_change_id, env, items, violations, Vec::new()))
    }
}

fn plan_item(spec: &TopicSpec, existing: Option<&TopicDescription>) -> (PlanItem, Vec<Violation>) {
    match (spec.action, existing) {
        (SpecAction::Delete, None) => (
            PlanItem {
                name: spec.name.clone(),
                action: PlanAction::None,
                diff: BTreeMap::new(),
                current_config: None,
                target_config: None,
            },
            Vec::new(),
        ),
        (SpecAction::Delete, Some(desc)) => (
            PlanItem {
                name: spec.name.clone(),
                action: PlanAction::Delete,
                diff: BTreeMap::from([("status".to_string(), "exists->deleted".to_string())]),
                current_config: Some(desc.config.clone()),
                target_config: None,
            },
            Vec::new(),
        ),
        (SpecAction::Create, None) | (SpecAction::Upsert, None) => {
            let config = spec
                .config
                .as_ref()
                .expect("CREATE/UPSERT spec is constructed with a config");
            (
                PlanItem {
                    name: spec.name.clone(),
                    action: PlanAction::Create,
                    diff: BTreeMap::from([("status".to_string(), "new->created".to_string())]),
                    current_config: None,
                    target_config: Some(config.to_kafka_config()),
                },
                Vec::new(),
            )
        }
        (SpecAction::Create, Some(desc))
        | (SpecAction::Upsert, Some(desc))
        | (SpecAction::Update, Some(desc)) => alter_item(spec, desc),
        (SpecAction::Update, None) => (
            PlanItem {
                name: spec.name.clone(),
                action: PlanAction::None,
                diff: BTreeMap::new(),
                current_config: None,
                target_config: None,
            },
            vec![Violation::new(
                &spec.name,
                "topic.update_missing",
                format!("topic '{}' does not exist; cannot UPDATE", spec.name),
                gov_common::Severity::Error,
                None,
            )],
        ),
    }
}

/// Computes the config diff plus the out-of-band `partitions`/
/// `replication_factor` entries the wire-config diff doesn't cover
/// (`TopicConfig::to_kafka_config` only renders the mutable entries).
fn alter_item(spec: &TopicSpec, desc: &TopicDescription) -> (PlanItem, Vec<Violation>) {
    let config = spec
        .config
        .as_ref()
        .expect("CREATE/UPSERT/UPDATE spec is constructed with a config");
    let target_wire = config.to_kafka_config();
    let mut diff = diff_configs(&desc.config, &target_wire);

    if config.partitions != desc.partition_count {
        diff.insert(
            "partitions".to_string(),
            format!("{}->{}", desc.partition_count, config.partitions),
        );
    }
    if config.replication_factor != desc.replication_factor {
        diff.insert(
            "replication_factor".to_string(),
            format!("{}->{}", desc.replication_factor, config.replication_factor),
        );
    }

    let violations = check_change_legality(
        desc.partition_count,
        config.partitions,
        desc.replication_factor,
        config.replication_factor,
    )
    .into_iter()
    .map(|e| {
        Violation::new(
            &spec.name,
            "topic.change_legality",
            e.to_string(),
            gov_common::Severity::Error,
            None,
        )
    })
    .collect();

    let action = if diff.is_empty() {
        PlanAction::None
    } else {
        PlanAction::Alter
    };
    (
        PlanItem {
            name: spec.name.clone(),
            action,
            diff,
            current_config: Some(desc.config.clone()),
            target_config: Some(target_wire),
        },
        violations,
    )
}

fn assumed_partitions(item: &PlanItem) -> Option<u32> {
    item.diff
        .get("partitions")
        .and_then(|s| s.split_once("->"))
        .and_then(|(old, _)| old.parse::<u32>().ok())
}

/// Translates a raw adapter create-failure into the user-facing form;
/// unrecognized errors pass through unchanged.
fn translate_create_error(name: &str, raw: &str) -> String {
    if raw.to_ascii_lowercase().contains("already exist") {
        format!("토픽 '{name}'이(가) 이미 존재합니다: {raw}")
    } else {
        raw.to_string()
    }
}

/// Executes a `Plan` against the backend with per-item isolation and
/// metadata-coupled rollback.
pub struct TopicApplier {
    metadata_store: Arc<dyn MetadataStore>,
}

impl TopicApplier {
    pub fn new(metadata_store: Arc<dyn MetadataStore>) -> Self {
        Self { metadata_store }
    }

    #[instrument(skip_all, fields(change_id = %plan.change_id))]
    pub async fn apply(
        &self,
        plan: &Plan,
        specs_by_name: &BTreeMap<String, TopicSpec>,
        adapter: &dyn KafkaTopicAdapter,
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
        let mut failed = Vec::new();

        self.apply_creates(plan, specs_by_name, adapter, actor, now, &mut applied, &mut failed)
            .await?;
        self.apply_deletes(plan, adapter, actor, now, &mut applied, &mut failed).await?;
        self.apply_alters(plan, specs_by_name, adapter, actor, now, &mut applied, &mut failed)
            .await?;

        let result = ApplyResult {
            change_id: plan.change_id.clone(),
            env: plan.env,
            applied,
            skipped: plan
                .items
                .iter()
                .filter(|i| i.action == PlanAction::None)
                .map(|i| i.name.clone())
                .collect(),
            failed,
            audit_id: Uuid::new_v4().to_string(),
            artifacts: Vec::new(),
        };

        self.write_batch_audit(&plan.change_id, actor, result.status(), None, now)
            .await?;
        Ok(result)
    }

    async fn check_staleness(&self, plan: &Plan, adapter: &dyn KafkaTopicAdapter) -> Result<(), ApplyError> {
        let alter_names: Vec<String> = plan
            .items
            .iter()
            .filter(|i| i.action == PlanAction::Alter)
            .map(|i| i.name.clone())
            .collect();
        if alter_names.is_empty() {
            return Ok(());
        }
        let live = adapter.describe_topics(&alter_names).await?;
        for item in plan.items.iter().filter(|i| i.action == PlanAction::Alter) {
            let Some(assumed) = assumed_partitions(item) else {
                continue;
            };
            if let Some(desc) = live.get(&item.name) {
                if desc.partition_count != assumed {
                    return Err(ApplyError::Stale);
                }
            }
        }
        Ok(())
    }

    async fn apply_creates(
        &self,
        plan: &Plan,
        specs_by_name: &BTreeMap<String, TopicSpec>,
        adapter: &dyn KafkaTopicAdapter,
        actor: &str,
        now: DateTime<Utc>,
        applied: &mut Vec<String>,
        failed: &mut Vec<FailedItem>,
    ) -> Result<(), ApplyError> {
        let creates: Vec<&PlanItem> = plan.items.iter().filter(|i| i.action == PlanAction::Create).collect();
        if creates.is_empty() {
            return Ok(());
        }
        let specs: Vec<(String, TopicConfig)> = creates
            .iter()
            .filter_map(|i| {
                specs_by_name
                    .get(&i.name)
                    .and_then(|s| s.config.clone())
                    .map(|c| (i.name.clone(), c))
            })
            .collect();
        let results = adapter.create_topics(&specs).await?;

        for item in creates {
            match results.get(&item.name) {
                Some(None) => {
                    self.finalize_create(item, specs_by_name, adapter, actor, now, &plan.change_id, applied, failed)
                        .await;
                }
                Some(Some(error)) => {
                    let message = translate_create_error(&item.name, error);
                    failed.push(FailedItem {
                        name: item.name.clone(),
                        error: message.clone(),
                        action: PlanAction::Create,
                    });
                    self.write_item_audit(
                        &plan.change_id,
                        AuditAction::Create,
                        actor,
                        AuditStatus::Failed,
                        Some(message),
                        now,
                    )
                    .await
                    .ok();
                }
                None => {}
            }
        }
        Ok(())
    }

    async fn finalize_create(
        &self,
        item: &PlanItem,
        specs_by_name: &BTreeMap<String, TopicSpec>,
        adapter: &dyn KafkaTopicAdapter,
        actor: &str,
        now: DateTime<Utc>,
        change_id: &str,
        applied: &mut Vec<String>,
        failed: &mut Vec<FailedItem>,
    ) {
        let Some(spec) = specs_by_name.get(&item.name) else {
            return;
        };
        let config = spec.config.clone().expect("CREATE spec carries a config");
        let metadata = spec.metadata.clone().expect("CREATE spec carries metadata");

        match self
            .metadata_store
            .save_topic_metadata(&item.name, &metadata, &config, actor, now)
            .await
        {
            Ok(()) => {
                applied.push(item.name.clone());
                self.write_item_audit(change_id, AuditAction::Create, actor, AuditStatus::Completed, None, now)
                    .await
                    .ok();
            }
            Err(e) => {
                warn!(topic = %item.name, error = %e, "metadata save failed, rolling back topic creation");
                if let Err(rollback_err) = adapter.delete_topics(&[item.name.clone()]).await {
                    error!(
                        topic = %item.name,
                        error = %rollback_err,
                        "CRITICAL: rollback delete failed after metadata save failure"
                    );
                }
                let message = format!("메타데이터 저장 실패: {e}");
                failed.push(FailedItem {
                    name: item.name.clone(),
                    error: message.clone(),
                    action: PlanAction::Create,
                });
                self.write_item_audit(change_id, AuditAction::Create, actor, AuditStatus::Failed, Some(message), now)
                    .await
                    .ok();
            }
        }
    }

    async fn apply_deletes(
        &self,
        plan: &Plan,
        adapter: &dyn KafkaTopicAdapter,
        actor: &str,
        now: DateTime<Utc>,
        applied: &mut Vec<String>,
        failed: &mut Vec<FailedItem>,
    ) -> Result<(), ApplyError> {
        let deletes: Vec<&PlanItem> = plan.items.iter().filter(|i| i.action == PlanAction::Delete).collect();
        if deletes.is_empty() {
            return Ok(());
        }
        let names: Vec<String> = deletes.iter().map(|i| i.name.clone()).collect();
        let results = adapter.delete_topics(&names).await?;

        for item in deletes {
            match results.get(&item.name) {
                Some(None) => {
                    if let Err(e) = self.metadata_store.delete_topic_metadata(&item.name).await {
                        warn!(topic = %item.name, error = %e, "topic deleted but metadata cleanup failed");
                    }
                    applied.push(item.name.clone());
                    self.write_item_audit(&plan.change_id, AuditAction::Delete, actor, AuditStatus::Completed, None, now)
                        .await
                        .ok();
                }
                Some(Some(error)) => {
                    failed.push(FailedItem {
                        name: item.name.clone(),
                        error: error.clone(),
                        action: PlanAction::Delete,
                    });
                    self.write_item_audit(
                        &plan.change_id,
                        AuditAction::Delete,
                        actor,
                        AuditStatus::Failed,
                        Some(error.clone()),
                        now,
                    )
                    .await
                    .ok();
                }
                None => {}
            }
        }
        Ok(())
    }

    async fn apply_alters(
        &self,
        plan: &Plan,
        specs_by_name: &BTreeMap<String, TopicSpec>,
        adapter: &dyn KafkaTopicAdapter,
        actor: &str,
        now: DateTime<Utc>,
        applied: &mut Vec<String>,
        failed: &mut Vec<FailedItem>,
    ) -> Result<(), ApplyError> {
        let alters: Vec<&PlanItem> = plan.items.iter().filter(|i| i.action == PlanAction::Alter).collect();
        if alters.is_empty() {
            return Ok(());
        }

        let mut partition_increases: BTreeMap<String, u32> = BTreeMap::new();
        let mut config_alters: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        for item in &alters {
            let Some(config) = specs_by_name.get(&item.name).and_then(|s| s.config.as_ref()) else {
                continue;
            };
            if item.diff.contains_key("partitions") {
                partition_increases.insert(item.name.clone(), config.partitions);
            }
            let wire_diff: BTreeMap<String, String> = item
                .diff
                .iter()
                .filter(|(k, _)| k.as_str() != "partitions" && k.as_str() != "replication_factor")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            if !wire_diff.is_empty() {
                config_alters.insert(item.name.clone(), config.to_kafka_config());
            }
        }

        let partition_results = if partition_increases.is_empty() {
            BTreeMap::new()
        } else {
            adapter.create_partitions(&partition_increases).await?
        };
        let config_results = if config_alters.is_empty() {
            BTreeMap::new()
        } else {
            adapter.alter_topic_configs(&config_alters).await?
        };

        for item in alters {
            if let Some(Some(error)) = partition_results.get(&item.name) {
                failed.push(FailedItem {
                    name: item.name.clone(),
                    error: error.clone(),
                    action: PlanAction::Alter,
                });
                self.write_item_audit(
                    &plan.change_id,
                    AuditAction::AlterPartitions,
                    actor,
                    AuditStatus::Failed,
                    Some(error.clone()),
                    now,
                )
                .await
                .ok();
            }

            if config_alters.contains_key(&item.name) {
                match config_results.get(&item.name) {
                    Some(None) => {
                        applied.push(item.name.clone());
                        self.write_item_audit(
                            &plan.change_id,
                            AuditAction::AlterConfig,
                            actor,
                            AuditStatus::Completed,
                            None,
                            now,
                        )
                        .await
                        .ok();
                    }
                    Some(Some(error)) => {
                        failed.push(FailedItem {
                            name: item.name.clone(),
                            error: error.clone(),
                            action: PlanAction::Alter,
                        });
                        self.write_item_audit(
                            &plan.change_id,
                            AuditAction::AlterConfig,
                            actor,
                            AuditStatus::Failed,
                            Some(error.clone()),
                            now,
                        )
                        .await
                        .ok();
                    }
                    None => {}
                }
            } else if partition_results.get(&item.name).map(|e| e.is_none()).unwrap_or(true) {
                applied.push(item.name.clone());
            }
        }
        Ok(())
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
        action: AuditAction,
        actor: &str,
        status: AuditStatus,
        message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), ApplyError> {
        let record = AuditRecord::new(change_id, action, AuditTarget::Topic, actor, status, message, None, None, now);
        self.metadata_store
            .append_audit(record)
            .await
            .map_err(ApplyError::MetadataStore)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_adapters::mock::MockKafkaTopicAdapter;
    use gov_common::{CleanupPolicy, Environment, PlanAction, TopicMetadata};

    use crate::metadata_store::mock::InMemoryMetadataStore;

    fn topic_spec(name: &str, action: SpecAction, partitions: u32, replication_factor: u16) -> TopicSpec {
        TopicSpec::new(
            name,
            action,
            if action == SpecAction::Delete {
                None
            } else {
                Some(TopicConfig::new(partitions, replication_factor, CleanupPolicy::Delete, Some(604_800_000), Some(2), None, None, None).unwrap())
            },
            if action == SpecAction::Delete {
                None
            } else {
                Some(TopicMetadata {
                    owners: vec!["data-platform".to_string()],
                    doc: None,
                    tags: vec![],
                })
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn plan_marks_new_topic_as_create() {
        let planner = TopicPlanner::default();
        let adapter = MockKafkaTopicAdapter::default();
        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 3);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();
        assert_eq!(plan.items[0].action, PlanAction::Create);
        assert!(plan.violations.is_empty());
    }

    #[tokio::test]
    async fn plan_blocks_low_replication_in_prod() {
        let planner = TopicPlanner::default();
        let adapter = MockKafkaTopicAdapter::default();
        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 1);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();
        assert!(!plan.can_apply());
    }

    #[tokio::test]
    async fn delete_of_absent_topic_is_none_action() {
        let planner = TopicPlanner::default();
        let adapter = MockKafkaTopicAdapter::default();
        let spec = topic_spec("prod.gone", SpecAction::Delete, 1, 1);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();
        assert_eq!(plan.items[0].action, PlanAction::None);
    }

    #[tokio::test]
    async fn apply_creates_topic_and_persists_metadata() {
        let adapter = MockKafkaTopicAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let planner = TopicPlanner::default();
        let applier = TopicApplier::new(store.clone());

        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 3);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec.clone()], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.name.clone(), spec);

        let result = applier
            .apply(&plan, &specs_by_name, &adapter, "tester", Utc::now())
            .await
            .unwrap();

        assert_eq!(result.applied, vec!["prod.orders.created".to_string()]);
        assert!(result.failed.is_empty());
        assert!(store.topic_metadata.lock().unwrap().contains_key("prod.orders.created"));
    }

    #[tokio::test]
    async fn duplicate_topic_create_failure_is_translated() {
        let adapter = MockKafkaTopicAdapter::default()
            .failing_create("prod.orders.created", "Topic 'prod.orders.created' already exists.");
        let store = Arc::new(InMemoryMetadataStore::default());
        let planner = TopicPlanner::default();
        let applier = TopicApplier::new(store);

        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 3);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec.clone()], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.name.clone(), spec);

        let result = applier
            .apply(&plan, &specs_by_name, &adapter, "tester", Utc::now())
            .await
            .unwrap();

        assert!(result.applied.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0]
            .error
            .starts_with("토픽 'prod.orders.created'이(가) 이미 존재합니다"));
    }

    #[tokio::test]
    async fn metadata_save_failure_rolls_back_created_topic() {
        let adapter = MockKafkaTopicAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default().failing_topic_metadata_save());
        let planner = TopicPlanner::default();
        let applier = TopicApplier::new(store);

        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 3);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec.clone()], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.name.clone(), spec);

        let result = applier
            .apply(&plan, &specs_by_name, &adapter, "tester", Utc::now())
            .await
            .unwrap();

        assert!(result.applied.is_empty());
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].error.starts_with("메타데이터 저장 실패"));
        assert!(adapter.list_topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn apply_rejects_plan_with_blocking_violations() {
        let adapter = MockKafkaTopicAdapter::default();
        let store = Arc::new(InMemoryMetadataStore::default());
        let planner = TopicPlanner::default();
        let applier = TopicApplier::new(store.clone());

        let spec = topic_spec("prod.orders.created", SpecAction::Create, 12, 1);
        let plan = planner
            .plan("CHG-1", Environment::Prod, &[spec.clone()], &[], PolicyFailureMode::default(), &adapter)
            .await
            .unwrap();

        let mut specs_by_name = BTreeMap::new();
        specs_by_name.insert(spec.name.clone(), spec);

        let err = applier
            .apply(&plan, &specs_by_name, &adapter, "tester", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ApplyError::PolicyViolation(_)));

        let records = store.audit_records_for("CHG-1").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].status, AuditStatus::Started);
        assert_eq!(records[1].status, AuditStatus::Failed);
        assert_eq!(records[1].action, AuditAction::Apply);
    }
}
