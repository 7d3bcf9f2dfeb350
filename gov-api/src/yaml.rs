//! Parses `kind: TopicBatch` / `kind: SchemaBatch` YAML documents into
//! domain `Batch`es, translating both parser errors and construction
//! invariants into the bulleted, field-level messages the interface layer
//! promises callers.

use serde::Deserialize;

use gov_common::{
    CleanupPolicy, CompatibilityMode, CompressionType, Environment, SchemaBatch, SchemaReference,
    SchemaSource, SchemaSpec, SchemaType, SpecAction, TopicBatch, TopicConfig, TopicMetadata,
    TopicSpec,
};

use crate::error::{validation_error, ApiError};

#[derive(Debug, Deserialize)]
struct RawTopicConfig {
    partitions: u32,
    replication_factor: u16,
    #[serde(default = "default_cleanup_policy")]
    cleanup_policy: CleanupPolicy,
    retention_ms: Option<i64>,
    min_insync_replicas: Option<u16>,
    max_message_bytes: Option<u32>,
    segment_ms: Option<i64>,
    #[serde(default)]
    compression_type: Option<CompressionType>,
}

fn default_cleanup_policy() -> CleanupPolicy {
    CleanupPolicy::Delete
}

#[derive(Debug, Deserialize)]
struct RawTopicItem {
    name: String,
    action: SpecAction,
    #[serde(default)]
    config: Option<RawTopicConfig>,
    #[serde(default)]
    metadata: Option<TopicMetadata>,
}

#[derive(Debug, Deserialize)]
struct RawTopicBatch {
    #[serde(default)]
    kind: Option<String>,
    change_id: String,
    env: String,
    items: Vec<RawTopicItem>,
}

/// Parses a `kind: TopicBatch` YAML document into a validated `TopicBatch`.
pub fn parse_topic_batch(body: &str) -> Result<TopicBatch, ApiError> {
    let raw: RawTopicBatch = serde_yaml::from_str(body)
        .map_err(|e| validation_error(vec![format!("yaml: {e}")]))?;

    if let Some(kind) = &raw.kind {
        if kind != "TopicBatch" {
            return Err(validation_error(vec![format!(
                "kind: expected 'TopicBatch', found '{kind}'"
            )]));
        }
    }

    let env: Environment = raw
        .env
        .parse()
        .map_err(|_| validation_error(vec![format!("env: unrecognized environment '{}'", raw.env)]))?;

    let mut problems = Vec::new();
    let mut specs = Vec::new();
    for item in raw.items {
        let config = match item.config {
            Some(c) => match TopicConfig::new(
                c.partitions,
                c.replication_factor,
                c.cleanup_policy,
                c.retention_ms,
                c.min_insync_replicas,
                c.max_message_bytes,
                c.segment_ms,
                c.compression_type,
            ) {
                Ok(config) => Some(config),
                Err(e) => {
                    problems.push(format!("items[{}]: {e}", item.name));
                    continue;
                }
            },
            None => None,
        };
        match TopicSpec::new(item.name.clone(), item.action, config, item.metadata) {
            Ok(spec) => specs.push(spec),
            Err(e) => problems.push(format!("items[{}]: {e}", item.name)),
        }
    }

    if !problems.is_empty() {
        return Err(validation_error(problems));
    }

    TopicBatch::new(raw.change_id, env, specs).map_err(|e| validation_error(vec![e.to_string()]))
}

#[derive(Debug, Deserialize)]
struct RawSchemaItem {
    subject: String,
    schema_type: SchemaType,
    compatibility: CompatibilityMode,
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    source: Option<SchemaSource>,
    #[serde(default)]
    references: Vec<SchemaReference>,
    #[serde(default)]
    metadata: Option<TopicMetadata>,
    #[serde(default)]
    dry_run_only: bool,
}

#[derive(Debug, Deserialize)]
struct RawSchemaBatch {
    #[serde(default)]
    kind: Option<String>,
    change_id: String,
    env: String,
    items: Vec<RawSchemaItem>,
}

/// Parses a `kind: SchemaBatch` YAML document into a validated `SchemaBatch`.
pub fn parse_schema_batch(body: &str) -> Result<SchemaBatch, ApiError> {
    let raw: RawSchemaBatch = serde_yaml::from_str(body)
        .map_err(|e| validation_error(vec![format!("yaml: {e}")]))?;

    if let Some(kind) = &raw.kind {
        if kind != "SchemaBatch" {
            return Err(validation_error(vec![format!(
                "kind: expected 'SchemaBatch', found '{kind}'"
            )]));
        }
    }

    let env: Environment = raw
        .env
        .parse()
        .map_err(|_| validation_error(vec![format!("env: unrecognized environment '{}'", raw.env)]))?;

    let mut problems = Vec::new();
    let mut specs = Vec::new();
    for item in raw.items {
        match SchemaSpec::new(
            item.subject.clone(),
            item.schema_type,
            item.compatibility,
            item.schema,
            item.source,
            item.references,
            item.metadata,
            item.dry_run_only,
        ) {
            Ok(spec) => specs.push(spec),
            Err(e) => problems.push(format!("items[{}]: {e}", item.subject)),
        }
    }

    if !problems.is_empty() {
        return Err(validation_error(problems));
    }

    SchemaBatch::new(raw.change_id, env, specs).map_err(|e| validation_error(vec![e.to_string()]))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC_BATCH_YAML: &str = r#"
kind: TopicBatch
change_id: CHG-2025-0001
env: dev
items:
  - name: dev.orders.created
    action: CREATE
    config:
      partitions: 6
      replication_factor: 2
      cleanup_policy: delete
      retention_ms: 86400000
    metadata:
      owners: [data-platform]
      doc: https://wiki/.../orders
      tags: [pii, critical]
"#;

    #[test]
    fn parses_the_documented_topic_batch_shape() {
        let batch = parse_topic_batch(TOPIC_BATCH_YAML).unwrap();
        assert_eq!(batch.change_id, "CHG-2025-0001");
        assert_eq!(batch.env, Environment::Dev);
        assert_eq!(batch.specs.len(), 1);
        let spec = &batch.specs[0];
        assert_eq!(spec.name, "dev.orders.created");
        assert_eq!(spec.action, SpecAction::Create);
        let config = spec.config.as_ref().unwrap();
        assert_eq!(config.partitions, 6);
        assert_eq!(config.replication_factor, 2);
        let metadata = spec.metadata.as_ref().unwrap();
        assert_eq!(metadata.owners, vec!["data-platform".to_string()]);
    }

    #[test]
    fn rejects_a_kind_mismatch() {
        let body = "kind: SchemaBatch\nchange_id: CHG-1\nenv: dev\nitems: []\n";
        let err = parse_topic_batch(body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn rejects_unparseable_yaml() {
        let err = parse_topic_batch("not: [valid").unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn surfaces_invariant_violations_as_field_level_problems() {
        let body = r#"
change_id: CHG-2
env: prod
items:
  - name: ""
    action: CREATE
    config:
      partitions: 1
      replication_factor: 1
      cleanup_policy: delete
    metadata:
      owners: [team]
"#;
        let err = parse_topic_batch(body).unwrap_err();
        match err {
            ApiError::Validation(problems) => assert!(!problems.is_empty()),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_subjects_are_rejected_at_batch_construction() {
        let body = r#"
change_id: CHG-3
env: dev
items:
  - subject: dev.user-value
    schema_type: AVRO
    compatibility: BACKWARD
    schema: "{\"type\":\"record\",\"name\":\"User\",\"fields\":[]}"
    metadata:
      owners: [team]
  - subject: dev.user-value
    schema_type: AVRO
    compatibility: BACKWARD
    schema: "{\"type\":\"record\",\"name\":\"User\",\"fields\":[]}"
    metadata:
      owners: [team]
"#;
        let err = parse_schema_batch(body).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }
}
