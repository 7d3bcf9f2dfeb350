use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::environment::Environment;

/// Requested action for a topic spec within a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpecAction {
    Create,
    Update,
    Upsert,
    Delete,
}

/// Topic metadata carried alongside a spec (owners, documentation, tags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicMetadata {
    pub owners: Vec<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    Delete,
    Compact,
    #[serde(rename = "compact,delete")]
    CompactDelete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionType {
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
    Producer,
}

/// Immutable, validated topic configuration.
///
/// Maximum resource-name length enforced at `TopicSpec` construction, not
/// here: `TopicConfig` has no notion of the owning topic's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    pub partitions: u32,
    pub replication_factor: u16,
    pub cleanup_policy: CleanupPolicy,
    pub retention_ms: Option<i64>,
    pub min_insync_replicas: Option<u16>,
    pub max_message_bytes: Option<u32>,
    pub segment_ms: Option<i64>,
    pub compression_type: Option<CompressionType>,
}

impl TopicConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        partitions: u32,
        replication_factor: u16,
        cleanup_policy: CleanupPolicy,
        retention_ms: Option<i64>,
        min_insync_replicas: Option<u16>,
        max_message_bytes: Option<u32>,
        segment_ms: Option<i64>,
        compression_type: Option<CompressionType>,
    ) -> Result<Self, DomainError> {
        if partitions < 1 {
            return Err(DomainError::invariant(
                "partitions",
                "must be >= 1",
            ));
        }
        if replication_factor < 1 {
            return Err(DomainError::invariant(
                "replication_factor",
                "must be >= 1",
            ));
        }
        if let Some(isr) = min_insync_replicas {
            if isr > replication_factor {
                return Err(DomainError::invariant(
                    "min_insync_replicas",
                    "must be <= replication_factor",
                ));
            }
        }
        Ok(Self {
            partitions,
            replication_factor,
            cleanup_policy,
            retention_ms,
            min_insync_replicas,
            max_message_bytes,
            segment_ms,
            compression_type,
        })
    }

    /// Render the Kafka wire representation of the mutable (non-partition,
    /// non-replication-factor) config entries, for diffing and `AdminClient`
    /// calls.
    pub fn to_kafka_config(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert(
            "cleanup.policy".to_string(),
            match self.cleanup_policy {
                CleanupPolicy::Delete => "delete".to_string(),
                CleanupPolicy::Compact => "compact".to_string(),
                CleanupPolicy::CompactDelete => "compact,delete".to_string(),
            },
        );
        if let Some(v) = self.retention_ms {
            map.insert("retention.ms".to_string(), v.to_string());
        }
        if let Some(v) = self.min_insync_replicas {
            map.insert("min.insync.replicas".to_string(), v.to_string());
        }
        if let Some(v) = self.max_message_bytes {
            map.insert("max.message.bytes".to_string(), v.to_string());
        }
        if let Some(v) = self.segment_ms {
            map.insert("segment.ms".to_string(), v.to_string());
        }
        if let Some(v) = self.compression_type {
            map.insert(
                "compression.type".to_string(),
                match v {
                    CompressionType::None => "none".to_string(),
                    CompressionType::Gzip => "gzip".to_string(),
                    CompressionType::Snappy => "snappy".to_string(),
                    CompressionType::Lz4 => "lz4".to_string(),
                    CompressionType::Zstd => "zstd".to_string(),
                    CompressionType::Producer => "producer".to_string(),
                },
            );
        }
        map
    }
}

/// Immutable topic specification: one line item of a `Batch<TopicSpec>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub name: String,
    pub action: SpecAction,
    pub config: Option<TopicConfig>,
    pub metadata: Option<TopicMetadata>,
}

impl TopicSpec {
    pub fn new(
        name: impl Into<String>,
        action: SpecAction,
        config: Option<TopicConfig>,
        metadata: Option<TopicMetadata>,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::invariant("name", "must not be empty"));
        }
        if name.len() > 249 {
            return Err(DomainError::invariant(
                "name",
                "must not exceed 249 characters",
            ));
        }
        match action {
            SpecAction::Delete => {
                if config.is_some() {
                    return Err(DomainError::invariant(
                        "config",
                        "must be absent for a DELETE action",
                    ));
                }
            }
            SpecAction::Create | SpecAction::Update | SpecAction::Upsert => {
                if config.is_none() {
                    return Err(DomainError::invariant(
                        "config",
                        "is required for CREATE/UPDATE/UPSERT actions",
                    ));
                }
                if metadata.is_none() {
                    return Err(DomainError::invariant(
                        "metadata",
                        "is required for CREATE/UPDATE/UPSERT actions",
                    ));
                }
            }
        }
        Ok(Self {
            name,
            action,
            config,
            metadata,
        })
    }

    pub fn environment(&self) -> Environment {
        Environment::from_resource_name(&self.name)
    }

    /// 16-character hex prefix of a SHA-256 digest over the spec's
    /// canonical fields, used to decide plan staleness.
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::hash_hex(&[
            self.name.as_str(),
            &format!("{:?}", self.action),
            &serde_json::to_string(&self.config).unwrap_or_default(),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(partitions: u32, replication_factor: u16) -> TopicConfig {
        TopicConfig::new(
            partitions,
            replication_factor,
            CleanupPolicy::Delete,
            Some(604_800_000),
            Some(2),
            None,
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn zero_partitions_is_invariant() {
        let err = TopicConfig::new(0, 3, CleanupPolicy::Delete, None, None, None, None, None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "partitions"));
    }

    #[test]
    fn isr_above_replication_factor_is_invariant() {
        let err = TopicConfig::new(3, 3, CleanupPolicy::Delete, None, Some(4), None, None, None)
            .unwrap_err();
        assert!(
            matches!(err, DomainError::Invariant { field, .. } if field == "min_insync_replicas")
        );
    }

    #[test]
    fn compression_type_renders_in_kafka_config() {
        let mut cfg = config(3, 2);
        cfg.compression_type = Some(CompressionType::Zstd);
        assert_eq!(
            cfg.to_kafka_config().get("compression.type").map(String::as_str),
            Some("zstd")
        );
    }

    #[test]
    fn delete_action_rejects_config() {
        let err = TopicSpec::new("dev.orders.created", SpecAction::Delete, Some(config(1, 1)), None)
            .unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "config"));
    }

    #[test]
    fn create_action_requires_config_and_metadata() {
        let err = TopicSpec::new("dev.orders.created", SpecAction::Create, None, None).unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "config"));
    }

    #[test]
    fn name_length_boundary() {
        let ok_name = "a".repeat(249);
        assert!(TopicSpec::new(ok_name, SpecAction::Delete, None, None).is_ok());
        let too_long = "a".repeat(250);
        assert!(TopicSpec::new(too_long, SpecAction::Delete, None, None).is_err());
    }
}
