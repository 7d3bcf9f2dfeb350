use async_trait::async_trait;
use chrono::{DateTime, Utc};

use gov_common::{AuditRecord, Plan, TopicConfig, TopicMetadata};

/// Durable reference to a registered schema's source bytes: an
/// object-storage URL plus checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaArtifact {
    pub subject: String,
    pub version: i32,
    pub storage_url: Option<String>,
    pub checksum: String,
    pub change_id: String,
}

/// Transactional persistence boundary standing in for the DB session / ORM
/// layer, treated as an external collaborator. Each method commits on
/// success and rolls back on error as its own session scope; callers that
/// need two writes to succeed-or-fail together (e.g. create-then-save-
/// metadata) rely on the applier's compensating rollback, not cross-call
/// atomicity here.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn save_topic_metadata(
        &self,
        name: &str,
        metadata: &TopicMetadata,
        config: &TopicConfig,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<(), String>;

    async fn delete_topic_metadata(&self, name: &str) -> Result<(), String>;

    /// Looks up a topic's governed metadata/config, for listing handlers
    /// that join live cluster state with what this store holds.
    async fn get_topic_metadata(&self, name: &str) -> Option<(TopicMetadata, TopicConfig)>;

    async fn save_plan(&self, plan: &Plan, created_by: &str, now: DateTime<Utc>) -> Result<(), String>;

    async fn save_schema_artifact(&self, artifact: SchemaArtifact) -> Result<(), String>;

    async fn delete_schema_artifact(&self, subject: &str) -> Result<(), String>;

    async fn count_schema_versions(&self, subject: &str) -> Result<u32, String>;

    /// Audit writes must succeed for the system to be considered operating
    /// correctly: a failure here is translated to a 5xx by the caller,
    /// never silently dropped.
    async fn append_audit(&self, record: AuditRecord) -> Result<(), String>;

    async fn audit_records_for(&self, change_id: &str) -> Vec<AuditRecord>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryMetadataStore {
        pub topic_metadata: Mutex<BTreeMap<String, (TopicMetadata, TopicConfig)>>,
        pub schema_artifacts: Mutex<BTreeMap<String, Vec<SchemaArtifact>>>,
        pub audit_log: Mutex<Vec<AuditRecord>>,
        pub fail_topic_metadata_save: Mutex<bool>,
    }

    impl InMemoryMetadataStore {
        pub fn failing_topic_metadata_save(self) -> Self {
            *self.fail_topic_metadata_save.lock().unwrap() = true;
            self
        }
    }

    #[async_trait]
    impl MetadataStore for InMemoryMetadataStore {
        async fn save_topic_metadata(
            &self,
            name: &str,
            metadata: &TopicMetadata,
            config: &TopicConfig,
            _actor: &str,
            _now: DateTime<Utc>,
        ) -> Result<(), String> {
            if *self.fail_topic_metadata_save.lock().unwrap() {
                return Err("simulated metadata store outage".to_string());
            }
            self.topic_metadata
                .lock()
                .unwrap()
                .insert(name.to_string(), (metadata.clone(), config.clone()));
            Ok(())
        }

        async fn delete_topic_metadata(&self, name: &str) -> Result<(), String> {
            self.topic_metadata.lock().unwrap().remove(name);
            Ok(())
        }

        async fn get_topic_metadata(&self, name: &str) -> Option<(TopicMetadata, TopicConfig)> {
            self.topic_metadata.lock().unwrap().get(name).cloned()
        }

        async fn save_plan(&self, _plan: &Plan, _created_by: &str, _now: DateTime<Utc>) -> Result<(), String> {
            Ok(())
        }

        async fn save_schema_artifact(&self, artifact: SchemaArtifact) -> Result<(), String> {
            self.schema_artifacts
                .lock()
                .unwrap()
                .entry(artifact.subject.clone())
                .or_default()
                .push(artifact);
            Ok(())
        }

        async fn delete_schema_artifact(&self, subject: &str) -> Result<(), String> {
            self.schema_artifacts.lock().unwrap().remove(subject);
            Ok(())
        }

        async fn count_schema_versions(&self, subject: &str) -> Result<u32, String> {
            Ok(self
                .schema_artifacts
                .lock()
                .unwrap()
                .get(subject)
                .map(|v| v.len() as u32)
                .unwrap_or(0))
        }

        async fn append_audit(&self, record: AuditRecord) -> Result<(), String> {
            self.audit_log.lock().unwrap().push(record);
            Ok(())
        }

        async fn audit_records_for(&self, change_id: &str) -> Vec<AuditRecord> {
            self.audit_log
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.change_id == change_id)
                .cloned()
                .collect()
        }
    }
}
