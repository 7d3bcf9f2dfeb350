//! In-memory test doubles for the three adapter traits, in the same
//! builder-and-clone shape as `feature_flags::redis::MockRedisClient`.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use gov_common::{CompatibilityMode, CompatibilityReport, SchemaSpec, TopicConfig};

use crate::error::AdapterError;
use crate::kafka::{BrokerInfo, KafkaTopicAdapter, LogDirEntry, TopicDescription};
use crate::object_storage::ObjectStorageAdapter;
use crate::schema_registry::{SchemaRegistryAdapter, SubjectDescription};

#[derive(Default)]
pub struct MockKafkaTopicAdapter {
    pub topics: Mutex<BTreeMap<String, TopicDescription>>,
    /// Names that the next `create_topics` call should report as failed,
    /// with the error message to use.
    pub fail_create: Mutex<BTreeMap<String, String>>,
    pub fail_delete: Mutex<BTreeMap<String, String>>,
    pub fail_alter: Mutex<BTreeMap<String, String>>,
    pub fail_create_partitions: Mutex<BTreeMap<String, String>>,
}

impl MockKafkaTopicAdapter {
    pub fn with_topic(self, name: &str, description: TopicDescription) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(name.to_string(), description);
        self
    }

    pub fn failing_create(self, name: &str, message: &str) -> Self {
        self.fail_create
            .lock()
            .unwrap()
            .insert(name.to_string(), message.to_string());
        self
    }
}

#[async_trait]
impl KafkaTopicAdapter for MockKafkaTopicAdapter {
    async fn list_topics(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.topics.lock().unwrap().keys().cloned().collect())
    }

    async fn describe_topics(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, TopicDescription>, AdapterError> {
        let topics = self.topics.lock().unwrap();
        Ok(names
            .iter()
            .filter_map(|n| topics.get(n).map(|d| (n.clone(), d.clone())))
            .collect())
    }

    async fn create_topics(
        &self,
        specs: &[(String, TopicConfig)],
    ) -> Result<BTreeMap<String, Option<String>>, AdapterError> {
        let mut out = BTreeMap::new();
        let fail = self.fail_create.lock().unwrap();
        let mut topics = self.topics.lock().unwrap();
        for (name, config) in specs {
            if let Some(message) = fail.get(name) {
                out.insert(name.clone(), Some(message.clone()));
                continue;
            }
            topics.insert(
                name.clone(),
                TopicDescription {
                    partition_count: config.partitions,
                    replication_factor: config.replication_factor,
                    config: config.to_kafka_config(),
                    partitions: (0..config.partitions as i32)
                        .map(|id| crate::kafka::PartitionDescription {
                            id,
                            leader: 0,
                            replicas: vec![0],
                            isrs: vec![0],
                        })
                        .collect(),
                },
            );
            out.insert(name.clone(), None);
        }
        Ok(out)
    }

    async fn delete_topics(
        &self,
        names: &[String],
    ) -> Result<BTreeMap<String, Option<String>>, AdapterError> {
        let mut out = BTreeMap::new();
        let fail = self.fail_delete.lock().unwrap();
        let mut topics = self.topics.lock().unwrap();
        for name in names {
            if let Some(message) = fail.get(name) {
                out.insert(name.clone(), Some(message.clone()));
                continue;
            }
            topics.remove(name);
            out.insert(name.clone(), None);
        }
        Ok(out)
    }

    async fn alter_topic_configs(
        &self,
        configs: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Result<BTreeMap<String, Option<String>>, AdapterError> {
        let mut out = BTreeMap::new();
        let fail = self.fail_alter.lock().unwrap();
        let mut topics = self.topics.lock().unwrap();
        for (name, entries) in configs {
            if let Some(message) = fail.get(name) {
                out.insert(name.clone(), Some(message.clone()));
                continue;
            }
            if let Some(topic) = topics.get_mut(name) {
                topic.config.extend(entries.clone());
            }
            out.insert(name.clone(), None);
        }
        Ok(out)
    }

    async fn create_partitions(
        &self,
        new_counts: &BTreeMap<String, u32>,
    ) -> Result<BTreeMap<String, Option<String>>, AdapterError> {
        let mut out = BTreeMap::new();
        let fail = self.fail_create_partitions.lock().unwrap();
        let mut topics = self.topics.lock().unwrap();
        for (name, count) in new_counts {
            if let Some(message) = fail.get(name) {
                out.insert(name.clone(), Some(message.clone()));
                continue;
            }
            if let Some(topic) = topics.get_mut(name) {
                topic.partition_count = *count;
            }
            out.insert(name.clone(), None);
        }
        Ok(out)
    }

    async fn describe_cluster(&self) -> Result<Vec<BrokerInfo>, AdapterError> {
        Ok(vec![BrokerInfo { id: 0 }])
    }

    async fn describe_log_dirs(&self) -> Result<Vec<LogDirEntry>, AdapterError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MockSchemaRegistryAdapter {
    pub subjects: Mutex<BTreeMap<String, SubjectDescription>>,
    pub compatible: Mutex<bool>,
}

impl MockSchemaRegistryAdapter {
    pub fn incompatible(self) -> Self {
        *self.compatible.lock().unwrap() = false;
        self
    }
}

#[async_trait]
impl SchemaRegistryAdapter for MockSchemaRegistryAdapter {
    async fn describe_subjects(
        &self,
        subjects: &[String],
    ) -> Result<BTreeMap<String, SubjectDescription>, AdapterError> {
        let known = self.subjects.lock().unwrap();
        Ok(subjects
            .iter()
            .filter_map(|s| known.get(s).map(|d| (s.clone(), d.clone())))
            .collect())
    }

    async fn check_compatibility(&self, spec: &SchemaSpec) -> CompatibilityReport {
        let compatible = *self.compatible.lock().unwrap();
        CompatibilityReport {
            subject: spec.subject.clone(),
            mode: format!("{:?}", spec.compatibility_mode),
            is_compatible: compatible,
            issues: if compatible {
                Vec::new()
            } else {
                vec!["mock: marked incompatible".to_string()]
            },
        }
    }

    async fn register_schema(&self, spec: &SchemaSpec) -> Result<(i32, i32), AdapterError> {
        let mut subjects = self.subjects.lock().unwrap();
        let version = subjects
            .get(&spec.subject)
            .map(|d| d.version + 1)
            .unwrap_or(1);
        let schema_id = subjects.len() as i32 + 1;
        subjects.insert(
            spec.subject.clone(),
            SubjectDescription {
                version,
                schema_id,
                schema: spec.schema_literal.clone().unwrap_or_default(),
                schema_type: spec.schema_type,
                references: Vec::new(),
                hash: String::new(),
            },
        );
        Ok((version, schema_id))
    }

    async fn set_compatibility_mode(
        &self,
        _subject: &str,
        _mode: CompatibilityMode,
    ) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn delete_subject(&self, subject: &str) -> Result<Vec<i32>, AdapterError> {
        let mut subjects = self.subjects.lock().unwrap();
        Ok(subjects
            .remove(subject)
            .map(|d| (1..=d.version).collect())
            .unwrap_or_default())
    }

    async fn list_all_subjects(&self) -> Result<Vec<String>, AdapterError> {
        Ok(self.subjects.lock().unwrap().keys().cloned().collect())
    }
}

#[derive(Default)]
pub struct MockObjectStorageAdapter {
    pub objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

#[async_trait]
impl ObjectStorageAdapter for MockObjectStorageAdapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _metadata: Option<Vec<(String, String)>>,
    ) -> Result<String, AdapterError> {
        self.objects.lock().unwrap().insert(key.to_string(), bytes);
        Ok(format!("mock://{key}"))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AdapterError> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(key.to_string()))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), AdapterError> {
        self.objects
            .lock()
            .unwrap()
            .retain(|k, _| !k.starts_with(prefix));
        Ok(())
    }
}
