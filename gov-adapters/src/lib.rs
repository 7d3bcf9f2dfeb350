pub mod error;
pub mod kafka;
pub mod object_storage;
pub mod schema_registry;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use error::AdapterError;
pub use kafka::{BrokerInfo, KafkaTopicAdapter, LogDirEntry, PartitionDescription, RdKafkaTopicAdapter, TopicDescription};
pub use object_storage::{ObjectStorageAdapter, S3ObjectStorageAdapter};
pub use schema_registry::{HttpSchemaRegistryAdapter, SchemaRegistryAdapter, SubjectDescription};
