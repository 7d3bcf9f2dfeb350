pub mod domain;
pub mod error;
pub mod fingerprint;
pub mod health;

pub use domain::apply_result::{ApplyResult, FailedItem};
pub use domain::audit::{AuditAction, AuditRecord, AuditStatus, AuditTarget};
pub use domain::batch::{Batch, SchemaBatch, Specced, TopicBatch};
pub use domain::endpoint::{Endpoint, EndpointKind};
pub use domain::environment::Environment;
pub use domain::metrics::{MetricsSnapshot, PartitionMeta, TopicMeta};
pub use domain::plan::{Plan, PlanAction, PlanItem};
pub use domain::policy::{Policy, PolicyStatus, PolicyTargetEnvironment, PolicyType};
pub use domain::schema::{
    CompatibilityMode, SchemaReference, SchemaSource, SchemaSpec, SchemaType,
};
pub use domain::topic::{
    CleanupPolicy, CompressionType, SpecAction, TopicConfig, TopicMetadata, TopicSpec,
};
pub use domain::violation::{sort_stable, CompatibilityReport, Severity, Violation};
pub use error::DomainError;
