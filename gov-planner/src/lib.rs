pub mod diff;
pub mod error;
pub mod event_bus;
pub mod metadata_store;
pub mod policy_admin;
pub mod schema;
pub mod topic;

pub use diff::{check_change_legality, diff_configs, ChangeLegalityError};
pub use error::{ApplyError, PlanError};
pub use event_bus::{EventBus, SchemaEventSubscriber, SchemaRegisteredEvent};
pub use metadata_store::{MetadataStore, SchemaArtifact};
pub use policy_admin::PolicyAdmin;
pub use schema::{SchemaApplier, SchemaDeleteOutcome, SchemaPlanner};
pub use topic::{TopicApplier, TopicPlanner};
