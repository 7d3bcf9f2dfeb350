pub mod compatibility;
pub mod engine;
pub mod guardrail;
pub mod metadata;
pub mod naming;
pub mod resolver;
pub mod schema_naming;

pub use compatibility::CompatibilityPolicy;
pub use engine::{PolicyFailureMode, SchemaPolicyEngine, TopicPolicyEngine};
pub use guardrail::{CompressionPolicy, EnvironmentGuardrails};
pub use metadata::MetadataPolicy;
pub use naming::NamingPolicy;
pub use resolver::resolve_active;
pub use schema_naming::SchemaNamingPolicy;
