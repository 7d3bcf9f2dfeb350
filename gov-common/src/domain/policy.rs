use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyType {
    Naming,
    Guardrail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PolicyStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyTargetEnvironment {
    Dev,
    Stg,
    Prod,
    Total,
}

/// Persisted, versioned policy row.
///
/// Invariants (enforced by the repository that stores these, not by this
/// value object in isolation, since "at most one ACTIVE per policy_id" is a
/// cross-row constraint): at most one ACTIVE version per `policy_id`; at
/// most one ACTIVE policy per `(type, target_environment)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: String,
    pub policy_type: PolicyType,
    pub version: i32,
    pub status: PolicyStatus,
    pub target_environment: PolicyTargetEnvironment,
    pub name: String,
    pub description: Option<String>,
    pub content: Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}
