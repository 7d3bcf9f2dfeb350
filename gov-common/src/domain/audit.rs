use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditStatus {
    Started,
    Completed,
    PartiallyCompleted,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DryRun,
    Apply,
    Create,
    Delete,
    AlterConfig,
    AlterPartitions,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditTarget {
    Batch,
    Topic,
    Schema,
}

/// Append-only audit record. Never mutated after construction; `timestamp`
/// is stamped by the repository writing it, not by the domain layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub change_id: String,
    pub action: AuditAction,
    pub target: AuditTarget,
    pub actor: String,
    pub status: AuditStatus,
    pub message: Option<String>,
    pub snapshot: Option<Value>,
    pub team: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        change_id: impl Into<String>,
        action: AuditAction,
        target: AuditTarget,
        actor: impl Into<String>,
        status: AuditStatus,
        message: Option<String>,
        snapshot: Option<Value>,
        team: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            change_id: change_id.into(),
            action,
            target,
            actor: actor.into(),
            status,
            message,
            snapshot,
            team,
            timestamp,
        }
    }
}
