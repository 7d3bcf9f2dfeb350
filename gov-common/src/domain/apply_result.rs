use serde::{Deserialize, Serialize};

use super::environment::Environment;
use super::plan::PlanAction;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub name: String,
    pub error: String,
    pub action: PlanAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyResult {
    pub change_id: String,
    pub env: Environment,
    pub applied: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedItem>,
    pub audit_id: String,
    pub artifacts: Vec<String>,
}

impl ApplyResult {
    /// Overall status derived from the applied/failed split: all applied,
    /// none applied, or a mix.
    pub fn status(&self) -> super::audit::AuditStatus {
        use super::audit::AuditStatus;
        match (self.applied.is_empty(), self.failed.is_empty()) {
            (_, true) => AuditStatus::Completed,
            (false, false) => AuditStatus::PartiallyCompleted,
            (true, false) => AuditStatus::Failed,
        }
    }
}
