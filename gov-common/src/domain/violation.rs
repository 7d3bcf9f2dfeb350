use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

/// A single policy finding against a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub resource: String,
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    pub field: Option<String>,
}

impl Violation {
    pub fn new(
        resource: impl Into<String>,
        rule_id: impl Into<String>,
        message: impl Into<String>,
        severity: Severity,
        field: Option<String>,
    ) -> Self {
        Self {
            resource: resource.into(),
            rule_id: rule_id.into(),
            message: message.into(),
            severity,
            field,
        }
    }
}

/// Sort violations into the stable `(resource, rule_id)` order required by
/// the policy engine's contract.
pub fn sort_stable(violations: &mut [Violation]) {
    violations.sort_by(|a, b| (&a.resource, &a.rule_id).cmp(&(&b.resource, &b.rule_id)));
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub subject: String,
    pub mode: String,
    pub is_compatible: bool,
    pub issues: Vec<String>,
}
