use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::environment::Environment;
use super::violation::{CompatibilityReport, Violation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanAction {
    Create,
    Alter,
    Delete,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    pub name: String,
    pub action: PlanAction,
    pub diff: BTreeMap<String, String>,
    pub current_config: Option<BTreeMap<String, String>>,
    pub target_config: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub change_id: String,
    pub env: Environment,
    pub items: Vec<PlanItem>,
    pub violations: Vec<Violation>,
    pub compatibility_reports: Vec<CompatibilityReport>,
}

impl Plan {
    pub fn new(
        change_id: impl Into<String>,
        env: Environment,
        items: Vec<PlanItem>,
        violations: Vec<Violation>,
        compatibility_reports: Vec<CompatibilityReport>,
    ) -> Self {
        Self {
            change_id: change_id.into(),
            env,
            items,
            violations,
            compatibility_reports,
        }
    }

    /// `true` when no blocking violation exists and every compatibility
    /// report is compatible.
    pub fn can_apply(&self) -> bool {
        !self.violations.iter().any(|v| v.severity.is_blocking())
            && self
                .compatibility_reports
                .iter()
                .all(|r| r.is_compatible)
    }

    pub fn summary(&self) -> BTreeMap<String, usize> {
        let mut summary = BTreeMap::new();
        for item in &self.items {
            let key = format!("{:?}", item.action).to_lowercase();
            *summary.entry(key).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::violation::Severity;

    fn item(name: &str, action: PlanAction) -> PlanItem {
        PlanItem {
            name: name.to_string(),
            action,
            diff: BTreeMap::new(),
            current_config: None,
            target_config: None,
        }
    }

    #[test]
    fn can_apply_false_on_error_violation() {
        let plan = Plan::new(
            "CHG-1",
            Environment::Prod,
            vec![item("prod.a", PlanAction::Create)],
            vec![Violation::new(
                "prod.a",
                "prod.min_replication_factor",
                "too low",
                Severity::Error,
                None,
            )],
            vec![],
        );
        assert!(!plan.can_apply());
    }

    #[test]
    fn can_apply_true_with_only_warnings() {
        let plan = Plan::new(
            "CHG-1",
            Environment::Prod,
            vec![item("prod.a", PlanAction::Create)],
            vec![Violation::new(
                "prod.a",
                "compression.recommended",
                "consider compression",
                Severity::Warning,
                None,
            )],
            vec![],
        );
        assert!(plan.can_apply());
    }

    #[test]
    fn can_apply_false_on_incompatible_schema() {
        let plan: Plan = Plan::new(
            "CHG-1",
            Environment::Dev,
            vec![],
            vec![],
            vec![CompatibilityReport {
                subject: "dev.user".to_string(),
                mode: "BACKWARD".to_string(),
                is_compatible: false,
                issues: vec!["field removed".to_string()],
            }],
        );
        assert!(!plan.can_apply());
    }
}
