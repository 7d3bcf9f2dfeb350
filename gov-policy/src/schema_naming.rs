use once_cell::sync::Lazy;
use regex::Regex;

use gov_common::{Environment, Severity, SchemaSpec, Violation};

/// Default subject pattern: `{env}.{rest}`, optionally suffixed with the
/// Schema Registry's `-key`/`-value` convention.
static DEFAULT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((dev|stg|prod)\.)[a-z0-9._-]+(-key|-value)?$").unwrap());

const FORBIDDEN_PROD_PREFIXES: &[&str] = &["tmp.", "test."];

/// Schema-subject naming policy, mirroring the original schema `NamingPolicy`.
#[derive(Debug, Clone)]
pub struct SchemaNamingPolicy {
    pattern: Regex,
    forbidden_prod_prefixes: Vec<String>,
}

impl Default for SchemaNamingPolicy {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
            forbidden_prod_prefixes: FORBIDDEN_PROD_PREFIXES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SchemaNamingPolicy {
    pub fn validate(&self, spec: &SchemaSpec) -> Vec<Violation> {
        let mut violations = Vec::new();
        let subject = &spec.subject;

        if !self.pattern.is_match(subject) {
            violations.push(Violation::new(
                subject,
                "schema.naming.pattern",
                format!(
                    "Subject '{subject}' does not match pattern '{}'",
                    self.pattern.as_str()
                ),
                Severity::Error,
                Some("subject".to_string()),
            ));
        }

        if spec.environment() == Environment::Prod {
            for forbidden in &self.forbidden_prod_prefixes {
                if subject.starts_with(forbidden.as_str()) {
                    violations.push(Violation::new(
                        subject,
                        "schema.naming.forbidden_prefix",
                        format!("Prefix '{forbidden}' is forbidden in prod"),
                        Severity::Error,
                        Some("subject".to_string()),
                    ));
                }
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_common::{CompatibilityMode, SchemaType};

    fn spec(subject: &str) -> SchemaSpec {
        SchemaSpec::new(
            subject,
            SchemaType::Avro,
            CompatibilityMode::Backward,
            Some("{}".to_string()),
            None,
            vec![],
            None,
            false,
        )
        .unwrap()
    }

    #[test]
    fn accepts_key_value_suffix() {
        assert!(SchemaNamingPolicy::default()
            .validate(&spec("prod.orders.created-value"))
            .is_empty());
    }

    #[test]
    fn rejects_tmp_prefix_in_prod() {
        let violations = SchemaNamingPolicy::default().validate(&spec("prod.tmp.orders-value"));
        assert!(violations
            .iter()
            .any(|v| v.rule_id == "schema.naming.forbidden_prefix"));
    }
}
