use gov_common::{CompatibilityMode, Environment, Severity, SchemaSpec, Violation};

/// Per-environment whitelist of acceptable Schema Registry compatibility
/// modes, mirroring the original `CompatibilityPolicy` schema rule.
#[derive(Debug, Clone, Default)]
pub struct CompatibilityPolicy;

impl CompatibilityPolicy {
    pub fn validate(&self, spec: &SchemaSpec) -> Vec<Violation> {
        let expected = Self::expected_modes(spec.environment());
        if expected.contains(&spec.compatibility_mode) {
            return Vec::new();
        }
        let expected_str = expected
            .iter()
            .map(|m| format!("{m:?}"))
            .collect::<Vec<_>>()
            .join(",");
        vec![Violation::new(
            &spec.subject,
            "schema.compatibility.mode",
            format!(
                "Compatibility mode '{:?}' is not allowed in {}; expected one of [{expected_str}]",
                spec.compatibility_mode,
                spec.environment().as_str()
            ),
            Severity::Error,
            Some("compatibility_mode".to_string()),
        )]
    }

    fn expected_modes(env: Environment) -> &'static [CompatibilityMode] {
        match env {
            Environment::Prod => &[CompatibilityMode::Full, CompatibilityMode::FullTransitive],
            Environment::Stg => &[
                CompatibilityMode::Backward,
                CompatibilityMode::BackwardTransitive,
                CompatibilityMode::Full,
                CompatibilityMode::FullTransitive,
            ],
            Environment::Dev | Environment::Unknown => &[
                CompatibilityMode::Backward,
                CompatibilityMode::BackwardTransitive,
                CompatibilityMode::None,
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_common::SchemaType;

    fn spec(subject: &str, mode: CompatibilityMode) -> SchemaSpec {
        SchemaSpec::new(
            subject,
            SchemaType::Avro,
            mode,
            Some("{}".to_string()),
            None,
            vec![],
            None,
            false,
        )
        .unwrap()
    }

    #[test]
    fn prod_requires_full_transitive_family() {
        let violations =
            CompatibilityPolicy.validate(&spec("prod.orders.created-value", CompatibilityMode::Backward));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "schema.compatibility.mode");
    }

    #[test]
    fn prod_full_passes() {
        assert!(CompatibilityPolicy
            .validate(&spec("prod.orders.created-value", CompatibilityMode::Full))
            .is_empty());
    }

    #[test]
    fn dev_none_passes() {
        assert!(CompatibilityPolicy
            .validate(&spec("dev.orders.created-value", CompatibilityMode::None))
            .is_empty());
    }
}
