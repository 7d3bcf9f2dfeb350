use tracing::warn;

use gov_common::{sort_stable, Policy, PolicyType, SchemaSpec, TopicSpec, Violation};

use crate::compatibility::CompatibilityPolicy;
use crate::guardrail::{CompressionPolicy, EnvironmentGuardrails};
use crate::metadata::MetadataPolicy;
use crate::naming::NamingPolicy;
use crate::resolver::resolve_active;
use crate::schema_naming::SchemaNamingPolicy;

/// Whether a malformed stored policy blocks the batch (fail-closed) or is
/// skipped in favor of built-in defaults (fail-open, the default posture:
/// a broken policy row must never be the reason a topic can't be created).
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyFailureMode {
    pub fail_closed: bool,
}

fn resolved_naming(policies: &[Policy], env: gov_common::Environment, mode: PolicyFailureMode) -> (NamingPolicy, Vec<Violation>) {
    match resolve_active(policies, PolicyType::Naming, env) {
        None => (NamingPolicy::default(), Vec::new()),
        Some(policy) => match NamingPolicy::from_content(&policy.content) {
            Ok(custom) => (custom, Vec::new()),
            Err(e) => {
                warn!(policy_id = %policy.policy_id, error = %e, "malformed naming policy content");
                if mode.fail_closed {
                    (
                        NamingPolicy::default(),
                        vec![Violation::new(
                            &policy.policy_id,
                            "policy.naming.malformed",
                            format!("Naming policy '{}' has malformed content: {e}", policy.policy_id),
                            gov_common::Severity::Critical,
                            None,
                        )],
                    )
                } else {
                    (NamingPolicy::default(), Vec::new())
                }
            }
        },
    }
}

/// Composes the rule families that apply to topic specs: naming, environment
/// guardrails, and compression recommendation.
#[derive(Debug, Clone, Default)]
pub struct TopicPolicyEngine {
    pub guardrails: EnvironmentGuardrails,
    pub compression: CompressionPolicy,
    pub metadata: MetadataPolicy,
}

impl TopicPolicyEngine {
    pub fn validate_batch(
        &self,
        specs: &[TopicSpec],
        policies: &[Policy],
        mode: PolicyFailureMode,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        for spec in specs {
            let (naming, mut policy_errors) = resolved_naming(policies, spec.environment(), mode);
            violations.append(&mut policy_errors);
            violations.extend(naming.validate(spec));
            violations.extend(self.guardrails.validate(spec));
            violations.extend(self.metadata.validate(
                &spec.name,
                spec.metadata.as_ref(),
            ));
            if let Some(config) = &spec.config {
                let compression = config
                    .compression_type
                    .unwrap_or(gov_common::CompressionType::Producer);
                violations.extend(self.compression.validate(spec, compression));
            }
        }
        sort_stable(&mut violations);
        violations
    }
}

/// Composes the rule families that apply to schema specs: subject naming,
/// compatibility mode whitelist, and owner metadata.
#[derive(Debug, Clone, Default)]
pub struct SchemaPolicyEngine {
    pub naming: SchemaNamingPolicy,
    pub compatibility: CompatibilityPolicy,
    pub metadata: MetadataPolicy,
}

impl SchemaPolicyEngine {
    pub fn validate_batch(&self, specs: &[SchemaSpec]) -> Vec<Violation> {
        let mut violations = Vec::new();
        for spec in specs {
            violations.extend(self.naming.validate(spec));
            violations.extend(self.compatibility.validate(spec));
            violations.extend(
                self.metadata
                    .validate(&spec.subject, spec.metadata.as_ref()),
            );
        }
        sort_stable(&mut violations);
        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_common::{CleanupPolicy, CompatibilityMode, SchemaType, SpecAction, TopicConfig, TopicMetadata};

    fn topic_spec(name: &str) -> TopicSpec {
        TopicSpec::new(
            name,
            SpecAction::Create,
            Some(TopicConfig::new(1, 3, CleanupPolicy::Delete, Some(604_800_000), Some(2), None, None, None).unwrap()),
            Some(TopicMetadata {
                owners: vec!["team-orders".to_string()],
                doc: None,
                tags: vec![],
            }),
        )
        .unwrap()
    }

    #[test]
    fn topic_engine_sorts_by_resource_then_rule() {
        let engine = TopicPolicyEngine::default();
        let specs = vec![topic_spec("prod.tmp.orders"), topic_spec("prod.orders.created")];
        let violations = engine.validate_batch(&specs, &[], PolicyFailureMode::default());
        let resources: Vec<&str> = violations.iter().map(|v| v.resource.as_str()).collect();
        let mut sorted = resources.clone();
        sorted.sort();
        assert_eq!(resources, sorted);
    }

    #[test]
    fn schema_engine_flags_missing_owner() {
        let spec = SchemaSpec::new(
            "prod.orders.created-value",
            SchemaType::Avro,
            CompatibilityMode::Full,
            Some("{}".to_string()),
            None,
            vec![],
            None,
            false,
        )
        .unwrap();
        let engine = SchemaPolicyEngine::default();
        let violations = engine.validate_batch(&[spec]);
        assert!(violations.iter().any(|v| v.rule_id == "metadata.owner"));
    }

    #[test]
    fn topic_engine_flags_prod_compression_none() {
        let spec = TopicSpec::new(
            "prod.orders.created",
            SpecAction::Create,
            Some(
                TopicConfig::new(
                    1,
                    3,
                    CleanupPolicy::Delete,
                    Some(604_800_000),
                    Some(2),
                    None,
                    None,
                    Some(gov_common::CompressionType::None),
                )
                .unwrap(),
            ),
            Some(TopicMetadata {
                owners: vec!["team-orders".to_string()],
                doc: None,
                tags: vec![],
            }),
        )
        .unwrap();
        let engine = TopicPolicyEngine::default();
        let violations = engine.validate_batch(&[spec], &[], PolicyFailureMode::default());
        assert!(violations.iter().any(|v| v.rule_id == "compression.recommended"));
    }
}
