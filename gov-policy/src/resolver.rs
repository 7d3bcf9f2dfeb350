use gov_common::{Environment, Policy, PolicyStatus, PolicyTargetEnvironment, PolicyType};

fn target_environment(env: Environment) -> PolicyTargetEnvironment {
    match env {
        Environment::Dev | Environment::Unknown => PolicyTargetEnvironment::Dev,
        Environment::Stg => PolicyTargetEnvironment::Stg,
        Environment::Prod => PolicyTargetEnvironment::Prod,
    }
}

/// Resolve the single policy that governs `policy_type` for `env`, mirroring
/// `_get_active_policy`: prefer an environment-specific ACTIVE policy, fall
/// back to a "total" ACTIVE policy, otherwise fall back to built-in defaults.
pub fn resolve_active(
    policies: &[Policy],
    policy_type: PolicyType,
    env: Environment,
) -> Option<&Policy> {
    let target = target_environment(env);
    let active = |p: &&Policy| p.policy_type == policy_type && p.status == PolicyStatus::Active;

    policies
        .iter()
        .find(|p| active(p) && p.target_environment == target)
        .or_else(|| {
            policies
                .iter()
                .find(|p| active(p) && p.target_environment == PolicyTargetEnvironment::Total)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn policy(
        policy_type: PolicyType,
        status: PolicyStatus,
        target_environment: PolicyTargetEnvironment,
    ) -> Policy {
        Policy {
            policy_id: "p1".to_string(),
            policy_type,
            version: 1,
            status,
            target_environment,
            name: "test".to_string(),
            description: None,
            content: json!({}),
            created_by: "tester".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn prefers_env_specific_over_total() {
        let env_specific = policy(PolicyType::Naming, PolicyStatus::Active, PolicyTargetEnvironment::Prod);
        let total = policy(PolicyType::Naming, PolicyStatus::Active, PolicyTargetEnvironment::Total);
        let policies = vec![total, env_specific.clone()];
        let resolved = resolve_active(&policies, PolicyType::Naming, Environment::Prod).unwrap();
        assert_eq!(resolved.target_environment, PolicyTargetEnvironment::Prod);
    }

    #[test]
    fn falls_back_to_total_when_no_env_specific_match() {
        let total = policy(PolicyType::Naming, PolicyStatus::Active, PolicyTargetEnvironment::Total);
        let policies = vec![total];
        let resolved = resolve_active(&policies, PolicyType::Naming, Environment::Prod).unwrap();
        assert_eq!(resolved.target_environment, PolicyTargetEnvironment::Total);
    }

    #[test]
    fn ignores_draft_and_archived() {
        let draft = policy(PolicyType::Naming, PolicyStatus::Draft, PolicyTargetEnvironment::Prod);
        let archived = policy(PolicyType::Naming, PolicyStatus::Archived, PolicyTargetEnvironment::Total);
        let policies = vec![draft, archived];
        assert!(resolve_active(&policies, PolicyType::Naming, Environment::Prod).is_none());
    }
}
