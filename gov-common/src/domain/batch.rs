use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::environment::Environment;
use super::schema::SchemaSpec;
use super::topic::TopicSpec;

/// Minimal interface a spec type must satisfy to be batched: a unique name,
/// a derived environment, and a content fingerprint.
pub trait Specced {
    fn spec_name(&self) -> &str;
    fn spec_environment(&self) -> Environment;
    fn spec_fingerprint(&self) -> String;
}

impl Specced for TopicSpec {
    fn spec_name(&self) -> &str {
        &self.name
    }
    fn spec_environment(&self) -> Environment {
        self.environment()
    }
    fn spec_fingerprint(&self) -> String {
        self.fingerprint()
    }
}

impl Specced for SchemaSpec {
    fn spec_name(&self) -> &str {
        &self.subject
    }
    fn spec_environment(&self) -> Environment {
        self.environment()
    }
    fn spec_fingerprint(&self) -> String {
        self.fingerprint()
    }
}

/// Aggregate root: an atomic unit of declarative change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch<Spec> {
    pub change_id: String,
    pub env: Environment,
    pub specs: Vec<Spec>,
}

impl<Spec: Specced> Batch<Spec> {
    pub fn new(change_id: impl Into<String>, env: Environment, specs: Vec<Spec>) -> Result<Self, DomainError> {
        let change_id = change_id.into();
        if change_id.is_empty() {
            return Err(DomainError::invariant("change_id", "must not be empty"));
        }
        if specs.is_empty() {
            return Err(DomainError::invariant("specs", "must not be empty"));
        }
        let mut seen = BTreeSet::new();
        for spec in &specs {
            if !seen.insert(spec.spec_name()) {
                return Err(DomainError::invariant(
                    "specs",
                    format!("duplicate spec name '{}'", spec.spec_name()),
                ));
            }
            if spec.spec_environment() != env {
                return Err(DomainError::invariant(
                    "specs",
                    format!(
                        "spec '{}' derives environment {:?}, which does not match batch env {:?}",
                        spec.spec_name(),
                        spec.spec_environment(),
                        env
                    ),
                ));
            }
        }
        Ok(Self {
            change_id,
            env,
            specs,
        })
    }

    /// Hash of the change_id plus the sorted spec fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut fps: Vec<String> = self.specs.iter().map(|s| s.spec_fingerprint()).collect();
        fps.sort();
        let mut parts: Vec<&str> = vec![self.change_id.as_str()];
        parts.extend(fps.iter().map(|s| s.as_str()));
        crate::fingerprint::hash_hex(&parts)
    }
}

pub type TopicBatch = Batch<TopicSpec>;
pub type SchemaBatch = Batch<SchemaSpec>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::topic::{CleanupPolicy, SpecAction, TopicConfig, TopicMetadata};

    fn spec(name: &str) -> TopicSpec {
        TopicSpec::new(
            name,
            SpecAction::Create,
            Some(
                TopicConfig::new(1, 1, CleanupPolicy::Delete, None, None, None, None, None).unwrap(),
            ),
            Some(TopicMetadata {
                owners: vec!["team".to_string()],
                doc: None,
                tags: vec![],
            }),
        )
        .unwrap()
    }

    #[test]
    fn rejects_duplicate_names() {
        let err =
            TopicBatch::new("CHG-1", Environment::Dev, vec![spec("dev.a"), spec("dev.a")])
                .unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "specs"));
    }

    #[test]
    fn rejects_env_mismatch() {
        let err = TopicBatch::new("CHG-1", Environment::Prod, vec![spec("dev.a")]).unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "specs"));
    }

    #[test]
    fn fingerprint_is_order_independent() {
        let b1 = TopicBatch::new("CHG-1", Environment::Dev, vec![spec("dev.a"), spec("dev.b")])
            .unwrap();
        let b2 = TopicBatch::new("CHG-1", Environment::Dev, vec![spec("dev.b"), spec("dev.a")])
            .unwrap();
        assert_eq!(b1.fingerprint(), b2.fingerprint());
    }
}
