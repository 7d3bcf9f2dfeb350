use serde::Deserialize;

use gov_common::{Severity, TopicMetadata, Violation};

/// Requires an owner on any resource's metadata. Shared between the topic
/// and schema rule families since both carry the same `TopicMetadata` shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetadataPolicy {
    pub require_owner: bool,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            require_owner: true,
        }
    }
}

impl MetadataPolicy {
    /// Build a `MetadataPolicy` from a stored policy's `content` JSON.
    pub fn from_content(content: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(content.clone())
    }


    pub fn validate(&self, resource: &str, metadata: Option<&TopicMetadata>) -> Vec<Violation> {
        if !self.require_owner {
            return Vec::new();
        }
        let has_owner = metadata.is_some_and(|m| !m.owners.is_empty());
        if has_owner {
            return Vec::new();
        }
        vec![Violation::new(
            resource,
            "metadata.owner",
            "Resource metadata owner is required",
            Severity::Error,
            Some("metadata.owners".to_string()),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_owner_is_blocking() {
        let violations = MetadataPolicy::default().validate("dev.orders.created", None);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].rule_id, "metadata.owner");
    }

    #[test]
    fn empty_owners_list_is_blocking() {
        let metadata = TopicMetadata {
            owners: vec![],
            doc: None,
            tags: vec![],
        };
        let violations = MetadataPolicy::default().validate("dev.orders.created", Some(&metadata));
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn present_owner_passes() {
        let metadata = TopicMetadata {
            owners: vec!["team-orders".to_string()],
            doc: None,
            tags: vec![],
        };
        assert!(MetadataPolicy::default()
            .validate("dev.orders.created", Some(&metadata))
            .is_empty());
    }
}
