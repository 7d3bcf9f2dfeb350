use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use gov_common::{Environment, Severity, TopicSpec, Violation};

/// Default naming pattern: `{env}.{rest}`, lowercase alnum/dot/dash/underscore.
static DEFAULT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((dev|stg|prod)\.)[a-z0-9._-]+$").unwrap());

const FORBIDDEN_PREFIXES: &[&str] = &["tmp.", "test."];

const RESERVED_WORDS: &[&str] = &[
    "__consumer_offsets",
    "__transaction_state",
    "_schemas",
    "connect-configs",
    "connect-offsets",
    "connect-status",
];

const MAX_NAME_LEN: usize = 249;

/// Topic-naming policy: regex pattern, forbidden-prefix, and reserved-word
/// checks, mirroring the original `NamingPolicy` topic rule.
#[derive(Debug, Clone)]
pub struct NamingPolicy {
    pattern: Regex,
    forbidden_prefixes: Vec<String>,
    reserved_words: Vec<String>,
}

impl Default for NamingPolicy {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_PATTERN.clone(),
            forbidden_prefixes: FORBIDDEN_PREFIXES.iter().map(|s| s.to_string()).collect(),
            reserved_words: RESERVED_WORDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Wire shape of a stored naming `Policy.content`, overriding the subset of
/// `NamingPolicy` fields an operator has customized.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct NamingPolicyConfig {
    pattern: String,
    forbidden_prefixes: Vec<String>,
    reserved_words: Vec<String>,
}

impl Default for NamingPolicyConfig {
    fn default() -> Self {
        let defaults = NamingPolicy::default();
        Self {
            pattern: defaults.pattern.as_str().to_string(),
            forbidden_prefixes: defaults.forbidden_prefixes,
            reserved_words: defaults.reserved_words,
        }
    }
}

impl NamingPolicy {
    /// Build a `NamingPolicy` from a stored policy's `content` JSON,
    /// overriding only the fields present in it. Returns a deserialize error
    /// on malformed content; the caller decides fail-open/fail-closed.
    pub fn from_content(content: &serde_json::Value) -> Result<Self, serde_json::Error> {
        let config: NamingPolicyConfig = serde_json::from_value(content.clone())?;
        let pattern = Regex::new(&config.pattern)
            .map_err(|e| serde::de::Error::custom(format!("invalid pattern: {e}")))?;
        Ok(Self {
            pattern,
            forbidden_prefixes: config.forbidden_prefixes,
            reserved_words: config.reserved_words,
        })
    }

    pub fn validate(&self, spec: &TopicSpec) -> Vec<Violation> {
        let mut violations = Vec::new();
        let name = &spec.name;
        let env = spec.environment();

        if name.len() > MAX_NAME_LEN {
            violations.push(Violation::new(
                name,
                "naming.max_length",
                format!("Topic name '{name}' exceeds {MAX_NAME_LEN} characters"),
                Severity::Error,
                Some("name".to_string()),
            ));
        }

        if !self.pattern.is_match(name) {
            violations.push(Violation::new(
                name,
                "naming.pattern",
                format!(
                    "Topic name '{name}' does not match pattern '{}'",
                    self.pattern.as_str()
                ),
                Severity::Error,
                Some("name".to_string()),
            ));
        }

        for prefix in &self.forbidden_prefixes {
            if name.starts_with(prefix.as_str()) {
                violations.push(Violation::new(
                    name,
                    "naming.forbidden_prefix",
                    format!("Prefix '{prefix}' is forbidden in {} environment", env.as_str()),
                    if env == Environment::Prod {
                        Severity::Error
                    } else {
                        Severity::Warning
                    },
                    Some("name".to_string()),
                ));
            }
        }

        let base_name = name.split_once('.').map(|(_, rest)| rest).unwrap_or(name.as_str());
        if self.reserved_words.iter().any(|w| w == base_name) {
            violations.push(Violation::new(
                name,
                "naming.reserved_word",
                format!("Topic name '{base_name}' is a reserved word"),
                Severity::Error,
                Some("name".to_string()),
            ));
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_common::{CleanupPolicy, SpecAction, TopicConfig, TopicMetadata};

    fn spec(name: &str) -> TopicSpec {
        TopicSpec::new(
            name,
            SpecAction::Create,
            Some(TopicConfig::new(1, 1, CleanupPolicy::Delete, None, None, None, None, None).unwrap()),
            Some(TopicMetadata {
                owners: vec!["team".into()],
                doc: None,
                tags: vec![],
            }),
        )
        .unwrap()
    }

    #[test]
    fn accepts_compliant_name() {
        let policy = NamingPolicy::default();
        assert!(policy.validate(&spec("prod.orders.created")).is_empty());
    }

    #[test]
    fn rejects_tmp_prefix_as_error_in_prod() {
        let policy = NamingPolicy::default();
        let violations = policy.validate(&spec("prod.tmp.orders"));
        assert!(violations
            .iter()
            .any(|v| v.rule_id == "naming.forbidden_prefix" && v.severity == Severity::Error));
    }

    #[test]
    fn flags_reserved_word() {
        let policy = NamingPolicy::default();
        let violations = policy.validate(&spec("dev.__consumer_offsets"));
        assert!(violations.iter().any(|v| v.rule_id == "naming.reserved_word"));
    }

    #[test]
    fn from_content_overrides_pattern() {
        let content = serde_json::json!({ "pattern": r"^((dev|stg|prod)\.)[a-z0-9._\-]+$" });
        let policy = NamingPolicy::from_content(&content).unwrap();
        assert!(policy.validate(&spec("prod.orders.created")).is_empty());
    }

    #[test]
    fn from_content_rejects_invalid_regex() {
        let content = serde_json::json!({ "pattern": "(" });
        assert!(NamingPolicy::from_content(&content).is_err());
    }
}
