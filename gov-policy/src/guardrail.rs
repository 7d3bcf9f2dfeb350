use gov_common::{CompressionType, Environment, Severity, TopicConfig, TopicSpec, Violation};

const SEVEN_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;
const THREE_DAYS_MS: i64 = 3 * 24 * 60 * 60 * 1000;

/// Environment-keyed numeric/boolean guardrails on topic configuration.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentGuardrails;

impl EnvironmentGuardrails {
    pub fn validate(&self, spec: &TopicSpec) -> Vec<Violation> {
        let Some(config) = &spec.config else {
            return Vec::new();
        };
        match spec.environment() {
            Environment::Prod => self.validate_prod(&spec.name, config),
            Environment::Stg => self.validate_stg(&spec.name, config),
            Environment::Dev | Environment::Unknown => self.validate_dev(&spec.name, config),
        }
    }

    fn validate_prod(&self, name: &str, config: &TopicConfig) -> Vec<Violation> {
        let mut v = Vec::new();
        if config.replication_factor < 3 {
            v.push(Violation::new(
                name,
                "prod.min_replication_factor",
                format!(
                    "Replication factor must be >= 3 in prod (current: {})",
                    config.replication_factor
                ),
                Severity::Error,
                Some("config.replication_factor".to_string()),
            ));
        }
        match config.min_insync_replicas {
            None => v.push(Violation::new(
                name,
                "prod.min_insync_replicas",
                "min.insync.replicas must be >= 2 in prod (current: none)".to_string(),
                Severity::Error,
                Some("config.min_insync_replicas".to_string()),
            )),
            Some(isr) if isr < 2 => v.push(Violation::new(
                name,
                "prod.min_insync_replicas",
                format!("min.insync.replicas must be >= 2 in prod (current: {isr})"),
                Severity::Error,
                Some("config.min_insync_replicas".to_string()),
            )),
            _ => {}
        }
        if let Some(retention_ms) = config.retention_ms {
            if retention_ms < SEVEN_DAYS_MS {
                v.push(Violation::new(
                    name,
                    "prod.min_retention",
                    format!("Retention must be >= 7 days in prod (current: {retention_ms}ms)"),
                    Severity::Error,
                    Some("config.retention_ms".to_string()),
                ));
            }
        }
        if config.partitions > 100 {
            v.push(Violation::new(
                name,
                "prod.max_partitions",
                format!(
                    "Partitions must be <= 100 in prod (current: {})",
                    config.partitions
                ),
                Severity::Error,
                Some("config.partitions".to_string()),
            ));
        }
        v
    }

    fn validate_stg(&self, name: &str, config: &TopicConfig) -> Vec<Violation> {
        let mut v = Vec::new();
        if config.replication_factor < 2 {
            v.push(Violation::new(
                name,
                "stg.min_replication_factor",
                format!(
                    "Replication factor must be >= 2 in stg (current: {})",
                    config.replication_factor
                ),
                Severity::Warning,
                Some("config.replication_factor".to_string()),
            ));
        }
        if config.partitions > 50 {
            v.push(Violation::new(
                name,
                "stg.max_partitions",
                format!(
                    "Partitions should be <= 50 in stg (current: {})",
                    config.partitions
                ),
                Severity::Warning,
                Some("config.partitions".to_string()),
            ));
        }
        v
    }

    fn validate_dev(&self, name: &str, config: &TopicConfig) -> Vec<Violation> {
        let mut v = Vec::new();
        if let Some(retention_ms) = config.retention_ms {
            if retention_ms > THREE_DAYS_MS {
                v.push(Violation::new(
                    name,
                    "dev.max_retention",
                    format!("Retention should be <= 3 days in dev (current: {retention_ms}ms)"),
                    Severity::Warning,
                    Some("config.retention_ms".to_string()),
                ));
            }
        }
        if config.partitions > 10 {
            v.push(Violation::new(
                name,
                "dev.max_partitions",
                format!(
                    "Partitions should be <= 10 in dev (current: {})",
                    config.partitions
                ),
                Severity::Warning,
                Some("config.partitions".to_string()),
            ));
        }
        v
    }
}

/// Compression recommendation policy: warns when prod topics use no
/// compression.
#[derive(Debug, Clone, Default)]
pub struct CompressionPolicy;

impl CompressionPolicy {
    pub fn validate(&self, spec: &TopicSpec, compression: CompressionType) -> Vec<Violation> {
        let Some(_config) = &spec.config else {
            return Vec::new();
        };
        if spec.environment() == Environment::Prod && compression == CompressionType::None {
            return vec![Violation::new(
                &spec.name,
                "compression.recommended",
                "Compression is recommended in prod environment",
                Severity::Warning,
                Some("config.compression_type".to_string()),
            )];
        }
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gov_common::{CleanupPolicy, SpecAction, TopicMetadata};

    fn spec(name: &str, config: TopicConfig) -> TopicSpec {
        TopicSpec::new(
            name,
            SpecAction::Create,
            Some(config),
            Some(TopicMetadata {
                owners: vec!["team".into()],
                doc: None,
                tags: vec![],
            }),
        )
        .unwrap()
    }

    #[test]
    fn prod_low_replication_is_blocking() {
        let config = TopicConfig::new(12, 1, CleanupPolicy::Delete, Some(604_800_000), Some(2), None, None, None)
            .unwrap();
        let violations = EnvironmentGuardrails.validate(&spec("prod.orders.created", config));
        assert!(violations
            .iter()
            .any(|v| v.rule_id == "prod.min_replication_factor" && v.severity == Severity::Error));
    }

    #[test]
    fn compliant_prod_spec_has_no_violations() {
        let config =
            TopicConfig::new(12, 3, CleanupPolicy::Delete, Some(604_800_000), Some(2), None, None, None)
                .unwrap();
        assert!(EnvironmentGuardrails
            .validate(&spec("prod.orders.created", config))
            .is_empty());
    }

    #[test]
    fn prod_compression_none_is_a_warning() {
        let config = TopicConfig::new(
            12,
            3,
            CleanupPolicy::Delete,
            Some(604_800_000),
            Some(2),
            None,
            None,
            Some(CompressionType::None),
        )
        .unwrap();
        let violations = CompressionPolicy.validate(&spec("prod.orders.created", config), CompressionType::None);
        assert!(violations
            .iter()
            .any(|v| v.rule_id == "compression.recommended" && v.severity == Severity::Warning));
    }

    #[test]
    fn dev_compression_none_has_no_violation() {
        let config = TopicConfig::new(
            12,
            1,
            CleanupPolicy::Delete,
            Some(604_800_000),
            Some(2),
            None,
            None,
            Some(CompressionType::None),
        )
        .unwrap();
        assert!(CompressionPolicy
            .validate(&spec("dev.orders.created", config), CompressionType::None)
            .is_empty());
    }
}
