use std::collections::{BTreeMap, BTreeSet};

const NONE_TOKEN: &str = "none";

/// Field-level diff between the current and target canonical (Kafka wire)
/// config maps: `"{old}->{new}"` per differing key, using the literal
/// `none` token for a key present on only one side.
pub fn diff_configs(
    current: &BTreeMap<String, String>,
    target: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut keys: BTreeSet<&String> = BTreeSet::new();
    keys.extend(current.keys());
    keys.extend(target.keys());

    let mut diff = BTreeMap::new();
    for key in keys {
        let old = current.get(key).map(String::as_str).unwrap_or(NONE_TOKEN);
        let new = target.get(key).map(String::as_str).unwrap_or(NONE_TOKEN);
        if old != new {
            diff.insert(key.clone(), format!("{old}->{new}"));
        }
    }
    diff
}

/// Change-legality violations that must be rejected before apply: partitions
/// may only increase; a replication factor change always requires manual
/// intervention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeLegalityError {
    PartitionDecrease { current: u32, target: u32 },
    ReplicationFactorChange { current: u16, target: u16 },
}

impl std::fmt::Display for ChangeLegalityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeLegalityError::PartitionDecrease { current, target } => write!(
                f,
                "partition count may only increase (current: {current}, target: {target})"
            ),
            ChangeLegalityError::ReplicationFactorChange { current, target } => write!(
                f,
                "replication factor change requires manual intervention (current: {current}, target: {target})"
            ),
        }
    }
}

pub fn check_change_legality(
    current_partitions: u32,
    target_partitions: u32,
    current_replication_factor: u16,
    target_replication_factor: u16,
) -> Vec<ChangeLegalityError> {
    let mut errors = Vec::new();
    if target_partitions < current_partitions {
        errors.push(ChangeLegalityError::PartitionDecrease {
            current: current_partitions,
            target: target_partitions,
        });
    }
    if target_replication_factor != current_replication_factor {
        errors.push(ChangeLegalityError::ReplicationFactorChange {
            current: current_replication_factor,
            target: target_replication_factor,
        });
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_detects_changed_and_missing_keys() {
        let mut current = BTreeMap::new();
        current.insert("retention.ms".to_string(), "86400000".to_string());
        current.insert("cleanup.policy".to_string(), "delete".to_string());

        let mut target = BTreeMap::new();
        target.insert("retention.ms".to_string(), "604800000".to_string());
        target.insert("cleanup.policy".to_string(), "delete".to_string());
        target.insert("max.message.bytes".to_string(), "1000000".to_string());

        let diff = diff_configs(&current, &target);
        assert_eq!(diff.len(), 2);
        assert_eq!(diff["retention.ms"], "86400000->604800000");
        assert_eq!(diff["max.message.bytes"], "none->1000000");
    }

    #[test]
    fn unchanged_configs_diff_empty() {
        let mut m = BTreeMap::new();
        m.insert("a".to_string(), "1".to_string());
        assert!(diff_configs(&m, &m).is_empty());
    }

    #[test]
    fn partition_decrease_is_illegal() {
        let errors = check_change_legality(6, 3, 3, 3);
        assert_eq!(
            errors,
            vec![ChangeLegalityError::PartitionDecrease {
                current: 6,
                target: 3
            }]
        );
    }

    #[test]
    fn replication_factor_change_is_illegal() {
        let errors = check_change_legality(6, 6, 3, 2);
        assert_eq!(
            errors,
            vec![ChangeLegalityError::ReplicationFactorChange {
                current: 3,
                target: 2
            }]
        );
    }
}
