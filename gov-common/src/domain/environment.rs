use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment environment, derived from the first dot-segment of a resource
/// name when not given explicitly (`dev.orders.created` -> `Dev`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Stg,
    Prod,
    Unknown,
}

impl Environment {
    /// Derive the environment from a resource name's first dot-segment.
    ///
    /// Subjects produced by `RecordNameStrategy` carry no environment prefix
    /// and fall through to `Dev` rather than `Unknown`, so policy resolution
    /// still applies to them.
    pub fn from_resource_name(name: &str) -> Self {
        match name.split_once('.') {
            Some((prefix, _)) => prefix
                .parse()
                .unwrap_or(Environment::Dev),
            None => Environment::Dev,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Stg => "stg",
            Environment::Prod => "prod",
            Environment::Unknown => "unknown",
        }
    }
}

impl FromStr for Environment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "stg" | "staging" => Ok(Environment::Stg),
            "prod" | "production" => Ok(Environment::Prod),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_known_prefixes() {
        assert_eq!(
            Environment::from_resource_name("prod.orders.created"),
            Environment::Prod
        );
        assert_eq!(
            Environment::from_resource_name("stg.orders.created"),
            Environment::Stg
        );
    }

    #[test]
    fn unknown_prefix_falls_through_to_dev() {
        assert_eq!(
            Environment::from_resource_name("user-created-value"),
            Environment::Dev
        );
        assert_eq!(Environment::from_resource_name("no-dot-here"), Environment::Dev);
    }

    #[test]
    fn display_roundtrips_through_fromstr() {
        for env in [Environment::Dev, Environment::Stg, Environment::Prod] {
            assert_eq!(env.to_string().parse::<Environment>().unwrap(), env);
        }
    }
}
