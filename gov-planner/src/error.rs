use thiserror::Error;

use gov_adapters::AdapterError;
use gov_common::{DomainError, Violation};
use gov_connections::ConnectionError;

/// Failure taxonomy for plan construction.
#[derive(Error, Debug, Clone)]
pub enum PlanError {
    #[error(transparent)]
    Invariant(#[from] DomainError),

    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("endpoint '{0}' is inactive")]
    Inactive(String),

    #[error("backend adapter call failed: {0}")]
    Backend(String),

    #[error("metadata store call failed: {0}")]
    MetadataStore(String),
}

impl From<ConnectionError> for PlanError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::NotFound(id) => PlanError::NotFound(id),
            ConnectionError::Inactive(id) => PlanError::Inactive(id),
            ConnectionError::Backend { source, .. } => PlanError::Backend(source.to_string()),
        }
    }
}

impl From<AdapterError> for PlanError {
    fn from(e: AdapterError) -> Self {
        PlanError::Backend(e.to_string())
    }
}

/// Failure taxonomy for apply execution. `PolicyViolation` and `Stale` only
/// arise here, since plan construction never blocks on them (the plan is
/// still returned with violations attached; only apply refuses to proceed).
#[derive(Error, Debug, Clone)]
pub enum ApplyError {
    #[error("plan has {0} blocking violation(s); re-run dry-run")]
    PolicyViolation(Vec<Violation>),

    #[error("resource '{0}' not found")]
    NotFound(String),

    #[error("endpoint '{0}' is inactive")]
    Inactive(String),

    #[error("plan is stale: live state changed since dry-run; re-run dry-run")]
    Stale,

    #[error("backend adapter call failed: {0}")]
    Backend(String),

    #[error("metadata store call failed: {0}")]
    MetadataStore(String),
}

impl From<ConnectionError> for ApplyError {
    fn from(e: ConnectionError) -> Self {
        match e {
            ConnectionError::NotFound(id) => ApplyError::NotFound(id),
            ConnectionError::Inactive(id) => ApplyError::Inactive(id),
            ConnectionError::Backend { source, .. } => ApplyError::Backend(source.to_string()),
        }
    }
}

impl From<AdapterError> for ApplyError {
    fn from(e: AdapterError) -> Self {
        ApplyError::Backend(e.to_string())
    }
}

impl From<PlanError> for ApplyError {
    fn from(e: PlanError) -> Self {
        match e {
            PlanError::Invariant(d) => ApplyError::Backend(d.to_string()),
            PlanError::NotFound(id) => ApplyError::NotFound(id),
            PlanError::Inactive(id) => ApplyError::Inactive(id),
            PlanError::Backend(m) => ApplyError::Backend(m),
            PlanError::MetadataStore(m) => ApplyError::MetadataStore(m),
        }
    }
}
