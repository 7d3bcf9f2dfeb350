use thiserror::Error;

use gov_adapters::AdapterError;

#[derive(Error, Debug, Clone)]
pub enum ConnectionError {
    #[error("no endpoint registered for id '{0}'")]
    NotFound(String),

    #[error("endpoint '{0}' is inactive")]
    Inactive(String),

    #[error("failed to construct client for '{id}': {source}")]
    Backend {
        id: String,
        #[source]
        source: AdapterError,
    },
}
