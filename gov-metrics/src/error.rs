use gov_adapters::AdapterError;
use gov_connections::ConnectionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("cluster not found: {0}")]
    NotFound(String),
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("backend error: {0}")]
    Backend(#[from] AdapterError),
    #[error("snapshot store error: {0}")]
    Store(String),
}
