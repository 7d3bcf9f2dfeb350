use thiserror::Error;

/// Errors an adapter raises for a whole-call failure (transport loss,
/// protocol mismatch). Per-item failures never raise this: they are
/// returned inside the adapter's error map#[derive(Error, Debug, Clone)]
pub enum AdapterError {
    #[error("backend endpoint is unreachable: {0}")]
    Transport(String),

    #[error("backend rejected the request: {0}")]
    Protocol(String),

    #[error("resource not found: {0}")]
    NotFound(String),
}
