use thiserror::Error;

/// Errors raised by domain-model constructors when an invariant is violated.
///
/// Construction is the only place these can originate: once a value object
/// exists, it is valid for its lifetime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("{field} is invalid: {message}")]
    Invariant { field: String, message: String },
}

impl DomainError {
    pub fn invariant(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Invariant {
            field: field.into(),
            message: message.into(),
        }
    }
}
