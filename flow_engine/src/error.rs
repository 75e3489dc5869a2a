/// error.rs: Library error type
///
/// Bad market data (crossed quotes, zero volume, empty windows) is never an
/// error here; those paths return neutral values. `FlowError` is reserved for
/// caller wiring bugs and rejected configuration.
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FlowError {
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("invalid config `{key}`: {reason}")]
    InvalidConfig { key: String, reason: String },
}

impl FlowError {
    pub fn invalid_argument(name: &str, reason: impl Into<String>) -> Self {
        FlowError::InvalidArgument { name: name.to_owned(), reason: reason.into() }
    }

    pub fn invalid_config(key: &str, reason: impl Into<String>) -> Self {
        FlowError::InvalidConfig { key: key.to_owned(), reason: reason.into() }
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
