use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("connector id must not be empty")]
    EmptyConnectorId,

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid secret key length: expected at least {min} bytes, got {actual}")]
    SecretKeyTooShort { min: usize, actual: usize },

    #[error("invalid handle id: {0}")]
    InvalidHandleId(String),
}
