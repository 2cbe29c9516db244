use thiserror::Error;

/// Failures reported by an exchange adapter
///
/// `Clone` so that one failed load can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// Network or communication failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange answered with an error response
    #[error("API error {code}: {message}")]
    Api { code: i32, message: String },

    /// The exchange response could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// The exchange does not offer this operation
    #[error("Operation not supported: {0}")]
    Unsupported(String),
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;
