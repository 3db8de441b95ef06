use thiserror::Error;

/// Top-level error type for the relocation planner.
///
/// Subsystem crates define their own error types and convert into or wrap
/// `RelocationError` so that `?` works across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RelocationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for RelocationError {
    fn from(err: toml::de::Error) -> Self {
        RelocationError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for RelocationError {
    fn from(err: toml::ser::Error) -> Self {
        RelocationError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for RelocationError {
    fn from(err: serde_json::Error) -> Self {
        RelocationError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for relocation operations.
pub type Result<T> = std::result::Result<T, RelocationError>;
