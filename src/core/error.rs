use thiserror::Error;

#[derive(Error, Debug)]
pub enum PurgeError {
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    #[error("Failed to list collections: {0}")]
    EnumerationError(String),

    #[error("Failed to stream documents from collection '{0}': {1}")]
    StreamingError(String, String),

    #[error("Failed to commit delete batch for collection '{0}': {1}")]
    BatchCommitError(String, String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, PurgeError>;

impl PurgeError {
    /// Short name of the failure kind, used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthenticationError(_) => "authentication",
            Self::EnumerationError(_) => "enumeration",
            Self::StreamingError(..) => "streaming",
            Self::BatchCommitError(..) => "batch_commit",
            Self::ConfigError(_) => "config",
        }
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::AuthenticationError(_))
    }
}
