use thiserror::Error;

/// Errors raised by security providers and the security manager.
/// Denied access is never an error; these are failures to decide.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SecurityError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Security service '{service}' failed: {message}")]
    ProviderFailure { service: String, message: String },

    #[error("Authorization '{0}' cannot be saved for later restore")]
    NotRestorable(String),

    #[error("Unknown security service: {0}")]
    UnknownService(String),

    #[error("Invalid security configuration: {0}")]
    Configuration(String),
}
