use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache lock poisoned")]
    Poisoned,

    #[error("Cache entry could not be encoded: {0}")]
    Encoding(String),

    #[error("Cache store unavailable: {0}")]
    Unavailable(String),
}
