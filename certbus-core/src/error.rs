use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("certificate not found: {0}")]
    NotFound(String),

    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    #[error("encrypted box key fingerprint mismatch: expected {expected}, got {actual}")]
    FingerprintMismatch { expected: String, actual: String },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid key material: {0}")]
    InvalidKey(String),
}
