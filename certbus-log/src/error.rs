use certbus_core::Cursor;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Error, Debug)]
pub enum LogError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("log version conflict: expected cursor {expected:?}, log is at {actual:?}")]
    VersionConflict { expected: Cursor, actual: Cursor },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] certbus_core::CoreError),
}
