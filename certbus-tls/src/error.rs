use thiserror::Error;

pub type Result<T> = std::result::Result<T, TlsError>;

#[derive(Error, Debug)]
pub enum TlsError {
    #[error("🔑 Invalid Consumer Key: {0}")]
    InvalidKey(String),

    #[error("🔐 TLS Error: {0}")]
    Rustls(String),

    #[error(transparent)]
    Core(#[from] certbus_core::CoreError),

    #[error(transparent)]
    Log(#[from] certbus_log::LogError),
}
