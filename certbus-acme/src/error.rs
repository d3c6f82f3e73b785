use thiserror::Error;

pub type Result<T> = std::result::Result<T, AcmeError>;

#[derive(Error, Debug)]
pub enum AcmeError {
    #[error("🔍 Not Found: certificate {0} does not exist")]
    NotFound(String),

    #[error(transparent)]
    Log(#[from] certbus_log::LogError),

    #[error("⚙️ Configuration Error: no configuration found on the log")]
    ConfigUnavailable,

    #[error("👤 Account Management Error: {0}")]
    Account(String),

    #[error("❌ Order Processing Failed: {0}")]
    Order(String),

    #[error("⚠️ Challenge Verification Failed: {0}")]
    Challenge(String),

    #[error("🔧 Certificate Generation Failed: {0}")]
    CertGeneration(String),

    #[error("💥 Challenge Provider IO Error: {0}")]
    ProviderIo(String),

    #[error(transparent)]
    Core(#[from] certbus_core::CoreError),

    #[error("🔑 Invalid Manager Key: {0}")]
    InvalidKey(String),

    #[error("💥 IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("📦 Serialization Error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("📡 Alertmanager Check-in Failed: {0}")]
    Alertmanager(String),
}
