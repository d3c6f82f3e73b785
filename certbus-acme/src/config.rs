//! The sensitive configuration stored encrypted on the log. Only the manager
//! ever decrypts it; consumers never see it. Field shapes follow
//! `cmd/certbus/config.go`'s `config` struct.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LetsEncryptAccount {
    pub email: String,
    /// PEM-encoded ACME account private key.
    pub private_key: String,
    /// Serialized `instant_acme::AccountCredentials` for an already-registered
    /// account. The manager pipeline does not perform first-time ACME account
    /// registration; an empty/missing registration is a hard error, matching
    /// the original's `LetsEncrypt registration empty` check.
    pub registration: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CloudflareCredentials {
    pub email: String,
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcmeHttp01Challenges {
    pub bucket: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub lets_encrypt: LetsEncryptAccount,
    pub cloudflare_credentials: CloudflareCredentials,
    /// PEM-encoded RSA public key consumers' private key-encryption keys
    /// correspond to; used to encrypt each issued certificate's private key.
    pub kek_public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert_manager_baseurl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acme_http01_challenges: Option<AcmeHttp01Challenges>,
}
