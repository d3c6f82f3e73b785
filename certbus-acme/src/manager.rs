//! The manager pipeline: ACME issuance, renewal selection, event emission,
//! and the optimistic-concurrency publication of `CertificateRemoved`.
//! Ported from `cmd/certbus/manager.go` and `config.go` in full.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use certbus_core::encrypted_box::EncryptedBox;
use certbus_core::events::{
    CertificateObtained, CertificateRemoved, ChallengeType, ConfigUpdated, Event, EventMeta,
    EventPayload, RawChallengeType, Reason,
};
use certbus_core::store::{ManagedCertificate, Store};
use certbus_log::{load_until_realtime, EventLog};

use crate::acme_client::AcmeClient;
use crate::alertmanager::AlertmanagerClient;
use crate::cert_id::new_cert_id;
use crate::challenge::{ChallengeProvider, CloudflareDns01Provider, S3Http01Provider};
use crate::config::Config;
use crate::error::{AcmeError, Result};

const MANAGER_KEY_ENV_VAR: &str = "CERTBUS_MANAGER_KEY";
const MANAGER_KEY_FILE: &str = "certbus-manager.key";
const DEAD_MANS_SWITCH_TTL: Duration = Duration::from_secs(48 * 3600);

/// The three SAN shapes the `cert mk` command can issue. `Basic` and
/// `Wildcard` are mutually exclusive with `Subdomain` at the CLI layer; this
/// enum only encodes the resulting domain list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertShape {
    Basic,
    Subdomain,
    Wildcard,
}

impl CertShape {
    pub fn domains_for(self, domain: &str) -> Vec<String> {
        match self {
            CertShape::Basic => vec![format!("www.{domain}"), domain.to_string()],
            CertShape::Subdomain => vec![domain.to_string()],
            CertShape::Wildcard => vec![format!("*.{domain}"), domain.to_string()],
        }
    }
}

/// Loads the manager's RSA decryption key: `CERTBUS_MANAGER_KEY` (with
/// literal `\n` un-escaped) takes priority over `certbus-manager.key` on
/// disk, matching `loadManagerPrivateKey`.
pub fn load_manager_private_key() -> Result<RsaPrivateKey> {
    let pem = match std::env::var(MANAGER_KEY_ENV_VAR) {
        Ok(raw) if !raw.is_empty() => raw.replace("\\n", "\n"),
        _ => std::fs::read_to_string(MANAGER_KEY_FILE)?,
    };
    parse_rsa_private_key(&pem)
}

fn parse_rsa_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(pem))
        .map_err(|e| AcmeError::InvalidKey(e.to_string()))
}

fn parse_rsa_public_key(pem: &str) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_pem(pem)
        .or_else(|_| RsaPublicKey::from_public_key_pem(pem))
        .map_err(|e| AcmeError::InvalidKey(e.to_string()))
}

async fn build_challenge_provider(
    config: &Config,
    challenge_type: ChallengeType,
) -> Result<Box<dyn ChallengeProvider + Send + Sync>> {
    match challenge_type {
        ChallengeType::Dns01 => Ok(Box::new(CloudflareDns01Provider::new(
            config.cloudflare_credentials.email.clone(),
            config.cloudflare_credentials.api_key.clone(),
        ))),
        ChallengeType::Http01 => {
            let challenges = config.acme_http01_challenges.as_ref().ok_or_else(|| {
                AcmeError::Challenge("cannot use HTTP-01 due to missing configuration".to_string())
            })?;
            Ok(Box::new(
                S3Http01Provider::new(challenges.bucket.clone(), challenges.region.clone()).await,
            ))
        }
    }
}

/// The manager is a single-command-at-a-time pipeline: every method loads
/// the log's realtime tip fresh, so there is no long-lived in-process state
/// to keep consistent across CLI invocations.
pub struct Manager {
    log: Arc<dyn EventLog>,
    acme_directory_url: String,
}

impl Manager {
    pub fn new(log: Arc<dyn EventLog>, acme_directory_url: impl Into<String>) -> Self {
        Manager {
            log,
            acme_directory_url: acme_directory_url.into(),
        }
    }

    async fn realtime_store(&self) -> Result<Store> {
        let store = Store::new();
        load_until_realtime(self.log.as_ref(), &store).await?;
        Ok(store)
    }

    /// Decrypts the store's last-seen `ConfigUpdated` payload with the
    /// manager's own key. The fingerprint check is skipped: this config is
    /// always encrypted to the manager's own public key (see SPEC_FULL.md §4.5
    /// "Config display").
    async fn decrypted_config(&self, store: &Store) -> Result<Config> {
        let private_key = load_manager_private_key()?;
        let encrypted = store
            .latest_encrypted_config()
            .ok_or(AcmeError::ConfigUnavailable)?;
        let plaintext = encrypted
            .config_ciphertext
            .decrypt_no_fingerprint(&private_key)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }

    pub async fn list(&self) -> Result<Vec<ManagedCertificate>> {
        Ok(self.realtime_store().await?.all())
    }

    pub async fn inspect(&self, id: &str) -> Result<ManagedCertificate> {
        self.realtime_store()
            .await?
            .by_id(id)
            .ok_or_else(|| AcmeError::NotFound(id.to_string()))
    }

    /// Renewable certificates at instant `at`, in store order.
    pub async fn renewable(&self, at: DateTime<Utc>) -> Result<Vec<ManagedCertificate>> {
        let mut all = self.realtime_store().await?.all();
        all.retain(|c| c.renew_at < at);
        Ok(all)
    }

    pub async fn issue(
        &self,
        domain: &str,
        shape: CertShape,
        challenge_type: ChallengeType,
    ) -> Result<()> {
        let domains = shape.domains_for(domain);
        self.obtain_and_publish(domains, new_cert_id(), Reason::New, challenge_type)
            .await
    }

    /// Renews `id`, reusing its id, domains, and challenge type (missing
    /// challenge type on legacy events defaults to dns-01 — see
    /// SPEC_FULL.md §9).
    pub async fn renew(&self, id: &str) -> Result<()> {
        let cert = self.inspect(id).await?;
        let challenge_type = cert.resolved_challenge_type();
        self.obtain_and_publish(cert.domains, cert.id, Reason::Renewal, challenge_type)
            .await
    }

    /// Renews the first renewable certificate, if any, then unconditionally
    /// sends a dead-man's-switch check-in if the decrypted config carries an
    /// alertmanager base URL. The check-in fires on every `--renew-first`
    /// pass, including quiet ones with nothing renewable: that's what lets
    /// "no renewal in 48h" stay silent while "no check-in in 48h" (a stuck
    /// cron) still pages. Returns the renewed certificate, or `None` if
    /// nothing was renewable.
    pub async fn renew_first_and_checkin(
        &self,
        at: DateTime<Utc>,
        stream_name: &str,
    ) -> Result<Option<ManagedCertificate>> {
        let first = self.renewable(at).await?.into_iter().next();
        if let Some(first) = &first {
            self.renew(&first.id).await?;
        }

        let store = self.realtime_store().await?;
        let config = self.decrypted_config(&store).await?;
        if let Some(base_url) = &config.alert_manager_baseurl {
            AlertmanagerClient::new(base_url.clone())
                .dead_mans_switch_checkin(&format!("CertBus {stream_name}"), DEAD_MANS_SWITCH_TTL)
                .await?;
        }
        Ok(first)
    }

    async fn obtain_and_publish(
        &self,
        domains: Vec<String>,
        cert_id: String,
        reason: Reason,
        challenge_type: ChallengeType,
    ) -> Result<()> {
        let store = self.realtime_store().await?;
        let config = self.decrypted_config(&store).await?;

        let registration = config.lets_encrypt.registration.clone().ok_or_else(|| {
            AcmeError::Account("LetsEncrypt registration empty".to_string())
        })?;
        let provider = build_challenge_provider(&config, challenge_type).await?;
        let acme = AcmeClient::new(self.acme_directory_url.clone());
        let issued = acme.obtain(&domains, registration, provider.as_ref()).await?;

        let kek_public_key = parse_rsa_public_key(&config.kek_public_key)?;
        let private_key_ciphertext =
            EncryptedBox::encrypt(issued.private_key_pem.as_bytes(), &kek_public_key)?;

        tracing::info!(id = %cert_id, domains = ?domains, reason = ?reason, "publishing CertificateObtained");

        let event = Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "manager".to_string(),
            },
            EventPayload::CertificateObtained(CertificateObtained {
                id: cert_id,
                reason,
                domains,
                expires: issued.not_after,
                cert_pem_bundle: issued.cert_pem_bundle,
                private_key_dek_fingerprint: private_key_ciphertext.key_fingerprint.clone(),
                private_key_ciphertext,
                challenge_type: RawChallengeType::from_challenge_type(challenge_type),
            }),
        );
        self.log.append(vec![event]).await?;
        Ok(())
    }

    /// Removes `id` via a conditional append at the store's current version.
    /// No auto-retry on `VersionConflict` — see SPEC_FULL.md §9's Open
    /// Question decision.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let store = self.realtime_store().await?;
        if store.by_id(id).is_none() {
            return Err(AcmeError::NotFound(id.to_string()));
        }

        let removed = Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "manager".to_string(),
            },
            EventPayload::CertificateRemoved(CertificateRemoved { id: id.to_string() }),
        );
        self.log.append_after(store.version(), vec![removed]).await?;
        Ok(())
    }

    /// Parses `raw_json` with strict validation, re-serializes it
    /// canonically, encrypts it to the manager's own public key, and
    /// publishes it as `ConfigUpdated`.
    pub async fn update_config(&self, raw_json: &str) -> Result<()> {
        let parsed: Config = serde_json::from_str(raw_json)?;
        let canonical = serde_json::to_vec(&parsed)?;

        let private_key = load_manager_private_key()?;
        let public_key = RsaPublicKey::from(&private_key);
        let ciphertext = EncryptedBox::encrypt(&canonical, &public_key)?;

        let event = Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "manager".to_string(),
            },
            EventPayload::ConfigUpdated(ConfigUpdated {
                config_encryption_key_fingerprint: ciphertext.key_fingerprint.clone(),
                config_ciphertext: ciphertext,
            }),
        );
        self.log.append(vec![event]).await?;
        Ok(())
    }

    pub async fn display_config(&self) -> Result<Config> {
        let store = self.realtime_store().await?;
        self.decrypted_config(&store).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certbus_log::MemoryEventLog;

    fn manager_with_memory_log() -> Manager {
        Manager::new(
            Arc::new(MemoryEventLog::new()),
            "https://acme-staging-v02.api.letsencrypt.org/directory",
        )
    }

    #[test]
    fn basic_shape_is_www_and_bare_domain() {
        assert_eq!(
            CertShape::Basic.domains_for("example.com"),
            vec!["www.example.com".to_string(), "example.com".to_string()]
        );
    }

    #[test]
    fn subdomain_shape_is_just_the_domain() {
        assert_eq!(
            CertShape::Subdomain.domains_for("api.example.com"),
            vec!["api.example.com".to_string()]
        );
    }

    #[test]
    fn wildcard_shape_is_star_and_bare_domain() {
        assert_eq!(
            CertShape::Wildcard.domains_for("example.com"),
            vec!["*.example.com".to_string(), "example.com".to_string()]
        );
    }

    #[tokio::test]
    async fn inspecting_unknown_id_is_not_found() {
        let manager = manager_with_memory_log();
        let err = manager.inspect("nonexistent").await.unwrap_err();
        assert!(matches!(err, AcmeError::NotFound(_)));
    }

    #[tokio::test]
    async fn removing_unknown_id_is_not_found() {
        let manager = manager_with_memory_log();
        let err = manager.remove("nonexistent").await.unwrap_err();
        assert!(matches!(err, AcmeError::NotFound(_)));
    }

    #[tokio::test]
    async fn display_config_without_any_config_updated_event_is_fatal() {
        let manager = manager_with_memory_log();
        let err = manager.display_config().await.unwrap_err();
        assert!(matches!(err, AcmeError::ConfigUnavailable));
    }

    #[tokio::test]
    async fn update_config_then_display_config_round_trips() {
        std::env::set_var(
            MANAGER_KEY_ENV_VAR,
            rsa_test_key_env_escaped(),
        );
        let manager = manager_with_memory_log();

        let raw = serde_json::json!({
            "lets_encrypt": {"email": "ops@example.com", "private_key": "pem", "registration": null},
            "cloudflare_credentials": {"email": "ops@example.com", "api_key": "key"},
            "kek_public_key": "pem",
        })
        .to_string();

        manager.update_config(&raw).await.unwrap();
        let displayed = manager.display_config().await.unwrap();
        assert_eq!(displayed.lets_encrypt.email, "ops@example.com");

        std::env::remove_var(MANAGER_KEY_ENV_VAR);
    }

    fn rsa_test_key_env_escaped() -> String {
        use rsa::pkcs8::EncodePrivateKeyPem;
        let mut rng = rand::rngs::OsRng;
        let key = RsaPrivateKey::new(&mut rng, 2048).unwrap();
        let pem = key.to_pkcs8_pem(rsa::pkcs8::LineEnding::LF).unwrap().to_string();
        pem.replace('\n', "\\n")
    }

    #[tokio::test]
    async fn update_config_rejects_unknown_fields() {
        std::env::set_var(MANAGER_KEY_ENV_VAR, rsa_test_key_env_escaped());
        let manager = manager_with_memory_log();
        let raw = serde_json::json!({
            "lets_encrypt": {"email": "a@b.com", "private_key": "pem", "registration": null},
            "cloudflare_credentials": {"email": "a@b.com", "api_key": "key"},
            "kek_public_key": "pem",
            "typo_field": true,
        })
        .to_string();
        let err = manager.update_config(&raw).await.unwrap_err();
        assert!(matches!(err, AcmeError::Serde(_)));
        std::env::remove_var(MANAGER_KEY_ENV_VAR);
    }
}
