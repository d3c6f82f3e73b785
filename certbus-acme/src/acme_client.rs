//! Thin wrapper over `instant-acme`'s order/authorization/finalize flow,
//! generalized to accept any [`ChallengeProvider`] and to parse the real
//! `not_after` from the issued leaf certificate via `x509-parser` rather than
//! assuming a fixed validity window.

use chrono::{DateTime, Utc};
use instant_acme::{
    Account, AccountCredentials, AuthorizationStatus, ChallengeType as AcmeChallengeType,
    Identifier, NewOrder, OrderStatus, RetryPolicy,
};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::challenge::{ChallengeKind, ChallengeProvider};
use crate::error::{AcmeError, Result};

/// A freshly issued certificate, ready to be encrypted onto the log.
pub struct IssuedCertificate {
    pub cert_pem_bundle: String,
    pub private_key_pem: String,
    pub not_after: DateTime<Utc>,
}

pub struct AcmeClient {
    directory_url: String,
}

impl AcmeClient {
    pub fn new(directory_url: impl Into<String>) -> Self {
        AcmeClient {
            directory_url: directory_url.into(),
        }
    }

    pub fn production() -> Self {
        Self::new("https://acme-v02.api.letsencrypt.org/directory")
    }

    pub fn staging() -> Self {
        Self::new("https://acme-staging-v02.api.letsencrypt.org/directory")
    }

    pub fn directory_url(&self) -> &str {
        &self.directory_url
    }

    /// Obtains a certificate for `domains` under the ACME account described by
    /// `account_credentials` — a previously-registered account's serialized
    /// `instant_acme::AccountCredentials`. This client never performs
    /// first-time account registration: a missing registration is a hard
    /// error, matching the original manager's `LetsEncrypt registration
    /// empty` check.
    pub async fn obtain(
        &self,
        domains: &[String],
        account_credentials: serde_json::Value,
        provider: &(dyn ChallengeProvider + Send + Sync),
    ) -> Result<IssuedCertificate> {
        let credentials: AccountCredentials = serde_json::from_value(account_credentials)
            .map_err(|e| AcmeError::Account(format!("invalid stored account credentials: {e}")))?;
        let account = Account::builder()
            .map_err(|e| AcmeError::Account(format!("builder init failed: {e}")))?
            .from_credentials(credentials)
            .await
            .map_err(|e| AcmeError::Account(format!("failed to restore account: {e}")))?;

        let identifiers: Vec<Identifier> =
            domains.iter().map(|d| Identifier::Dns(d.clone())).collect();
        let mut order = account
            .new_order(&NewOrder::new(&identifiers))
            .await
            .map_err(|e| AcmeError::Order(format!("failed to create order: {e}")))?;

        tracing::info!(domains = ?domains, directory = %self.directory_url, "acme order created");

        let acme_challenge_type = match provider.challenge_kind() {
            ChallengeKind::Dns01 => AcmeChallengeType::Dns01,
            ChallengeKind::Http01 => AcmeChallengeType::Http01,
        };

        let mut presented = Vec::new();
        let mut authorizations = order.authorizations();
        while let Some(authorization) = authorizations.next().await {
            let mut authorization = authorization
                .map_err(|e| AcmeError::Order(format!("failed to fetch authorization: {e}")))?;
            if authorization.status == AuthorizationStatus::Valid {
                continue;
            }

            let domain = authorization.identifier().to_string();
            let mut challenge = authorization.challenge(acme_challenge_type).ok_or_else(|| {
                AcmeError::Challenge(format!(
                    "challenge type {:?} not offered for {domain}",
                    provider.challenge_kind()
                ))
            })?;

            let token = challenge.token.clone();
            let key_auth = challenge.key_authorization();
            let provider_value = match provider.challenge_kind() {
                ChallengeKind::Dns01 => key_auth.dns_value(),
                ChallengeKind::Http01 => key_auth.as_str().to_string(),
            };

            provider
                .present(&domain, &token, &provider_value)
                .await
                .map_err(|e| AcmeError::Challenge(format!("present failed for {domain}: {e}")))?;
            presented.push((domain.clone(), token, provider_value));

            challenge
                .set_ready()
                .await
                .map_err(|e| AcmeError::Challenge(format!("failed to signal ready for {domain}: {e}")))?;
            tracing::info!(%domain, "challenge presented and marked ready");
        }

        let retry_policy = RetryPolicy::default();
        let status = order
            .poll_ready(&retry_policy)
            .await
            .map_err(|e| AcmeError::Order(format!("polling authorization failed: {e}")))?;

        for (domain, token, value) in &presented {
            if let Err(e) = provider.cleanup(domain, token, value).await {
                tracing::warn!(%domain, error = %e, "challenge cleanup failed, ignoring");
            }
        }

        if status != OrderStatus::Ready && status != OrderStatus::Valid {
            return Err(AcmeError::Order(format!("order ended in state {status:?}")));
        }

        let private_key_pem = order
            .finalize()
            .await
            .map_err(|e| AcmeError::CertGeneration(format!("finalize failed: {e}")))?;
        let cert_pem_bundle = order
            .poll_certificate(&retry_policy)
            .await
            .map_err(|e| AcmeError::CertGeneration(format!("download failed: {e}")))?;

        let not_after = parse_not_after(&cert_pem_bundle)?;
        tracing::info!(domains = ?domains, %not_after, "certificate issued");

        Ok(IssuedCertificate {
            cert_pem_bundle,
            private_key_pem,
            not_after,
        })
    }
}

fn parse_not_after(cert_pem_bundle: &str) -> Result<DateTime<Utc>> {
    let (_, pem) = parse_x509_pem(cert_pem_bundle.as_bytes())
        .map_err(|e| AcmeError::CertGeneration(format!("parsing cert PEM: {e}")))?;
    let (_, cert) = X509Certificate::from_der(&pem.contents)
        .map_err(|e| AcmeError::CertGeneration(format!("parsing cert DER: {e}")))?;
    let not_after = cert.validity().not_after.timestamp();
    DateTime::<Utc>::from_timestamp(not_after, 0)
        .ok_or_else(|| AcmeError::CertGeneration("certificate not_after out of range".to_string()))
}
