//! The challenge-provider capability the ACME client delegates proof-of-control
//! to. Modeled as a trait (`ChallengeProvider`) rather than an enum so the
//! manager pipeline can plug in either provider without the ACME client
//! knowing about Cloudflare or S3 at all — see SPEC_FULL.md §9's note on
//! dynamic dispatch via capability sets.

pub mod cloudflare;
pub mod s3_http01;

use async_trait::async_trait;

pub use cloudflare::CloudflareDns01Provider;
pub use s3_http01::S3Http01Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    Dns01,
    Http01,
}

/// `present` publishes the proof (a DNS TXT record, an uploaded object);
/// `cleanup` retracts it. Cleanup errors are logged by the caller, never
/// propagated — see SPEC_FULL.md §6 on HTTP-01 cleanup being non-fatal.
///
/// `key_authorization` already carries the value appropriate to this
/// provider's [`ChallengeKind`]: the DNS-01 TXT record content for a DNS
/// provider, the raw HTTP-01 key authorization string for an object-storage
/// uploader. The ACME client computes which one to pass based on
/// `challenge_kind()`.
#[async_trait]
pub trait ChallengeProvider {
    async fn present(
        &self,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn cleanup(
        &self,
        domain: &str,
        token: &str,
        key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn challenge_kind(&self) -> ChallengeKind;
}
