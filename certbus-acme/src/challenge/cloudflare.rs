//! DNS-01 challenge delivery via the Cloudflare REST API. Grounded on
//! `cmd/certbus/manager.go`'s `makeLegoClient` DNS-01 branch, which configures
//! `lego`'s Cloudflare provider with the account email and API key from
//! `config.CloudflareCredentials`. `instant-acme` does not ship a DNS provider
//! registry the way `lego` does, so this talks to Cloudflare directly over
//! `reqwest` instead of wrapping a third-party DNS crate.

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChallengeKind, ChallengeProvider};

const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

pub struct CloudflareDns01Provider {
    client: reqwest::Client,
    email: String,
    api_key: String,
}

impl CloudflareDns01Provider {
    pub fn new(email: impl Into<String>, api_key: impl Into<String>) -> Self {
        CloudflareDns01Provider {
            client: reqwest::Client::new(),
            email: email.into(),
            api_key: api_key.into(),
        }
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("X-Auth-Email", &self.email)
            .header("X-Auth-Key", &self.api_key)
    }

    /// Cloudflare zones are registered at the registrable domain, not at
    /// every subdomain level. Walks up the labels of `domain` (the ACME
    /// identifier, e.g. `foo.bar.example.com`) until a matching zone is
    /// found.
    async fn find_zone_id(&self, domain: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut candidate = domain;
        loop {
            let url = format!("{CLOUDFLARE_API_BASE}/zones?name={candidate}");
            let resp: ZonesResponse = self
                .auth(self.client.get(&url))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            if let Some(zone) = resp.result.into_iter().next() {
                return Ok(zone.id);
            }
            match candidate.split_once('.') {
                Some((_, rest)) if rest.contains('.') => candidate = rest,
                _ => {
                    return Err(format!("no cloudflare zone found for {domain}").into());
                }
            }
        }
    }

    async fn find_txt_record_id(
        &self,
        zone_id: &str,
        name: &str,
    ) -> Result<Option<String>, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records?type=TXT&name={name}");
        let resp: DnsRecordsResponse = self
            .auth(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(resp.result.into_iter().next().map(|r| r.id))
    }
}

#[async_trait]
impl ChallengeProvider for CloudflareDns01Provider {
    async fn present(
        &self,
        domain: &str,
        _token: &str,
        key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let zone_id = self.find_zone_id(domain).await?;
        let record_name = format!("_acme-challenge.{domain}");

        let body = serde_json::json!({
            "type": "TXT",
            "name": record_name,
            "content": key_authorization,
            "ttl": 120,
        });
        let url = format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records");
        self.auth(self.client.post(&url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn cleanup(
        &self,
        domain: &str,
        _token: &str,
        _key_authorization: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let zone_id = self.find_zone_id(domain).await?;
        let record_name = format!("_acme-challenge.{domain}");
        let Some(record_id) = self.find_txt_record_id(&zone_id, &record_name).await? else {
            return Ok(());
        };
        let url = format!("{CLOUDFLARE_API_BASE}/zones/{zone_id}/dns_records/{record_id}");
        self.auth(self.client.delete(&url))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn challenge_kind(&self) -> ChallengeKind {
        ChallengeKind::Dns01
    }
}

#[derive(Deserialize)]
struct ZonesResponse {
    result: Vec<Zone>,
}

#[derive(Deserialize)]
struct Zone {
    id: String,
}

#[derive(Deserialize)]
struct DnsRecordsResponse {
    result: Vec<DnsRecord>,
}

#[derive(Deserialize)]
struct DnsRecord {
    id: String,
}
