//! Domain event payloads published to the CertBus event log.
//!
//! Field shapes follow `cbdomain/events.go`, reconciled against the
//! specification's event model where the two disagreed (`challenge_type` is
//! always present on `CertificateObtained`, including on legacy events where
//! it deserializes to an empty string).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encrypted_box::EncryptedBox;

/// The single stream this crate operates on.
pub const STREAM: &str = "/certbus";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reason {
    New,
    Renewal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChallengeType {
    Dns01,
    Http01,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::Dns01 => "dns-01",
            ChallengeType::Http01 => "http-01",
        }
    }
}

/// Legacy events may carry an empty challenge-type string; callers should
/// treat that as dns-01 (see SPEC_FULL.md §9).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawChallengeType(pub String);

impl RawChallengeType {
    pub fn resolve(&self) -> ChallengeType {
        match self.0.as_str() {
            "http-01" => ChallengeType::Http01,
            _ => ChallengeType::Dns01,
        }
    }

    pub fn from_challenge_type(ct: ChallengeType) -> Self {
        RawChallengeType(ct.as_str().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateObtained {
    pub id: String,
    pub reason: Reason,
    pub domains: Vec<String>,
    pub expires: DateTime<Utc>,
    pub cert_pem_bundle: String,
    pub private_key_dek_fingerprint: String,
    pub private_key_ciphertext: EncryptedBox,
    pub challenge_type: RawChallengeType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRemoved {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigUpdated {
    pub config_encryption_key_fingerprint: String,
    pub config_ciphertext: EncryptedBox,
}

/// Tagged union of the three event payload kinds, decoded from an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    CertificateObtained(CertificateObtained),
    CertificateRemoved(CertificateRemoved),
    ConfigUpdated(ConfigUpdated),
}

impl EventPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventPayload::CertificateObtained(_) => "CertificateObtained",
            EventPayload::CertificateRemoved(_) => "CertificateRemoved",
            EventPayload::ConfigUpdated(_) => "ConfigUpdated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMeta {
    pub timestamp: DateTime<Utc>,
    pub principal: String,
}

/// One envelope as it sits on the log: metadata, a string type tag, and an
/// untyped JSON payload. Deliberately not a closed Rust enum on the wire —
/// the store must be able to reject an event whose `event_type` it does not
/// recognize with [`crate::error::CoreError::UnsupportedEventType`], the way
/// a dynamically-typed reader would, rather than fail at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub meta: EventMeta,
    pub event_type: String,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(meta: EventMeta, payload: EventPayload) -> Self {
        let event_type = payload.type_name().to_string();
        let value = match payload {
            EventPayload::CertificateObtained(p) => serde_json::to_value(p),
            EventPayload::CertificateRemoved(p) => serde_json::to_value(p),
            EventPayload::ConfigUpdated(p) => serde_json::to_value(p),
        }
        .expect("event payload is always serializable");
        Event {
            meta,
            event_type,
            payload: value,
        }
    }

    /// Decodes the raw JSON payload into a typed [`EventPayload`], or fails
    /// with [`crate::error::CoreError::UnsupportedEventType`] if
    /// `event_type` names a kind this store does not know how to apply.
    pub fn decode(&self) -> crate::error::Result<EventPayload> {
        use crate::error::CoreError;
        Ok(match self.event_type.as_str() {
            "CertificateObtained" => {
                EventPayload::CertificateObtained(serde_json::from_value(self.payload.clone())?)
            }
            "CertificateRemoved" => {
                EventPayload::CertificateRemoved(serde_json::from_value(self.payload.clone())?)
            }
            "ConfigUpdated" => {
                EventPayload::ConfigUpdated(serde_json::from_value(self.payload.clone())?)
            }
            other => return Err(CoreError::UnsupportedEventType(other.to_string())),
        })
    }
}
