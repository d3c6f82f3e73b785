//! The event-sourced certificate store: a deterministic fold of the event
//! log into an in-memory index of active certificates.
//!
//! Apply rules are ported directly from `certificatestore/store.go`:
//! `CertificateObtained` replaces any existing certificate sharing its id
//! (and all of that certificate's hostname mappings) before inserting;
//! `CertificateRemoved` deletes by id if present, no-op otherwise;
//! `ConfigUpdated` overwrites the last-seen config. Any other event type is
//! a hard error — it means the reader and the writer have drifted apart on
//! schema.

use std::collections::HashMap;

use chrono::{DateTime, Months, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{CoreError, Result};
use crate::events::{
    ChallengeType, ConfigUpdated, Event, EventPayload, RawChallengeType,
};

/// Opaque, monotonically increasing position in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cursor(pub u64);

impl Cursor {
    pub const ZERO: Cursor = Cursor(0);

    pub fn next(self) -> Cursor {
        Cursor(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertDetails {
    pub not_after: DateTime<Utc>,
    pub cert_pem_bundle: String,
    pub private_key_encrypted: crate::encrypted_box::EncryptedBox,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManagedCertificate {
    pub id: String,
    pub domains: Vec<String>,
    pub renew_at: DateTime<Utc>,
    pub certificate: CertDetails,
    pub challenge_type: RawChallengeType,
}

impl ManagedCertificate {
    pub fn resolved_challenge_type(&self) -> ChallengeType {
        self.challenge_type.resolve()
    }
}

/// `renew_at = expires - 1 calendar month`, exact calendar-month
/// subtraction (not a fixed 30-day duration).
pub fn renew_at_from_expiration(expires: DateTime<Utc>) -> DateTime<Utc> {
    expires
        .checked_sub_months(Months::new(1))
        .unwrap_or(expires)
}

#[derive(Default)]
struct StoreState {
    certificates: Vec<ManagedCertificate>,
    by_hostname: HashMap<String, usize>,
    latest_config: Option<ConfigUpdated>,
    version: Cursor,
}

/// The in-memory projection. All mutation and all reads go through one
/// exclusive lock so that readers always observe a consistent snapshot:
/// it is impossible to see an updated hostname index while `version()`
/// still reports the pre-update cursor.
pub struct Store {
    state: Mutex<StoreState>,
}

impl Store {
    pub fn new() -> Self {
        Store {
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn version(&self) -> Cursor {
        self.state.lock().version
    }

    pub fn by_hostname(&self, hostname: &str) -> Option<ManagedCertificate> {
        let state = self.state.lock();
        state
            .by_hostname
            .get(hostname)
            .map(|&idx| state.certificates[idx].clone())
    }

    pub fn by_id(&self, id: &str) -> Option<ManagedCertificate> {
        let state = self.state.lock();
        state.certificates.iter().find(|c| c.id == id).cloned()
    }

    pub fn all(&self) -> Vec<ManagedCertificate> {
        self.state.lock().certificates.clone()
    }

    pub fn latest_encrypted_config(&self) -> Option<ConfigUpdated> {
        self.state.lock().latest_config.clone()
    }

    /// Applies one event and advances the cursor to `new_version`. Intended
    /// to be invoked once per event, in log order, by the log reader.
    pub fn apply(&self, event: &Event, new_version: Cursor) -> Result<()> {
        let payload = event.decode()?;
        let mut state = self.state.lock();
        apply_payload(&mut state, &payload)?;
        state.version = new_version;
        Ok(())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_payload(state: &mut StoreState, payload: &EventPayload) -> Result<()> {
    match payload {
        EventPayload::CertificateObtained(obtained) => {
            remove_by_id(state, &obtained.id);
            let managed = ManagedCertificate {
                id: obtained.id.clone(),
                domains: obtained.domains.clone(),
                renew_at: renew_at_from_expiration(obtained.expires),
                certificate: CertDetails {
                    not_after: obtained.expires,
                    cert_pem_bundle: obtained.cert_pem_bundle.clone(),
                    private_key_encrypted: obtained.private_key_ciphertext.clone(),
                },
                challenge_type: obtained.challenge_type.clone(),
            };
            let idx = state.certificates.len();
            for domain in &managed.domains {
                state.by_hostname.insert(domain.clone(), idx);
            }
            state.certificates.push(managed);
            Ok(())
        }
        EventPayload::CertificateRemoved(removed) => {
            remove_by_id(state, &removed.id);
            Ok(())
        }
        EventPayload::ConfigUpdated(config) => {
            state.latest_config = Some(config.clone());
            Ok(())
        }
    }
}

/// Removes the certificate with `id`, if present, splicing it out of the
/// vector and dropping all of its hostname mappings. Indices for entries
/// after the removed one shift down by one, so the hostname index is
/// rebuilt for the shifted tail.
fn remove_by_id(state: &mut StoreState, id: &str) {
    let Some(pos) = state.certificates.iter().position(|c| c.id == id) else {
        return;
    };
    let removed = state.certificates.remove(pos);
    for domain in &removed.domains {
        state.by_hostname.remove(domain);
    }
    for (idx, cert) in state.certificates.iter().enumerate().skip(pos) {
        for domain in &cert.domains {
            state.by_hostname.insert(domain.clone(), idx);
        }
    }
}
