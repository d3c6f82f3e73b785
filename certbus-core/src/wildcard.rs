//! Hostname resolution supporting one level of wildcard matching, ported
//! from `certificatestore/wildcardresolver.go`.

use crate::store::{ManagedCertificate, Store};

/// Computes the wildcard form of a hostname: drops the first DNS label and
/// prefixes `*.`. `"foobar.example.com"` becomes `"*.example.com"`. Returns
/// `None` for a hostname with no dot (nothing to strip) or an empty string.
pub fn wildcard_version_of_hostname(hostname: &str) -> Option<String> {
    if hostname.is_empty() {
        return None;
    }
    let dot = hostname.find('.')?;
    Some(format!("*.{}", &hostname[dot + 1..]))
}

/// Exact match first; on miss, try exactly one level of wildcard. Never
/// descends further — `a.b.example.com` tries itself then `*.b.example.com`,
/// never `*.example.com`.
pub fn by_hostname_supporting_wildcard(store: &Store, hostname: &str) -> Option<ManagedCertificate> {
    if let Some(cert) = store.by_hostname(hostname) {
        return Some(cert);
    }
    let wildcard = wildcard_version_of_hostname(hostname)?;
    store.by_hostname(&wildcard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encrypted_box::EncryptedBox;
    use crate::events::{CertificateObtained, Event, EventMeta, EventPayload, RawChallengeType, Reason};
    use crate::store::Cursor;
    use chrono::{TimeZone, Utc};

    fn store_with_wildcard() -> Store {
        let store = Store::new();
        let ev = Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "manager".to_string(),
            },
            EventPayload::CertificateObtained(CertificateObtained {
                id: "c1".to_string(),
                reason: Reason::New,
                domains: vec!["*.example.com".to_string(), "example.com".to_string()],
                expires: Utc.with_ymd_and_hms(2020, 2, 21, 0, 0, 0).unwrap(),
                cert_pem_bundle: "pem".to_string(),
                private_key_dek_fingerprint: "SHA256:dummy".to_string(),
                private_key_ciphertext: EncryptedBox {
                    key_fingerprint: "SHA256:dummy".to_string(),
                    ciphertext: vec![1],
                },
                challenge_type: RawChallengeType("dns-01".to_string()),
            }),
        );
        store.apply(&ev, Cursor(1)).unwrap();
        store
    }

    #[test]
    fn wildcard_strips_exactly_one_label() {
        assert_eq!(
            wildcard_version_of_hostname("foobar.example.com"),
            Some("*.example.com".to_string())
        );
    }

    #[test]
    fn empty_hostname_has_no_wildcard_form() {
        assert_eq!(wildcard_version_of_hostname(""), None);
    }

    #[test]
    fn exact_match_preferred_over_wildcard() {
        let store = store_with_wildcard();
        let cert = by_hostname_supporting_wildcard(&store, "example.com").unwrap();
        assert_eq!(cert.id, "c1");
    }

    #[test]
    fn single_level_subdomain_resolves_via_wildcard() {
        let store = store_with_wildcard();
        let cert = by_hostname_supporting_wildcard(&store, "foo.example.com").unwrap();
        assert_eq!(cert.id, "c1");
    }

    #[test]
    fn never_descends_more_than_one_level() {
        let store = store_with_wildcard();
        assert!(by_hostname_supporting_wildcard(&store, "a.b.example.com").is_none());
    }
}
