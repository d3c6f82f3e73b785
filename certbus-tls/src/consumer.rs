//! The TLS server-side certificate resolver consumers hand to their HTTPS
//! listener. Ported from `certbus.App.GetCertificateAdapter`: an SNI lookup
//! that supports exactly one level of wildcard fallback.

use std::sync::Arc;

use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use crate::decrypted_store::{by_hostname_supporting_wildcard, DecryptedStore};

/// A `rustls::server::ResolvesServerCert` implementation backed by a
/// [`DecryptedStore`]. Construct once, hand an `Arc` of it to
/// `rustls::ServerConfig::builder()...with_cert_resolver(...)`.
pub struct CertBusResolver {
    store: Arc<DecryptedStore>,
}

impl CertBusResolver {
    pub fn new(store: Arc<DecryptedStore>) -> Self {
        CertBusResolver { store }
    }
}

impl ResolvesServerCert for CertBusResolver {
    fn resolve(&self, client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        let sni = client_hello.server_name()?;
        match by_hostname_supporting_wildcard(&self.store, sni) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(hostname = sni, error = %e, "failed to resolve certificate");
                None
            }
        }
    }
}
