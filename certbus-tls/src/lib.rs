//! Consumer-side TLS integration: the decrypting cache in front of the
//! event-sourced `Store`, the synchronizer poll loop, and the rustls SNI
//! resolver that glues the two into a running HTTPS server.

pub mod consumer;
pub mod decrypted_store;
pub mod error;
pub mod source;
pub mod synchronizer;

pub use consumer::CertBusResolver;
pub use decrypted_store::{by_hostname_supporting_wildcard, DecryptedStore};
pub use error::{Result, TlsError};
pub use source::CertificateSource;
pub use synchronizer::Synchronizer;
