//! The minimal interface `DecryptedStore` needs from whatever backs it.
//! Kept as a trait (rather than hard-coding `certbus_core::store::Store`) so
//! tests can wrap a store with a call-counting decorator to verify the exact
//! cache-hit/miss behavior documented in SPEC_FULL.md's call-counting
//! scenario.

use certbus_core::store::{Cursor, ManagedCertificate, Store};

pub trait CertificateSource: Send + Sync {
    fn by_hostname(&self, hostname: &str) -> Option<ManagedCertificate>;
    fn version(&self) -> Cursor;
}

impl CertificateSource for Store {
    fn by_hostname(&self, hostname: &str) -> Option<ManagedCertificate> {
        Store::by_hostname(self, hostname)
    }

    fn version(&self) -> Cursor {
        Store::version(self)
    }
}
