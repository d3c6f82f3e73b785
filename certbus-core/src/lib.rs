//! CertBus core domain model: the encrypted envelope format, the event
//! payloads published to the log, and the event-sourced certificate store.

pub mod encrypted_box;
pub mod error;
pub mod events;
pub mod store;
pub mod wildcard;

pub use encrypted_box::EncryptedBox;
pub use error::{CoreError, Result};
pub use store::{CertDetails, Cursor, ManagedCertificate, Store};
