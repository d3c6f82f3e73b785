//! ACME issuance, challenge delivery, and the manager pipeline: the
//! privileged side of CertBus that only ever runs under the manager's key.

pub mod acme_client;
pub mod alertmanager;
pub mod cert_id;
pub mod challenge;
pub mod config;
pub mod error;
pub mod manager;

pub use acme_client::{AcmeClient, IssuedCertificate};
pub use alertmanager::AlertmanagerClient;
pub use cert_id::new_cert_id;
pub use challenge::{ChallengeKind, ChallengeProvider, CloudflareDns01Provider, S3Http01Provider};
pub use config::Config;
pub use error::{AcmeError, Result};
pub use manager::{load_manager_private_key, CertShape, Manager};
