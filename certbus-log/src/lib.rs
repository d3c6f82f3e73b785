//! The event log contract CertBus depends on, plus a dependency-free
//! file-backed default implementation.
//!
//! A production deployment is expected to swap [`EventLog`] for a real
//! append-only log service; this crate only needs the contract to hold.

pub mod error;
pub mod file_log;
pub mod memory_log;

pub use error::{LogError, Result};
pub use file_log::FileEventLog;
pub use memory_log::MemoryEventLog;

use async_trait::async_trait;
use certbus_core::events::Event;
use certbus_core::store::{Cursor, Store};

/// The append-only log a `Store` replays from.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// The log's current tip, i.e. the cursor of the most recently
    /// committed event.
    async fn tip(&self) -> Result<Cursor>;

    /// All events strictly after `cursor`, each paired with the cursor it
    /// commits at, in log order.
    async fn events_after(&self, cursor: Cursor) -> Result<Vec<(Cursor, Event)>>;

    /// Unconditional append; returns the new tip.
    async fn append(&self, events: Vec<Event>) -> Result<Cursor>;

    /// Conditional append: fails with [`LogError::VersionConflict`] if the
    /// log has advanced past `expected` since the caller last read it.
    async fn append_after(&self, expected: Cursor, events: Vec<Event>) -> Result<Cursor>;
}

/// Replays every event strictly after `store`'s current cursor into it,
/// catching the store up to the log's tip at the time of the call.
pub async fn load_until_realtime(log: &dyn EventLog, store: &Store) -> Result<()> {
    let pending = log.events_after(store.version()).await?;
    for (cursor, event) in pending {
        store.apply(&event, cursor)?;
    }
    Ok(())
}
