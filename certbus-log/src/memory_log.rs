//! An in-memory `EventLog`, used in tests in place of a real log service.

use async_trait::async_trait;
use certbus_core::events::Event;
use certbus_core::store::Cursor;
use parking_lot::Mutex;

use crate::error::{LogError, Result};
use crate::EventLog;

#[derive(Default)]
pub struct MemoryEventLog {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn tip(&self) -> Result<Cursor> {
        Ok(Cursor(self.events.lock().len() as u64))
    }

    async fn events_after(&self, cursor: Cursor) -> Result<Vec<(Cursor, Event)>> {
        let events = self.events.lock();
        Ok(events
            .iter()
            .enumerate()
            .filter_map(|(idx, event)| {
                let pos = Cursor(idx as u64 + 1);
                (pos > cursor).then(|| (pos, event.clone()))
            })
            .collect())
    }

    async fn append(&self, new_events: Vec<Event>) -> Result<Cursor> {
        let mut events = self.events.lock();
        events.extend(new_events);
        Ok(Cursor(events.len() as u64))
    }

    async fn append_after(&self, expected: Cursor, new_events: Vec<Event>) -> Result<Cursor> {
        let mut events = self.events.lock();
        let current = Cursor(events.len() as u64);
        if expected != current {
            return Err(LogError::VersionConflict {
                expected,
                actual: current,
            });
        }
        events.extend(new_events);
        Ok(Cursor(events.len() as u64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certbus_core::events::{CertificateRemoved, EventMeta, EventPayload};
    use certbus_core::store::Store;
    use chrono::Utc;

    fn removal(id: &str) -> Event {
        Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "test".to_string(),
            },
            EventPayload::CertificateRemoved(CertificateRemoved { id: id.to_string() }),
        )
    }

    #[tokio::test]
    async fn append_after_rejects_stale_cursor() {
        let log = MemoryEventLog::new();
        log.append(vec![removal("a")]).await.unwrap();
        let err = log
            .append_after(Cursor(0), vec![removal("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn append_after_succeeds_at_matching_cursor() {
        let log = MemoryEventLog::new();
        log.append(vec![removal("a")]).await.unwrap();
        let new_tip = log.append_after(Cursor(1), vec![removal("b")]).await.unwrap();
        assert_eq!(new_tip, Cursor(2));
    }

    #[tokio::test]
    async fn load_until_realtime_advances_store_cursor() {
        let log = MemoryEventLog::new();
        log.append(vec![removal("a"), removal("b")]).await.unwrap();

        let store = Store::new();
        crate::load_until_realtime(&log, &store).await.unwrap();
        assert_eq!(store.version(), Cursor(2));

        // A second call with nothing new is a no-op.
        crate::load_until_realtime(&log, &store).await.unwrap();
        assert_eq!(store.version(), Cursor(2));
    }
}
