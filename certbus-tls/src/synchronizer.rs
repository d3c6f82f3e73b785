//! The consumer-side poll loop, ported from `certbus.App.Synchronizer`: a
//! 10-second tick that replays any new events into the store, logging but
//! swallowing tick errors so a transient log-service hiccup never kills the
//! consumer process.

use std::sync::Arc;
use std::time::Duration;

use certbus_core::store::Store;
use certbus_log::EventLog;
use tokio_util::sync::CancellationToken;

const TICK_INTERVAL: Duration = Duration::from_secs(10);

pub struct Synchronizer {
    log: Arc<dyn EventLog>,
    store: Arc<Store>,
    cancel: CancellationToken,
}

impl Synchronizer {
    pub fn new(log: Arc<dyn EventLog>, store: Arc<Store>) -> (Self, CancellationToken) {
        let cancel = CancellationToken::new();
        (
            Synchronizer {
                log,
                store,
                cancel: cancel.clone(),
            },
            cancel,
        )
    }

    /// Runs until cancelled. Each tick, catches the store up to the log's
    /// current tip; failures are logged and do not stop the loop.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("synchronizer stopping");
                    return;
                }
                _ = interval.tick() => {
                    if let Err(e) = certbus_log::load_until_realtime(self.log.as_ref(), &self.store).await {
                        tracing::warn!(error = %e, "synchronizer tick failed, retrying next tick");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certbus_core::events::{CertificateRemoved, Event, EventMeta, EventPayload};
    use certbus_core::store::Cursor;
    use certbus_log::MemoryEventLog;
    use chrono::Utc;

    #[tokio::test(start_paused = true)]
    async fn catches_store_up_on_tick_and_stops_on_cancel() {
        let log: Arc<dyn EventLog> = Arc::new(MemoryEventLog::new());
        let store = Arc::new(Store::new());

        log.append(vec![Event::new(
            EventMeta {
                timestamp: Utc::now(),
                principal: "manager".to_string(),
            },
            EventPayload::CertificateRemoved(CertificateRemoved { id: "c1".to_string() }),
        )])
        .await
        .unwrap();

        let (sync, cancel) = Synchronizer::new(log, store.clone());
        let handle = tokio::spawn(async move { sync.run().await });

        tokio::time::advance(TICK_INTERVAL + Duration::from_millis(10)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.version(), Cursor(1));

        cancel.cancel();
        handle.await.unwrap();
    }
}
