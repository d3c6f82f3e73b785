//! A newline-delimited-JSON, one-file-per-stream `EventLog`. Each line is a
//! serialized [`Event`]; its 1-based line number is its cursor. Conditional
//! appends take an advisory exclusive file lock and compare the file's
//! current line count against the caller's expected cursor before writing —
//! the optimistic-concurrency check a real log service would perform
//! server-side.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use async_trait::async_trait;
use certbus_core::events::Event;
use certbus_core::store::Cursor;
use fs2::FileExt;

use crate::error::{LogError, Result};
use crate::EventLog;

pub struct FileEventLog {
    path: PathBuf,
}

impl FileEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileEventLog { path: path.into() }
    }

    /// Default stream file location: `$CERTBUS_STREAM_DIR/certbus.ndjson`,
    /// falling back to the platform data-local directory.
    pub fn default_path() -> PathBuf {
        if let Ok(dir) = std::env::var("CERTBUS_STREAM_DIR") {
            return PathBuf::from(dir).join("certbus.ndjson");
        }
        dirs::data_local_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("certbus")
            .join("certbus.ndjson")
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(content.lines().filter(|l| !l.is_empty()).map(str::to_string).collect())
    }

    fn append_locked(&self, expected: Option<Cursor>, events: Vec<Event>) -> Result<Cursor> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.lock_exclusive()?;

        let result = (|| -> Result<Cursor> {
            let current_lines = self.read_lines()?;
            let current = Cursor(current_lines.len() as u64);

            if let Some(expected) = expected {
                if expected != current {
                    return Err(LogError::VersionConflict {
                        expected,
                        actual: current,
                    });
                }
            }

            let mut handle = &file;
            for event in &events {
                let line = serde_json::to_string(event)?;
                writeln!(handle, "{line}")?;
            }
            Ok(Cursor(current.0 + events.len() as u64))
        })();

        let _ = file.unlock();
        result
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn tip(&self) -> Result<Cursor> {
        Ok(Cursor(self.read_lines()?.len() as u64))
    }

    async fn events_after(&self, cursor: Cursor) -> Result<Vec<(Cursor, Event)>> {
        let lines = self.read_lines()?;
        let mut out = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            let pos = Cursor(idx as u64 + 1);
            if pos > cursor {
                let event: Event = serde_json::from_str(line)?;
                out.push((pos, event));
            }
        }
        Ok(out)
    }

    async fn append(&self, events: Vec<Event>) -> Result<Cursor> {
        self.append_locked(None, events)
    }

    async fn append_after(&self, expected: Cursor, events: Vec<Event>) -> Result<Cursor> {
        self.append_locked(Some(expected), events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use certbus_core::events::{CertificateRemoved, EventMeta, EventPayload};
    use certbus_core::store::Store;
    use chrono::Utc;
    use tempfile::tempdir;

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
    async fn append_and_replay_round_trips() {
        let dir = tempdir().unwrap();
        let log = FileEventLog::new(dir.path().join("stream.ndjson"));

        log.append(vec![removal("a")]).await.unwrap();
        log.append(vec![removal("b"), removal("c")]).await.unwrap();

        assert_eq!(log.tip().await.unwrap(), Cursor(3));
        let after = log.events_after(Cursor(1)).await.unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].0, Cursor(2));
    }

    #[tokio::test]
    async fn append_after_detects_version_conflict() {
        let dir = tempdir().unwrap();
        let log = FileEventLog::new(dir.path().join("stream.ndjson"));
        log.append(vec![removal("a")]).await.unwrap();

        let err = log
            .append_after(Cursor(0), vec![removal("b")])
            .await
            .unwrap_err();
        assert!(matches!(err, LogError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn persists_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stream.ndjson");
        {
            let log = FileEventLog::new(&path);
            log.append(vec![removal("a")]).await.unwrap();
        }
        let reopened = FileEventLog::new(&path);
        assert_eq!(reopened.tip().await.unwrap(), Cursor(1));

        let store = Store::new();
        crate::load_until_realtime(&reopened, &store).await.unwrap();
        assert_eq!(store.version(), Cursor(1));
    }
}
