//! Dead-man's-switch check-in client. Ported from `manager.go`'s
//! `listRenewable` alertmanager call: turns "no renewal occurred recently"
//! into an externally-observable alert without a long-running daemon.

use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use crate::error::{AcmeError, Result};

pub struct AlertmanagerClient {
    client: reqwest::Client,
    base_url: String,
}

impl AlertmanagerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        AlertmanagerClient {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Posts a `DeadMansSwitch` alert named `name` whose `EndsAt` is `now + ttl`.
    /// Alertmanager fires the paired "this alert disappeared" rule if no
    /// check-in refreshes `EndsAt` before it elapses.
    pub async fn dead_mans_switch_checkin(&self, name: &str, ttl: Duration) -> Result<()> {
        let ends_at = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();

        #[derive(Serialize)]
        struct Labels<'a> {
            alertname: &'a str,
        }

        #[derive(Serialize)]
        struct Alert<'a> {
            labels: Labels<'a>,
            #[serde(rename = "endsAt")]
            ends_at: String,
        }

        let body = vec![Alert {
            labels: Labels { alertname: name },
            ends_at: ends_at.to_rfc3339(),
        }];

        let url = format!("{}/api/v1/alerts", self.base_url.trim_end_matches('/'));
        self.client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(wrap)?
            .error_for_status()
            .map_err(wrap)?;
        Ok(())
    }
}

fn wrap(e: reqwest::Error) -> AcmeError {
    AcmeError::Alertmanager(e.to_string())
}
