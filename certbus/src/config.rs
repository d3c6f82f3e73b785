//! Non-secret startup configuration, loaded from `certbus.toml`. Secrets (the
//! manager key, the consumer KEK, Cloudflare credentials) never live here;
//! they come from on-disk key files and the encrypted on-log config
//! exclusively.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AcmeEnvironment {
    #[default]
    Staging,
    Production,
}

impl AcmeEnvironment {
    pub fn directory_url(self) -> &'static str {
        match self {
            AcmeEnvironment::Staging => "https://acme-staging-v02.api.letsencrypt.org/directory",
            AcmeEnvironment::Production => "https://acme-v02.api.letsencrypt.org/directory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct AppConfig {
    pub stream_dir: Option<String>,
    pub acme_environment: AcmeEnvironment,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            stream_dir: None,
            acme_environment: AcmeEnvironment::default(),
        }
    }
}

impl AppConfig {
    /// Loads `path` if it exists; falls back to defaults otherwise, so a
    /// bare `certbus` checkout with no `certbus.toml` still runs.
    pub fn load(path: &Path) -> Result<AppConfig> {
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    /// `stream_dir`, falling back to `CERTBUS_STREAM_DIR` if unset in the
    /// file — `FileEventLog::default_path` applies its own platform default
    /// after that.
    pub fn resolved_stream_dir(&self) -> Option<String> {
        self.stream_dir
            .clone()
            .or_else(|| std::env::var("CERTBUS_STREAM_DIR").ok())
    }
}
