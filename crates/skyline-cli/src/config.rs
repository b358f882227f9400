use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use skyline_index::StorageConfig;
use skyline_ingest::IngestConfig;
use skyline_server::ServerConfig;

/// The whole configuration file. Every section and field is optional.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkylineConfig {
    pub firehose: IngestConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub session: SessionConfig,
    pub log: LogConfig,
}

/// `[session]`: where `createSession` is sent. Credentials come from the
/// environment only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub service_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_url: "https://bsky.social".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Values given on the command line, which win over the file.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub bind: Option<SocketAddr>,
    pub db: Option<PathBuf>,
    pub relay: Option<String>,
    pub log_format: Option<LogFormat>,
}

impl SkylineConfig {
    /// Load `path`, or the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(bind) = overrides.bind {
            self.server.bind_addr = bind;
        }
        if let Some(db) = overrides.db {
            self.storage.path = db;
        }
        if let Some(relay) = overrides.relay {
            self.firehose.relay_url = relay;
        }
        if let Some(format) = overrides.log_format {
            self.log.format = format;
        }
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("serializing config")
    }
}
