//! Node configuration.
//!
//! `config.yml` describes the cluster topology as seen by a primary
//! (`secondaries`, `quorum`) plus the heartbeat cadence shared by every
//! node. Role (`WORK_MODE`) and log-prefix (`APP_NAME`) come from the
//! process environment, not the file, since they vary per process even
//! when every node shares one `config.yml`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// The role a node was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkMode {
    Master,
    Secondary,
}

impl WorkMode {
    fn parse(raw: &str) -> crate::Result<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "master" => Ok(WorkMode::Master),
            "secondary" => Ok(WorkMode::Secondary),
            other => Err(crate::Error::Config(format!(
                "unknown WORK_MODE '{other}', expected 'master' or 'secondary'"
            ))),
        }
    }
}

impl std::fmt::Display for WorkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkMode::Master => write!(f, "master"),
            WorkMode::Secondary => write!(f, "secondary"),
        }
    }
}

/// The on-disk `config.yml` shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClusterFile {
    /// Follower name -> base URL, e.g. `secondary-1: "http://10.0.0.2:8000"`.
    #[serde(default)]
    pub secondaries: HashMap<String, String>,

    /// Required alive count (including self) before the primary accepts
    /// writes. Only meaningful on a master.
    #[serde(default)]
    pub quorum: usize,

    #[serde(default = "default_heartbeat_interval_seconds")]
    pub heartbeat_interval_seconds: u64,
}

fn default_heartbeat_interval_seconds() -> u64 {
    5
}

/// Fully resolved node configuration: `config.yml` plus environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub work_mode: WorkMode,
    pub app_name: String,
    pub secondaries: HashMap<String, String>,
    pub quorum: usize,
    pub heartbeat_interval_seconds: u64,
}

impl Config {
    /// Load `config.yml` from `path` and resolve `WORK_MODE`/`APP_NAME`
    /// from the process environment.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse the `config.yml` body directly, reading role/name from the
    /// environment. Split out from [`Config::load`] so tests can supply a
    /// YAML literal without touching the filesystem.
    pub fn from_yaml_str(content: &str) -> crate::Result<Self> {
        let file: ClusterFile = serde_yaml::from_str(content)?;

        let work_mode = match std::env::var("WORK_MODE") {
            Ok(v) => WorkMode::parse(&v)?,
            Err(_) => WorkMode::Master,
        };

        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| work_mode.to_string());

        let config = Config {
            work_mode,
            app_name,
            secondaries: file.secondaries,
            quorum: file.quorum,
            heartbeat_interval_seconds: file.heartbeat_interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if self.work_mode == WorkMode::Master && self.quorum == 0 {
            return Err(crate::Error::Config(
                "quorum must be at least 1 for a master node".into(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn is_master(&self) -> bool {
        self.work_mode == WorkMode::Master
    }
}
