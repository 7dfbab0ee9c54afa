//! Application configuration.
//!
//! Loaded once from a YAML file at startup and never modified afterwards.
//!
//! ```yaml
//! list_room_id:
//!   - 61879
//!   - 61880
//! number_process: 4
//! slack:
//!   bot_token: xoxb-...
//!   channel: C0123456
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use showroom_api::ClientConfig;
use tracing::{debug, warn};

use crate::dispatch::WorkerPoolConfig;
use crate::notification::SlackConfig;
use crate::{Error, Result};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yml";

/// A setting accepted with an adjustment while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// The room appeared more than once; later entries were dropped.
    DuplicateRoom(u64),
    /// Only one of `bot_token` and `channel` is set.
    IncompleteSlack,
}

impl ConfigWarning {
    pub fn log(&self) {
        match self {
            Self::DuplicateRoom(room_id) => {
                warn!(room_id, "Duplicate room id in configuration ignored")
            }
            Self::IncompleteSlack => {
                warn!("Slack needs both bot_token and channel; error notification disabled")
            }
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Rooms to monitor, in polling order.
    pub list_room_id: Vec<u64>,
    /// Maximum concurrent archive tasks; defaults to the CPU count.
    #[serde(default)]
    pub number_process: Option<usize>,
    /// Slack credentials for fatal error reports.
    #[serde(default)]
    pub slack: Option<SlackConfig>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
    /// Also write logs to daily files in this directory.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub api: ApiConfig,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

/// FFmpeg capture settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegConfig {
    pub binary_path: String,
    /// Seconds between asking ffmpeg to quit and killing it.
    pub time_to_force_termination_secs: u64,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            time_to_force_termination_secs: 8,
        }
    }
}

impl FfmpegConfig {
    pub fn time_to_force_termination(&self) -> Duration {
        Duration::from_secs(self.time_to_force_termination_secs)
    }
}

/// SHOWROOM API settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Explicit proxy for API requests.
    pub proxy_url: Option<String>,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` when no explicit proxy is set.
    pub use_system_proxy: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: showroom_api::client::DEFAULT_BASE_URL.to_string(),
            timeout_secs: showroom_api::client::DEFAULT_TIMEOUT.as_secs(),
            proxy_url: None,
            use_system_proxy: true,
        }
    }
}

impl ApiConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            proxy_url: self.proxy_url.clone(),
            use_system_proxy: self.use_system_proxy,
        }
    }
}

impl AppConfig {
    /// Config for `rooms` with every other setting at its default.
    pub fn new(rooms: impl IntoIterator<Item = u64>) -> Self {
        Self {
            list_room_id: rooms.into_iter().collect(),
            number_process: None,
            slack: None,
            output_dir: default_output_dir(),
            ffmpeg: FfmpegConfig::default(),
            log_dir: None,
            api: ApiConfig::default(),
        }
    }

    /// Read, parse and validate the file at `path`.
    ///
    /// Configuration is usually loaded before logging is up, so adjustments
    /// are returned for the caller to log with [`ConfigWarning::log`].
    pub fn load(path: impl AsRef<Path>) -> Result<(Self, Vec<ConfigWarning>)> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let (config, warnings) = Self::from_yaml(&contents)?;
        debug!(path = %path.display(), rooms = config.list_room_id.len(), "Configuration loaded");
        Ok((config, warnings))
    }

    /// Parse and validate YAML.
    pub fn from_yaml(contents: &str) -> Result<(Self, Vec<ConfigWarning>)> {
        let mut config: Self = serde_yaml::from_str(contents)?;
        let warnings = config.normalize();
        config.validate()?;
        Ok((config, warnings))
    }

    /// Drop repeated room ids, keeping the first occurrence.
    fn normalize(&mut self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::with_capacity(self.list_room_id.len());
        self.list_room_id.retain(|room_id| {
            let first = seen.insert(*room_id);
            if !first {
                warnings.push(ConfigWarning::DuplicateRoom(*room_id));
            }
            first
        });

        if let Some(slack) = &self.slack {
            if slack.bot_token.is_empty() != slack.channel.is_empty() {
                warnings.push(ConfigWarning::IncompleteSlack);
            }
        }
        warnings
    }

    pub fn validate(&self) -> Result<()> {
        if self.list_room_id.is_empty() {
            return Err(Error::config("list_room_id must contain at least one room"));
        }
        if self.number_process == Some(0) {
            return Err(Error::config("number_process must be at least 1"));
        }
        if self.ffmpeg.binary_path.trim().is_empty() {
            return Err(Error::config("ffmpeg.binary_path must not be empty"));
        }
        if self.api.timeout_secs == 0 {
            return Err(Error::config("api.timeout_secs must be at least 1"));
        }
        Ok(())
    }

    pub fn worker_pool_config(&self) -> WorkerPoolConfig {
        match self.number_process {
            Some(max_workers) => WorkerPoolConfig { max_workers },
            None => WorkerPoolConfig::default(),
        }
    }

    /// Slack settings, if notification is configured.
    pub fn slack(&self) -> Option<&SlackConfig> {
        self.slack.as_ref().filter(|slack| slack.is_enabled())
    }
}
