//! Startup configuration, read once from a RON file.
//!
//! Every field has a default, so a missing file or a partial file is valid:
//!
//! ```ron
//! (
//!     bucket: "show-data-lake",
//!     region: "us-east-1",
//!     interval_secs: 60,
//!     publisher: Directory("./harvests"),
//!     log_file: Some("harvester.log"),
//! )
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use watchlist_engine::{
    local_clock, utc_clock, BackoffPolicy, FetchSettings, KeyClock, RunnerSettings,
    ScheduleSettings, DEFAULT_API_BASE_URL, DEFAULT_BUCKET, DEFAULT_RANKING_URL, DEFAULT_REGION,
};

pub const CONFIG_PATH_ENV: &str = "WATCHLIST_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.ron";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    File,
    Defaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum KeyClockKind {
    #[default]
    Utc,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub enum PublisherKind {
    /// Upload to `bucket` in `region` with a public-read ACL.
    #[default]
    S3,
    /// Write documents into a local directory.
    Directory(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    pub initial_interval_ms: u64,
    pub multiplier: f64,
    pub max_interval_ms: u64,
    pub randomization_factor: f64,
    pub max_elapsed_secs: Option<u64>,
    pub max_attempts: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            initial_interval_ms: policy.initial_interval.as_millis() as u64,
            multiplier: policy.multiplier,
            max_interval_ms: policy.max_interval.as_millis() as u64,
            randomization_factor: policy.randomization_factor,
            max_elapsed_secs: policy.max_elapsed_time.map(|d| d.as_secs()),
            max_attempts: policy.max_attempts,
        }
    }
}

impl BackoffConfig {
    pub fn policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial_interval: Duration::from_millis(self.initial_interval_ms),
            multiplier: self.multiplier,
            max_interval: Duration::from_millis(self.max_interval_ms),
            randomization_factor: self.randomization_factor,
            max_elapsed_time: self.max_elapsed_secs.map(Duration::from_secs),
            max_attempts: self.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bucket: String,
    pub region: String,
    pub interval_secs: u64,
    pub run_on_start: bool,
    pub workers: usize,
    pub key_clock: KeyClockKind,
    pub publisher: PublisherKind,
    pub ranking_url: String,
    pub api_base_url: String,
    pub backoff: BackoffConfig,
    pub log_file: Option<PathBuf>,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            region: DEFAULT_REGION.to_string(),
            interval_secs: 60,
            run_on_start: false,
            workers: 1,
            key_clock: KeyClockKind::default(),
            publisher: PublisherKind::default(),
            ranking_url: DEFAULT_RANKING_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            backoff: BackoffConfig::default(),
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = ron::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<(Self, ConfigSource), ConfigError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok((Self::from_ron(&text)?, ConfigSource::File)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigSource::Defaults))
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(ConfigError::Invalid("interval_secs must be positive".into()));
        }
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.bucket.trim().is_empty() && self.publisher == PublisherKind::S3 {
            return Err(ConfigError::Invalid("bucket must not be empty".into()));
        }
        let backoff = &self.backoff;
        if backoff.initial_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "backoff.initial_interval_ms must be positive".into(),
            ));
        }
        if backoff.max_interval_ms < backoff.initial_interval_ms {
            return Err(ConfigError::Invalid(
                "backoff.max_interval_ms must not be below initial_interval_ms".into(),
            ));
        }
        if backoff.multiplier.is_nan() || backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid("backoff.multiplier must be >= 1".into()));
        }
        if !(0.0..=1.0).contains(&backoff.randomization_factor) {
            return Err(ConfigError::Invalid(
                "backoff.randomization_factor must be within [0, 1]".into(),
            ));
        }
        if backoff.max_attempts == Some(0) {
            return Err(ConfigError::Invalid("backoff.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn schedule_settings(&self) -> ScheduleSettings {
        ScheduleSettings {
            interval: Duration::from_secs(self.interval_secs),
            run_on_start: self.run_on_start,
        }
    }

    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            workers: self.workers,
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            ranking_url: self.ranking_url.clone(),
            api_base_url: self.api_base_url.clone(),
            ..FetchSettings::default()
        }
    }

    pub fn key_clock(&self) -> KeyClock {
        match self.key_clock {
            KeyClockKind::Utc => utc_clock(),
            KeyClockKind::Local => local_clock(),
        }
    }
}

/// `$WATCHLIST_CONFIG`, or `./config.ron`.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
