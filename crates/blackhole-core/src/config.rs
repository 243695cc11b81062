//! Configuration system for Blackhole.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $BLACKHOLE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/blackhole/config.toml
//!   3. ~/.config/blackhole/config.toml
//!
//! The `[sink]` table is the document served and edited through the API
//! (see [`crate::store::ConfigStore`]); the other tables are read once at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackholeConfig {
    pub network: NetworkConfig,
    pub sink: SinkSettings,
    pub engine: EngineSettings,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the HTTP API binds to.
    pub bind: String,
    /// TCP port for the HTTP API.
    pub api_port: u16,
}

/// User-editable traffic sink settings. Field names are the JSON names the
/// frontend uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkSettings {
    pub speed_limit_mbps: u32,
    /// The enforced daily quota.
    pub daily_quota_min_gb: u64,
    pub daily_quota_max_gb: u64,
    /// "HH:MM", local time.
    pub schedule_start: String,
    pub schedule_end: String,
    pub sleep_min_minutes: u32,
    pub sleep_max_minutes: u32,
    /// Download targets. Empty is valid: the sink idles.
    pub urls: Vec<String>,
}

/// Download engine tuning. Durations are plain integers with a unit suffix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Accounting unit for streamed bodies.
    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    /// Timeout for the HEAD probe.
    pub probe_timeout_secs: u64,
    /// Timeout for each body read.
    pub body_timeout_secs: u64,
    /// Pause between finished downloads.
    pub rest_min_ms: u64,
    pub rest_max_ms: u64,
    /// Pause after a failed download.
    pub error_backoff_min_ms: u64,
    pub error_backoff_max_ms: u64,
    /// Pause when the URL list is empty.
    pub empty_wait_ms: u64,
    /// Upper clamp for the reported speed.
    pub max_display_mbps: f64,
    /// Number of speed samples kept for the chart.
    pub speed_history_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Interface list refresh period.
    pub refresh_secs: u64,
    /// Interface name prefixes never reported.
    pub exclude_prefixes: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for BlackholeConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            sink: SinkSettings::default(),
            engine: EngineSettings::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            api_port: 8080,
        }
    }
}

impl Default for SinkSettings {
    fn default() -> Self {
        Self {
            speed_limit_mbps: 10,
            daily_quota_min_gb: 100,
            daily_quota_max_gb: 200,
            schedule_start: "00:00".to_string(),
            schedule_end: "23:59".to_string(),
            sleep_min_minutes: 10,
            sleep_max_minutes: 20,
            urls: Vec::new(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            connect_timeout_secs: 10,
            probe_timeout_secs: 10,
            body_timeout_secs: 30,
            rest_min_ms: 2_000,
            rest_max_ms: 8_000,
            error_backoff_min_ms: 10_000,
            error_backoff_max_ms: 30_000,
            empty_wait_ms: 5_000,
            max_display_mbps: 100.0,
            speed_history_len: 30,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 30,
            exclude_prefixes: vec!["docker".into(), "veth".into(), "br-".into()],
        }
    }
}

// ── Validation ────────────────────────────────────────────────────────────────

impl SinkSettings {
    /// Check the invariants the sink relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.daily_quota_min_gb == 0 {
            return Err(ConfigError::Invalid(
                "daily_quota_min_gb must be greater than 0".into(),
            ));
        }
        if self.daily_quota_min_gb > self.daily_quota_max_gb {
            return Err(ConfigError::Invalid(
                "daily_quota_min_gb must not exceed daily_quota_max_gb".into(),
            ));
        }
        if self.sleep_min_minutes > self.sleep_max_minutes {
            return Err(ConfigError::Invalid(
                "sleep_min_minutes must not exceed sleep_max_minutes".into(),
            ));
        }
        for (field, value) in [
            ("schedule_start", &self.schedule_start),
            ("schedule_end", &self.schedule_end),
        ] {
            if parse_hhmm(value).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be HH:MM, got {value:?}"
                )));
            }
        }
        if let Some(url) = self
            .urls
            .iter()
            .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
        {
            return Err(ConfigError::Invalid(format!(
                "unsupported url scheme: {url}"
            )));
        }
        Ok(())
    }

    /// Daily quota in bytes.
    pub fn daily_quota_bytes(&self) -> u64 {
        crate::units::gb_to_bytes(self.daily_quota_min_gb)
    }
}

/// Parse "HH:MM" into minutes since midnight.
pub fn parse_hhmm(s: &str) -> Option<u32> {
    let (h, m) = s.split_once(':')?;
    if h.len() != 2 || m.len() != 2 {
        return None;
    }
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("blackhole")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl BlackholeConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load a config file without env overrides. A missing file yields defaults.
    pub fn load_from(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(BlackholeConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("BLACKHOLE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            BlackholeConfig::default().write_to(&path)?;
        }
        Ok(path)
    }

    /// Serialize to `path` atomically: temp file, then rename.
    pub fn write_to(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(self).map_err(ConfigError::SerializeFailed)?;
        let tmp = path.with_extension("toml.tmp");
        std::fs::write(&tmp, text).map_err(|e| ConfigError::WriteFailed(tmp.clone(), e))?;
        std::fs::rename(&tmp, path).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply BLACKHOLE_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BLACKHOLE_NETWORK__BIND") {
            self.network.bind = v;
        }
        if let Ok(v) = std::env::var("BLACKHOLE_NETWORK__API_PORT") {
            if let Ok(p) = v.parse() {
                self.network.api_port = p;
            }
        }
        if let Ok(v) = std::env::var("BLACKHOLE_SINK__DAILY_QUOTA_MIN_GB") {
            if let Ok(gb) = v.parse() {
                self.sink.daily_quota_min_gb = gb;
            }
        }
        if let Ok(v) = std::env::var("BLACKHOLE_SINK__URLS") {
            self.sink.urls = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
}
