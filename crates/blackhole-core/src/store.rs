//! Config store — the durable sink settings document.
//!
//! Holds the whole [`BlackholeConfig`] in memory and, when constructed with
//! a persist path, writes the merged document back to disk on every update.
//! Only the `[sink]` table is editable at runtime.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::config::{BlackholeConfig, ConfigError, SinkSettings};

/// Partial update of [`SinkSettings`]. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub speed_limit_mbps: Option<u32>,
    pub daily_quota_min_gb: Option<u64>,
    pub daily_quota_max_gb: Option<u64>,
    pub schedule_start: Option<String>,
    pub schedule_end: Option<String>,
    pub sleep_min_minutes: Option<u32>,
    pub sleep_max_minutes: Option<u32>,
    /// An empty list keeps the existing URLs.
    pub urls: Option<Vec<String>>,
}

impl ConfigPatch {
    /// Merge into `settings`.
    pub fn apply(self, settings: &mut SinkSettings) {
        if let Some(v) = self.speed_limit_mbps {
            settings.speed_limit_mbps = v;
        }
        if let Some(v) = self.daily_quota_min_gb {
            settings.daily_quota_min_gb = v;
        }
        if let Some(v) = self.daily_quota_max_gb {
            settings.daily_quota_max_gb = v;
        }
        if let Some(v) = self.schedule_start {
            settings.schedule_start = v;
        }
        if let Some(v) = self.schedule_end {
            settings.schedule_end = v;
        }
        if let Some(v) = self.sleep_min_minutes {
            settings.sleep_min_minutes = v;
        }
        if let Some(v) = self.sleep_max_minutes {
            settings.sleep_max_minutes = v;
        }
        match self.urls {
            Some(urls) if !urls.is_empty() => settings.urls = urls,
            _ => {}
        }
    }

    /// True if the patch touches the quota.
    pub fn changes_quota(&self) -> bool {
        self.daily_quota_min_gb.is_some()
    }
}

/// Shared handle to the configuration document.
#[derive(Clone)]
pub struct ConfigStore {
    config: Arc<RwLock<BlackholeConfig>>,
    persist_path: Arc<Option<PathBuf>>,
}

impl ConfigStore {
    /// A store that never touches the disk.
    pub fn in_memory(config: BlackholeConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            persist_path: Arc::new(None),
        }
    }

    /// A store that writes every update to `path`.
    pub fn with_persistence(path: PathBuf, config: BlackholeConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            persist_path: Arc::new(Some(path)),
        }
    }

    /// Current sink settings.
    pub fn get_config(&self) -> SinkSettings {
        self.read().sink.clone()
    }

    /// Merge `patch`, validate, persist. The in-memory copy only changes if
    /// the write succeeds.
    pub fn update_config(&self, patch: ConfigPatch) -> Result<SinkSettings, ConfigError> {
        let mut guard = self
            .config
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut next = guard.clone();
        patch.apply(&mut next.sink);
        next.sink.validate()?;

        if let Some(path) = self.persist_path.as_ref() {
            next.write_to(path)?;
            tracing::info!(path = %path.display(), "config saved");
        }

        *guard = next;
        Ok(guard.sink.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BlackholeConfig> {
        self.config
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
