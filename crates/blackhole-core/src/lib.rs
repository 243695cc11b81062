//! blackhole-core — configuration, the config store, and the JSON types
//! shared by the daemon and the API.

pub mod config;
pub mod sink_types;
pub mod store;
pub mod units;

pub use config::{BlackholeConfig, ConfigError, EngineSettings, MonitorConfig, SinkSettings};
pub use sink_types::{SinkStatus, StatusSnapshot, ToggleResponse};
pub use store::{ConfigPatch, ConfigStore};
