//! Sink wire types — the JSON shapes the frontend polls.
//!
//! Field names are fixed by the frontend; do not rename.

use serde::{Deserialize, Serialize};

/// Reported state of the traffic sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkStatus {
    #[default]
    Stopped,
    Running,
    QuotaExceeded,
}

impl SinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkStatus::Stopped => "stopped",
            SinkStatus::Running => "running",
            SinkStatus::QuotaExceeded => "quota_exceeded",
        }
    }
}

// ── /status ───────────────────────────────────────────────────────────────────

/// Point-in-time copy of the sink state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub is_running: bool,
    pub status: SinkStatus,
    /// Smoothed rate, 0 when stopped.
    pub speed_mbps: f64,
    pub today_bytes: u64,
    pub today_quota_bytes: u64,
    pub today_quota_gb: u64,
    /// Accumulated uptime plus the live interval.
    pub uptime_seconds: u64,
    /// Chunks processed in the current run.
    pub download_count: u64,
}

// ── /toggle ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub is_running: bool,
    pub status: SinkStatus,
}

// ── /speed ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedResponse {
    pub interface: String,
    pub speed: f64,
    /// Local time of the reading, "YYYY-MM-DD HH:MM:SS".
    pub timestamp: String,
}

// ── /history ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryDay {
    pub day: u32,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub days: Vec<HistoryDay>,
}

// ── /logs ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// "HH:MM:SS", local time.
    pub time: String,
    pub msg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResponse {
    pub max_entries: usize,
    pub entries: Vec<LogEntry>,
}

// ── /monitor ──────────────────────────────────────────────────────────────────

/// Interface counters. Totals in MiB, rates in KiB/s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub interface: String,
    pub total_sent: f64,
    pub total_recv: f64,
    pub sent_rate: f64,
    pub recv_rate: f64,
}

/// Rate history in parallel arrays, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceHistory {
    pub timestamp: Vec<String>,
    pub sent: Vec<f64>,
    pub recv: Vec<f64>,
}
