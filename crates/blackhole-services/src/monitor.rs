//! Interface monitor — per-interface byte counters and rates.
//!
//! Counters come from `sysinfo`. Rates are deltas against the previous
//! sample of the same interface, kept in a `DashMap` so concurrent requests
//! for different interfaces do not contend.

use std::net::IpAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::Local;
use dashmap::DashMap;
use rand::Rng;
use sysinfo::Networks;
use tokio::sync::broadcast;
use tokio::time::Instant;

use blackhole_core::sink_types::{InterfaceHistory, InterfaceStats};
use blackhole_core::units::{round2, KIB, MIB};
use blackhole_core::MonitorConfig;

const HISTORY_POINTS: i64 = 60;
const HISTORY_STEP_SECS: i64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("interface {0} not found")]
    NotFound(String),
}

/// One counter reading.
#[derive(Debug, Clone, Copy)]
struct Sample {
    sent: u64,
    recv: u64,
    at: Instant,
}

/// An interface as the OS reports it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub name: String,
    pub has_ipv4: bool,
}

#[derive(Clone)]
pub struct InterfaceMonitor {
    networks: Arc<Mutex<Networks>>,
    interfaces: Arc<RwLock<Vec<String>>>,
    samples: Arc<DashMap<String, Sample>>,
    exclude: Arc<Vec<String>>,
    refresh_every: Duration,
}

impl InterfaceMonitor {
    pub fn new(config: &MonitorConfig) -> Self {
        let monitor = Self {
            networks: Arc::new(Mutex::new(Networks::new_with_refreshed_list())),
            interfaces: Arc::new(RwLock::new(Vec::new())),
            samples: Arc::new(DashMap::new()),
            exclude: Arc::new(config.exclude_prefixes.clone()),
            refresh_every: Duration::from_secs(config.refresh_secs.max(1)),
        };
        monitor.refresh_interfaces();
        monitor
    }

    /// Re-enumerate interfaces.
    pub fn refresh_interfaces(&self) {
        let candidates: Vec<Candidate> = {
            let mut networks = self.networks.lock().unwrap_or_else(|p| p.into_inner());
            networks.refresh(true);
            networks
                .iter()
                .map(|(name, data)| Candidate {
                    name: name.clone(),
                    has_ipv4: data
                        .ip_networks()
                        .iter()
                        .any(|net| matches!(net.addr, IpAddr::V4(_))),
                })
                .collect()
        };
        let selected = select_interfaces(&candidates, &self.exclude);
        tracing::debug!(interfaces = ?selected, "interface list refreshed");
        *self.interfaces.write().unwrap_or_else(|p| p.into_inner()) = selected;
    }

    /// Monitored interface names, sorted.
    pub fn interfaces(&self) -> Vec<String> {
        self.interfaces
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// First monitored interface, used when a request names none.
    pub fn default_interface(&self) -> Option<String> {
        self.interfaces().into_iter().next()
    }

    /// Totals in MiB and rates in KiB/s since the previous call for `iface`.
    pub fn stats(&self, iface: &str) -> Result<InterfaceStats, MonitorError> {
        let (sent, recv) = {
            let mut networks = self.networks.lock().unwrap_or_else(|p| p.into_inner());
            networks.refresh(false);
            networks
                .iter()
                .find(|(name, _)| name.as_str() == iface)
                .map(|(_, data)| (data.total_transmitted(), data.total_received()))
                .ok_or_else(|| MonitorError::NotFound(iface.to_string()))?
        };

        let current = Sample {
            sent,
            recv,
            at: Instant::now(),
        };
        let previous = self.samples.insert(iface.to_string(), current);
        let (sent_rate, recv_rate) = rates(previous, current);

        Ok(InterfaceStats {
            interface: iface.to_string(),
            total_sent: round2(sent as f64 / MIB as f64),
            total_recv: round2(recv as f64 / MIB as f64),
            sent_rate: round2(sent_rate),
            recv_rate: round2(recv_rate),
        })
    }

    /// Synthetic rate history for the chart.
    pub fn history(&self, _iface: &str) -> InterfaceHistory {
        synthetic_history(&mut rand::thread_rng())
    }

    /// Re-enumerate interfaces periodically until shutdown.
    pub async fn refresh_loop(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.refresh_every);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::debug!("interface monitor stopped");
                    return;
                }
                _ = interval.tick() => self.refresh_interfaces(),
            }
        }
    }
}

/// Interfaces with an IPv4 address, minus loopback and excluded prefixes.
/// Falls back to every non-loopback interface when nothing qualifies.
pub fn select_interfaces(candidates: &[Candidate], exclude: &[String]) -> Vec<String> {
    let usable = |c: &&Candidate| c.name != "lo";
    let mut selected: Vec<String> = candidates
        .iter()
        .filter(usable)
        .filter(|c| c.has_ipv4)
        .filter(|c| !exclude.iter().any(|p| c.name.starts_with(p.as_str())))
        .map(|c| c.name.clone())
        .collect();
    if selected.is_empty() {
        selected = candidates.iter().filter(usable).map(|c| c.name.clone()).collect();
    }
    selected.sort();
    selected
}

/// KiB/s sent and received between two samples. Zero without a previous
/// sample or when the counters went backwards.
fn rates(previous: Option<Sample>, current: Sample) -> (f64, f64) {
    let Some(prev) = previous else {
        return (0.0, 0.0);
    };
    let secs = current.at.saturating_duration_since(prev.at).as_secs_f64();
    if secs <= 0.0 {
        return (0.0, 0.0);
    }
    let per_sec = |now: u64, before: u64| now.saturating_sub(before) as f64 / KIB as f64 / secs;
    (per_sec(current.sent, prev.sent), per_sec(current.recv, prev.recv))
}

fn synthetic_history<R: Rng + ?Sized>(rng: &mut R) -> InterfaceHistory {
    let now = Local::now();
    let mut history = InterfaceHistory {
        timestamp: Vec::with_capacity(HISTORY_POINTS as usize),
        sent: Vec::with_capacity(HISTORY_POINTS as usize),
        recv: Vec::with_capacity(HISTORY_POINTS as usize),
    };
    for i in (0..HISTORY_POINTS).rev() {
        let at = now - chrono::Duration::seconds(i * HISTORY_STEP_SECS);
        history.timestamp.push(at.format("%H:%M:%S").to_string());
        history.sent.push(round2(rng.gen_range(5.0..=50.0)));
        history.recv.push(round2(rng.gen_range(10.0..=80.0)));
    }
    history
}
