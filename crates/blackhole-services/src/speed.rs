//! Smoothed download rate.
//!
//! Bytes are added as chunks arrive; the rate is recomputed at most once
//! per second from the bytes seen since the previous recompute. The speed
//! task also ticks the meter every second so the value decays to zero
//! between downloads.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use blackhole_core::units::mbps;

const WINDOW: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct SpeedMeter {
    window_bytes: u64,
    window_start: Instant,
    current: f64,
    history: VecDeque<f64>,
    history_len: usize,
    max_mbps: f64,
}

impl SpeedMeter {
    pub fn new(history_len: usize, max_mbps: f64) -> Self {
        Self {
            window_bytes: 0,
            window_start: Instant::now(),
            current: 0.0,
            history: VecDeque::with_capacity(history_len),
            history_len,
            max_mbps,
        }
    }

    /// Account `bytes` received at `now`.
    pub fn record(&mut self, bytes: u64, now: Instant) {
        self.window_bytes = self.window_bytes.saturating_add(bytes);
        self.recompute(now);
    }

    /// Periodic sample: recompute if due and append to the history.
    pub fn tick(&mut self, now: Instant) {
        self.recompute(now);
        if self.history_len == 0 {
            return;
        }
        if self.history.len() == self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(self.current);
    }

    /// Zero the rate and drop the history.
    pub fn reset(&mut self, now: Instant) {
        self.window_bytes = 0;
        self.window_start = now;
        self.current = 0.0;
        self.history.clear();
    }

    pub fn current(&self) -> f64 {
        self.current
    }

    pub fn history(&self) -> Vec<f64> {
        self.history.iter().copied().collect()
    }

    fn recompute(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < WINDOW {
            return false;
        }
        self.current = mbps(self.window_bytes, elapsed.as_secs_f64()).clamp(0.0, self.max_mbps);
        self.window_bytes = 0;
        self.window_start = now;
        true
    }
}
