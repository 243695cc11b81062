//! Quota tracker — bytes consumed in the current calendar day against a
//! daily limit.
//!
//! The tracker is passive: it never stops anything itself. The sink worker
//! asks it after every chunk and on every status read.

use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct QuotaTracker {
    period: NaiveDate,
    used: u64,
    limit: u64,
}

impl QuotaTracker {
    /// A tracker for the period starting `today`. A zero limit is raised to 1.
    pub fn new(limit: u64, today: NaiveDate) -> Self {
        Self {
            period: today,
            used: 0,
            limit: limit.max(1),
        }
    }

    /// Start a new period if the calendar day changed. Returns true on reset.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        if today == self.period {
            return false;
        }
        self.period = today;
        self.used = 0;
        true
    }

    /// Restart the period at `today` with nothing used.
    pub fn reset(&mut self, today: NaiveDate) {
        self.period = today;
        self.used = 0;
    }

    pub fn add(&mut self, bytes: u64) -> u64 {
        self.used = self.used.saturating_add(bytes);
        self.used
    }

    /// Change the limit. Takes effect at the next check; `used` is kept.
    /// Returns false and leaves the limit alone for zero.
    pub fn set_limit(&mut self, limit: u64) -> bool {
        if limit == 0 {
            return false;
        }
        self.limit = limit;
        true
    }

    pub fn exceeded(&self) -> bool {
        self.used >= self.limit
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn period(&self) -> NaiveDate {
        self.period
    }
}
