//! Synthetic per-day sink history for the frontend's monthly chart.
//!
//! Nothing is recorded across days; the chart is filled with plausible
//! values so the page has something to draw.

use rand::Rng;

use blackhole_core::sink_types::{HistoryDay, HistoryResponse};
use blackhole_core::units::MIB;

pub const DEFAULT_MONTH: u32 = 2;
const DAYS: u32 = 28;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("month must be between 1 and 12, got {0}")]
    InvalidMonth(u32),
}

/// 28 days of 100–1000 MiB each.
pub fn sink_history(month: u32) -> Result<HistoryResponse, HistoryError> {
    sink_history_with(&mut rand::thread_rng(), month)
}

pub fn sink_history_with<R: Rng + ?Sized>(
    rng: &mut R,
    month: u32,
) -> Result<HistoryResponse, HistoryError> {
    if !(1..=12).contains(&month) {
        return Err(HistoryError::InvalidMonth(month));
    }
    let days = (1..=DAYS)
        .map(|day| HistoryDay {
            day,
            bytes: rng.gen_range(100..=1000) * MIB,
        })
        .collect();
    Ok(HistoryResponse { days })
}
