//! Byte and rate unit helpers shared by the services and the API.

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Gigabytes (binary) to bytes, saturating.
pub fn gb_to_bytes(gb: u64) -> u64 {
    gb.saturating_mul(GIB)
}

/// Bytes to whole gigabytes, rounded down.
pub fn bytes_to_gb(bytes: u64) -> u64 {
    bytes / GIB
}

/// Megabits per second for `bytes` transferred over `secs`.
pub fn mbps(bytes: u64, secs: f64) -> f64 {
    if secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 / secs / MIB as f64 * 8.0
}

/// Round to two decimal places for display.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
