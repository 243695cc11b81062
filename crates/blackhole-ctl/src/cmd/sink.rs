//! Sink status, toggle, speed, history and logs commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json, post_json};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    is_running: bool,
    status: String,
    speed_mbps: f64,
    today_bytes: u64,
    today_quota_bytes: u64,
    uptime_seconds: u64,
    download_count: u64,
}

#[derive(Deserialize)]
struct ToggleResponse {
    is_running: bool,
    status: String,
}

#[derive(Deserialize)]
struct SpeedResponse {
    interface: String,
    speed: f64,
    timestamp: String,
}

#[derive(Deserialize)]
struct HistoryResponse {
    days: Vec<HistoryDay>,
}

#[derive(Deserialize)]
struct HistoryDay {
    day: u32,
    bytes: u64,
}

#[derive(Deserialize)]
struct LogsResponse {
    max_entries: usize,
    entries: Vec<LogEntry>,
}

#[derive(Deserialize)]
struct LogEntry {
    time: String,
    msg: String,
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn format_uptime(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn quota_percent(used: u64, quota: u64) -> f64 {
    if quota == 0 {
        return 0.0;
    }
    used as f64 / quota as f64 * 100.0
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/downonly/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Blackhole Sink Status");
    println!("═══════════════════════════════════════");
    println!("  State       : {}", resp.status);
    println!("  Running     : {}", if resp.is_running { "yes" } else { "no" });
    println!("  Speed       : {:.2} Mbps", resp.speed_mbps);
    println!(
        "  Today       : {:.2} / {:.0} GB ({:.1}%)",
        resp.today_bytes as f64 / GIB,
        resp.today_quota_bytes as f64 / GIB,
        quota_percent(resp.today_bytes, resp.today_quota_bytes)
    );
    println!("  Uptime      : {}", format_uptime(resp.uptime_seconds));
    println!("  Chunks      : {}", resp.download_count);

    Ok(())
}

pub async fn cmd_toggle(port: u16) -> Result<()> {
    let resp: ToggleResponse = post_json(&format!("{}/downonly/toggle", base_url(port))).await?;
    print_toggle(&resp);
    Ok(())
}

/// Toggle only if the sink is not already in the wanted state.
pub async fn cmd_set_running(port: u16, want_running: bool) -> Result<()> {
    let status: StatusResponse = get_json(&format!("{}/downonly/status", base_url(port))).await?;
    if status.is_running == want_running {
        println!("Sink already {}.", status.status);
        return Ok(());
    }
    cmd_toggle(port).await
}

fn print_toggle(resp: &ToggleResponse) {
    if resp.is_running {
        println!("Sink started.");
    } else {
        println!("Sink stopped ({}).", resp.status);
    }
}

pub async fn cmd_speed(port: u16, interface: Option<&str>) -> Result<()> {
    let mut url = format!("{}/downonly/speed", base_url(port));
    if let Some(iface) = interface {
        url.push_str(&format!("?interface={}", iface));
    }
    let resp: SpeedResponse = get_json(&url).await?;
    println!("{}  {}  {:.2} Mbps", resp.timestamp, resp.interface, resp.speed);
    Ok(())
}

pub async fn cmd_history(port: u16, month: Option<u32>) -> Result<()> {
    let mut url = format!("{}/downonly/history", base_url(port));
    if let Some(m) = month {
        url.push_str(&format!("?month={}", m));
    }
    let resp: HistoryResponse = get_json(&url).await?;

    let total: u64 = resp.days.iter().map(|d| d.bytes).sum();
    println!("═══════════════════════════════════════");
    println!("  Daily History ({} days, {:.1} GB)", resp.days.len(), total as f64 / GIB);
    println!("═══════════════════════════════════════");
    for d in &resp.days {
        println!("  {:>2}  {:>8.1} MB", d.day, d.bytes as f64 / MIB);
    }
    Ok(())
}

pub async fn cmd_logs(port: u16, tail: Option<usize>) -> Result<()> {
    let resp: LogsResponse = get_json(&format!("{}/downonly/logs", base_url(port))).await?;

    if resp.entries.is_empty() {
        println!("No activity yet (keeps up to {} entries).", resp.max_entries);
        return Ok(());
    }

    let skip = tail
        .map(|n| resp.entries.len().saturating_sub(n))
        .unwrap_or(0);
    for e in resp.entries.iter().skip(skip) {
        println!("[{}] {}", e.time, e.msg);
    }
    Ok(())
}
