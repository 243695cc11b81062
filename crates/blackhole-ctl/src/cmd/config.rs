//! Config show / set commands.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::http::{base_url, get_json, post_json_body};

#[derive(Deserialize)]
struct SinkConfig {
    speed_limit_mbps: u32,
    daily_quota_min_gb: u64,
    daily_quota_max_gb: u64,
    schedule_start: String,
    schedule_end: String,
    sleep_min_minutes: u32,
    sleep_max_minutes: u32,
    urls: Vec<String>,
}

#[derive(Deserialize)]
struct UpdateResponse {
    ok: bool,
}

const NUMERIC_KEYS: &[&str] = &[
    "speed_limit_mbps",
    "daily_quota_min_gb",
    "daily_quota_max_gb",
    "sleep_min_minutes",
    "sleep_max_minutes",
];
const TEXT_KEYS: &[&str] = &["schedule_start", "schedule_end"];

/// Turn `key=value` arguments into a JSON patch. `urls` takes a
/// comma-separated list.
pub fn parse_assignments(args: &[&str]) -> Result<Map<String, Value>> {
    if args.is_empty() {
        bail!("expected at least one key=value");
    }
    let mut patch = Map::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("expected key=value, got '{}'", arg))?;
        let value = if NUMERIC_KEYS.contains(&key) {
            let n: u64 = value
                .parse()
                .with_context(|| format!("{} must be a non-negative integer", key))?;
            Value::from(n)
        } else if TEXT_KEYS.contains(&key) {
            Value::from(value)
        } else if key == "urls" {
            Value::from(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>(),
            )
        } else {
            bail!("unknown config key '{}'", key);
        };
        patch.insert(key.to_string(), value);
    }
    Ok(patch)
}

pub async fn cmd_config_show(port: u16) -> Result<()> {
    let cfg: SinkConfig = get_json(&format!("{}/downonly/config", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Sink Configuration");
    println!("═══════════════════════════════════════");
    println!("  Daily quota  : {} GB (max {} GB)", cfg.daily_quota_min_gb, cfg.daily_quota_max_gb);
    println!("  Speed limit  : {} Mbps", cfg.speed_limit_mbps);
    println!("  Schedule     : {} - {}", cfg.schedule_start, cfg.schedule_end);
    println!("  Sleep        : {}-{} min", cfg.sleep_min_minutes, cfg.sleep_max_minutes);
    if cfg.urls.is_empty() {
        println!("  URLs         : (none, sink idles)");
    } else {
        println!("  URLs ({}):", cfg.urls.len());
        for url in &cfg.urls {
            println!("    {}", url);
        }
    }
    Ok(())
}

pub async fn cmd_config_set(port: u16, args: &[&str]) -> Result<()> {
    let patch = parse_assignments(args)?;
    let resp: UpdateResponse =
        post_json_body(&format!("{}/downonly/config", base_url(port)), &patch).await?;
    if resp.ok {
        println!("Config updated: {}", args.join(" "));
    }
    Ok(())
}
