//! Interface monitor commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

#[derive(Deserialize)]
struct InterfaceStats {
    interface: String,
    total_sent: f64,
    total_recv: f64,
    sent_rate: f64,
    recv_rate: f64,
}

pub async fn cmd_interfaces(port: u16) -> Result<()> {
    let names: Vec<String> = get_json(&format!("{}/monitor/interfaces", base_url(port))).await?;
    if names.is_empty() {
        println!("No interfaces found.");
        return Ok(());
    }
    for name in names {
        println!("{}", name);
    }
    Ok(())
}

pub async fn cmd_stats(port: u16, iface: &str) -> Result<()> {
    let s: InterfaceStats =
        get_json(&format!("{}/monitor/stats/{}", base_url(port), iface)).await?;

    println!("═══════════════════════════════════════");
    println!("  Interface {}", s.interface);
    println!("═══════════════════════════════════════");
    println!("  Sent     : {:.2} MB ({:.2} KB/s)", s.total_sent, s.sent_rate);
    println!("  Received : {:.2} MB ({:.2} KB/s)", s.total_recv, s.recv_rate);
    Ok(())
}
