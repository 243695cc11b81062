//! blackhole-ctl — command-line interface for the blackhole daemon.

mod cmd;

use anyhow::{Context, Result};

use cmd::{config, monitor, sink};

const DEFAULT_PORT: u16 = 8080;

fn print_usage() {
    println!("Usage: blackhole-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status                  Show sink state, usage and uptime");
    println!("  toggle                  Start the sink if stopped, stop it if running");
    println!("  start | stop            Toggle only if needed");
    println!("  speed [interface]       Current sink speed");
    println!("  history [month]         Per-day traffic for a month");
    println!("  logs [n]                Activity log, optionally the last n entries");
    println!("  config                  Show the sink configuration");
    println!("  config set k=v ...      Update configuration (urls=a,b,c)");
    println!("  interfaces              List monitored network interfaces");
    println!("  stats <interface>       Interface counters and rates");
    println!();
    println!("Options:");
    println!("  --port <port>   API port (default: {})", DEFAULT_PORT);
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T> {
    value
        .parse()
        .ok()
        .with_context(|| format!("{} must be a number", what))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args
                .get(i)
                .context("--port requires a value")?
                .parse()
                .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | [] => sink::cmd_status(port).await,
        ["toggle"] => sink::cmd_toggle(port).await,
        ["start"] => sink::cmd_set_running(port, true).await,
        ["stop"] => sink::cmd_set_running(port, false).await,
        ["speed"] => sink::cmd_speed(port, None).await,
        ["speed", iface] => sink::cmd_speed(port, Some(*iface)).await,
        ["history"] => sink::cmd_history(port, None).await,
        ["history", month] => sink::cmd_history(port, Some(parse_number(month, "month")?)).await,
        ["logs"] => sink::cmd_logs(port, None).await,
        ["logs", n] => sink::cmd_logs(port, Some(parse_number(n, "entry count")?)).await,
        ["config"] => config::cmd_config_show(port).await,
        ["config", "set", rest @ ..] => config::cmd_config_set(port, rest).await,
        ["interfaces"] => monitor::cmd_interfaces(port).await,
        ["stats", iface] => monitor::cmd_stats(port, iface).await,
        ["help"] | ["--help"] | ["-h"] => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
