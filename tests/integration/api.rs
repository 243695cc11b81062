use crate::*;

use serde_json::json;

#[tokio::test]
async fn test_status_reports_stopped_by_default() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    let status = daemon.status().await?;
    for key in [
        "is_running",
        "status",
        "speed_mbps",
        "today_bytes",
        "today_quota_bytes",
        "today_quota_gb",
        "uptime_seconds",
        "download_count",
    ] {
        assert!(status.get(key).is_some(), "missing {key}: {status}");
    }
    assert_eq!(status["is_running"], false);
    assert_eq!(status["status"], "stopped");
    assert_eq!(status["today_quota_gb"], 100);
    assert_eq!(status["today_bytes"], 0);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_toggle_round_trip() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    let (code, on) = daemon.post("/downonly/toggle", None).await?;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(on, json!({ "is_running": true, "status": "running" }));
    assert_eq!(daemon.status().await?["status"], "running");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let (_, off) = daemon.post("/downonly/toggle", None).await?;
    assert_eq!(off, json!({ "is_running": false, "status": "stopped" }));

    let status = daemon.status().await?;
    assert_eq!(status["is_running"], false);
    assert!(status["uptime_seconds"].as_u64().unwrap() >= 1);
    assert_eq!(status["speed_mbps"], 0.0);

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_config_update_persists_and_keeps_urls() -> Result<()> {
    let path = temp_config_path("config");
    let mut config = BlackholeConfig::default();
    config.sink.urls = vec!["http://127.0.0.1:9/never".to_string()];
    let daemon = Daemon::start(config, Some(path.clone())).await?;

    let (code, body) = daemon
        .post(
            "/downonly/config",
            Some(json!({ "daily_quota_min_gb": 5, "daily_quota_max_gb": 10, "urls": [] })),
        )
        .await?;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));

    let (_, cfg) = daemon.get("/downonly/config").await?;
    assert_eq!(cfg["daily_quota_min_gb"], 5);
    assert_eq!(cfg["schedule_start"], "00:00");
    assert_eq!(cfg["urls"], json!(["http://127.0.0.1:9/never"]));

    // The sink picked up the new quota without a restart.
    assert_eq!(daemon.status().await?["today_quota_gb"], 5);

    let on_disk = BlackholeConfig::load_from(&path)?;
    assert_eq!(on_disk.sink.daily_quota_min_gb, 5);
    assert_eq!(on_disk.sink.urls.len(), 1);

    daemon.stop().await;
    if let Some(dir) = path.parent() {
        let _ = std::fs::remove_dir_all(dir);
    }
    Ok(())
}

#[tokio::test]
async fn test_invalid_config_is_rejected() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    let (code, body) = daemon
        .post("/downonly/config", Some(json!({ "daily_quota_min_gb": 0 })))
        .await?;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string(), "no error message: {body}");

    let (code, _) = daemon
        .post("/downonly/config", Some(json!({ "schedule_end": "25:00" })))
        .await?;
    assert_eq!(code, StatusCode::BAD_REQUEST);

    let (_, cfg) = daemon.get("/downonly/config").await?;
    assert_eq!(cfg["daily_quota_min_gb"], 100);
    assert_eq!(cfg["schedule_end"], "23:59");

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_history_shape_and_month_validation() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    let (code, history) = daemon.get("/downonly/history").await?;
    assert_eq!(code, StatusCode::OK);
    let days = history["days"].as_array().context("days is not an array")?;
    assert_eq!(days.len(), 28);
    assert_eq!(days[0]["day"], 1);
    assert_eq!(days[27]["day"], 28);

    let (code, _) = daemon.get("/downonly/history?month=7").await?;
    assert_eq!(code, StatusCode::OK);

    let (code, body) = daemon.get("/downonly/history?month=13").await?;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_logs_record_sink_events() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    daemon.post("/downonly/toggle", None).await?;
    daemon.post("/downonly/toggle", None).await?;

    let (code, logs) = daemon.get("/downonly/logs").await?;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(logs["max_entries"], 500);
    let msgs: Vec<&str> = logs["entries"]
        .as_array()
        .context("entries is not an array")?
        .iter()
        .filter_map(|e| e["msg"].as_str())
        .collect();
    assert!(msgs.iter().any(|m| m.starts_with("sink started")), "{msgs:?}");
    assert!(msgs.contains(&"sink stopped"), "{msgs:?}");
    assert!(logs["entries"][0]["time"].as_str().is_some_and(|t| t.len() == 8));

    daemon.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_speed_and_monitor_endpoints() -> Result<()> {
    let daemon = Daemon::start(BlackholeConfig::default(), None).await?;

    let (code, speed) = daemon.get("/downonly/speed?interface=eth9").await?;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(speed["interface"], "eth9");
    assert_eq!(speed["speed"], 0.0);
    assert_eq!(speed["timestamp"].as_str().map(str::len), Some(19));

    let (code, interfaces) = daemon.get("/monitor/interfaces").await?;
    assert_eq!(code, StatusCode::OK);
    assert!(interfaces.is_array());

    let (code, body) = daemon.get("/monitor/stats/no-such-nic0").await?;
    assert_eq!(code, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (code, history) = daemon.get("/monitor/history/eth0").await?;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(history["timestamp"].as_array().map(Vec::len), Some(60));
    assert_eq!(history["recv"].as_array().map(Vec::len), Some(60));

    daemon.stop().await;
    Ok(())
}
