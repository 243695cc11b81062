use crate::*;

const GIB: u64 = 1024 * 1024 * 1024;

fn with_urls(urls: Vec<String>) -> BlackholeConfig {
    let mut config = BlackholeConfig::default();
    config.sink.urls = urls;
    config
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_engine_drains_local_http_body() -> Result<()> {
    let files = start_file_server().await?;
    let daemon = Daemon::start(with_urls(vec![format!("{files}/blob/3")]), None).await?;

    daemon.post("/downonly/toggle", None).await?;
    let status = daemon
        .wait_for_status(Duration::from_secs(20), |s| {
            s["today_bytes"].as_u64().unwrap_or(0) >= 3 * MIB as u64
        })
        .await?;
    assert_eq!(status["is_running"], true);
    assert!(status["download_count"].as_u64().unwrap() >= 3);

    let (_, logs) = daemon.get("/downonly/logs").await?;
    let finished = logs["entries"]
        .as_array()
        .context("entries is not an array")?
        .iter()
        .any(|e| e["msg"].as_str().is_some_and(|m| m.starts_with("download finished")));
    assert!(finished, "no completed download logged: {logs}");

    daemon.post("/downonly/toggle", None).await?;
    assert_eq!(daemon.sink.active_loops(), 0);
    daemon.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failing_url_is_retried_not_fatal() -> Result<()> {
    let files = start_file_server().await?;
    let daemon = Daemon::start(with_urls(vec![format!("{files}/broken")]), None).await?;

    daemon.post("/downonly/toggle", None).await?;
    tokio::time::sleep(Duration::from_millis(500)).await;

    let status = daemon.status().await?;
    assert_eq!(status["is_running"], true);
    assert_eq!(status["today_bytes"], 0);

    let (_, logs) = daemon.get("/downonly/logs").await?;
    let failures = logs["entries"]
        .as_array()
        .context("entries is not an array")?
        .iter()
        .filter(|e| e["msg"].as_str().is_some_and(|m| m.starts_with("download failed")))
        .count();
    assert!(failures >= 2, "expected repeated failures: {logs}");

    daemon.stop().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_quota_exceeded_stops_the_sink() -> Result<()> {
    let files = start_file_server().await?;
    let mut config = with_urls(vec![format!("{files}/blob/64")]);
    config.sink.daily_quota_min_gb = 1;
    let daemon = Daemon::start(config, None).await?;

    daemon.post("/downonly/toggle", None).await?;
    let status = daemon
        .wait_for_status(Duration::from_secs(180), |s| s["is_running"] == false)
        .await?;

    assert_eq!(status["status"], "quota_exceeded");
    assert_eq!(status["today_bytes"], GIB);
    assert_eq!(status["today_quota_bytes"], GIB);

    // Nothing is counted after the stop.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(daemon.status().await?["today_bytes"], GIB);
    assert_eq!(daemon.sink.active_loops(), 0);

    // Toggling again starts a fresh quota period.
    let (_, on) = daemon.post("/downonly/toggle", None).await?;
    assert_eq!(on["status"], "running");
    let fresh = daemon.status().await?["today_bytes"].as_u64().unwrap_or(u64::MAX);
    assert!(fresh < GIB, "usage was not reset: {fresh}");

    daemon.stop().await;
    Ok(())
}
