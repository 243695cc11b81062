//! Download engine — the loop that generates sink traffic.
//!
//! Each iteration picks a random URL, probes its length, streams the body
//! and throws it away, accounting it chunk by chunk through the sink
//! worker. Network errors never leave this module: they are logged and the
//! loop backs off. Every await races the run's stop signal.

use std::time::Duration;

use rand::Rng;
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};

use blackhole_core::units::{mbps, round2, KIB, MIB};

use crate::fetch::{Body, FetchError, Fetcher};
use crate::sink::{ChunkOutcome, Selection, SinkWorker};

const PROGRESS_EVERY: Duration = Duration::from_secs(2);

/// How one download ended without a network error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Finished { bytes: u64 },
    Abandoned { bytes: u64 },
}

/// Runs until the run is stopped. One instance per run.
pub(crate) async fn download_loop<F: Fetcher>(
    worker: SinkWorker<F>,
    run_id: u64,
    mut stop: broadcast::Receiver<()>,
) {
    let _guard = worker.enter_loop();
    tracing::debug!(run_id, "download loop started");

    loop {
        let pause = match worker.next_url(run_id) {
            Selection::Stale => break,
            Selection::Empty => {
                tracing::debug!("no download urls configured, waiting");
                Duration::from_millis(worker.engine().empty_wait_ms)
            }
            Selection::Url(url) => {
                let result = tokio::select! {
                    _ = stop.recv() => break,
                    r = download_once(&worker, run_id, &url) => r,
                };
                match result {
                    Ok(Completion::Finished { .. }) => rest(worker.engine()),
                    Ok(Completion::Abandoned { bytes }) => {
                        tracing::info!(url = %url, bytes, "download abandoned");
                        rest(worker.engine())
                    }
                    Err(e) => {
                        tracing::warn!(url = %url, error = %e, "download failed");
                        worker.log().push(format!("download failed: {url}: {e}"));
                        error_backoff(worker.engine())
                    }
                }
            }
        };

        tokio::select! {
            _ = stop.recv() => break,
            _ = tokio::time::sleep(pause) => {}
        }
    }

    tracing::debug!(run_id, "download loop exited");
}

/// Stream one URL to nowhere.
pub(crate) async fn download_once<F: Fetcher>(
    worker: &SinkWorker<F>,
    run_id: u64,
    url: &str,
) -> Result<Completion, FetchError> {
    let settings = worker.engine();
    let body_timeout = Duration::from_secs(settings.body_timeout_secs);
    let chunk_size = settings.chunk_size.max(1) as u64;

    let probed = match timeout(
        Duration::from_secs(settings.probe_timeout_secs),
        worker.fetcher().probe_length(url),
    )
    .await
    {
        Ok(Ok(Some(len))) if len > 0 => Some(len),
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            tracing::debug!(url = %url, error = %e, "length probe failed");
            None
        }
        Err(_) => {
            tracing::debug!(url = %url, "length probe timed out");
            None
        }
    };
    let estimate = probed.unwrap_or_else(|| estimate_size(url));

    let mut body = timeout(body_timeout, worker.fetcher().open(url))
        .await
        .map_err(|_| FetchError::Timeout)??;
    let expected = body.content_length().filter(|n| *n > 0).unwrap_or(estimate);

    tracing::info!(url = %url, expected_mib = expected / MIB, "download started");
    worker.log().push(format!(
        "download started: {url} ({:.1} MB)",
        expected as f64 / MIB as f64
    ));

    let started = Instant::now();
    let mut last_progress = started;
    let mut downloaded: u64 = 0;
    let mut pending: u64 = 0;

    loop {
        let read = timeout(body_timeout, body.next_chunk())
            .await
            .map_err(|_| FetchError::Timeout)
            .and_then(|r| r);
        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                // Bytes already received count even though the stream failed.
                if pending > 0 {
                    worker.record_chunk(run_id, pending);
                }
                return Err(e);
            }
        };
        pending += frame.len() as u64;
        drop(frame);

        while pending >= chunk_size {
            pending -= chunk_size;
            downloaded += chunk_size;
            if worker.record_chunk(run_id, chunk_size) == ChunkOutcome::Abandon {
                return Ok(Completion::Abandoned { bytes: downloaded });
            }
        }

        let now = Instant::now();
        if now.duration_since(last_progress) >= PROGRESS_EVERY {
            log_progress(url, downloaded, expected, now.duration_since(started));
            last_progress = now;
        }
    }

    if pending > 0 {
        downloaded += pending;
        if worker.record_chunk(run_id, pending) == ChunkOutcome::Abandon {
            return Ok(Completion::Abandoned { bytes: downloaded });
        }
    }

    let secs = started.elapsed().as_secs_f64();
    tracing::info!(
        url = %url,
        mib = downloaded / MIB,
        avg_mbps = mbps(downloaded, secs),
        "download finished"
    );
    worker.log().push(format!(
        "download finished: {:.1} MB, average {:.2} Mbps",
        downloaded as f64 / MIB as f64,
        mbps(downloaded, secs)
    ));
    Ok(Completion::Finished { bytes: downloaded })
}

fn log_progress(url: &str, downloaded: u64, expected: u64, elapsed: Duration) {
    let percent = if expected > 0 {
        downloaded as f64 / expected as f64 * 100.0
    } else {
        0.0
    };
    let secs = elapsed.as_secs_f64();
    let kib_per_sec = if secs > 0.0 {
        downloaded as f64 / KIB as f64 / secs
    } else {
        0.0
    };
    tracing::debug!(
        url = %url,
        downloaded_mib = downloaded / MIB,
        expected_mib = expected / MIB,
        percent = round2(percent),
        kib_per_sec = round2(kib_per_sec),
        "download progress"
    );
}

/// Plausible size for a resource whose length the server would not say.
/// Only used for progress reporting.
pub(crate) fn estimate_size(url: &str) -> u64 {
    let mut rng = rand::thread_rng();
    let mib = if url.contains("ubuntu") {
        rng.gen_range(500..=2000)
    } else if url.contains("centos") {
        rng.gen_range(4000..=8000)
    } else {
        rng.gen_range(100..=1000)
    };
    mib * MIB
}

fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

fn rest(settings: &blackhole_core::EngineSettings) -> Duration {
    jitter(settings.rest_min_ms, settings.rest_max_ms)
}

fn error_backoff(settings: &blackhole_core::EngineSettings) -> Duration {
    jitter(settings.error_backoff_min_ms, settings.error_backoff_max_ms)
}
