//! Sink worker — the traffic sink controller.
//!
//! Owns the run state and the counters, spawns one download loop and one
//! speed task per run, and enforces the daily quota.
//!
//! Locking: all counters live behind one `std::sync::Mutex` that is never
//! held across an await. Transitions (start/stop/toggle) are additionally
//! serialised by an async mutex so a start can wait for the previous run's
//! tasks to exit before spawning new ones. Every run gets a fresh id; tasks
//! of an older run treat an id mismatch as a stop.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use blackhole_core::units::{bytes_to_gb, round2};
use blackhole_core::{
    ConfigStore, EngineSettings, SinkSettings, SinkStatus, StatusSnapshot, ToggleResponse,
};

use crate::activity::ActivityLog;
use crate::clock::Clock;
use crate::engine;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::quota::QuotaTracker;
use crate::speed::SpeedMeter;

/// What the engine should do after accounting a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    Continue,
    /// The run ended (stop, quota, or superseded). Drop the stream.
    Abandon,
}

/// Next download target for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Url(String),
    Empty,
    /// The run this task belongs to is over.
    Stale,
}

struct ActiveRun {
    id: u64,
    started_at: Instant,
    stop_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

struct SinkState {
    run: Option<ActiveRun>,
    next_run_id: u64,
    /// Reported while stopped.
    last_stop: SinkStatus,
    accumulated_uptime: Duration,
    quota: QuotaTracker,
    speed: SpeedMeter,
    download_count: u64,
    total_bytes: u64,
    urls: Vec<String>,
    /// Tasks of finished runs not yet joined.
    retired: Vec<JoinHandle<()>>,
}

impl SinkState {
    fn is_current(&self, run_id: u64) -> bool {
        self.run.as_ref().is_some_and(|r| r.id == run_id)
    }

    fn uptime(&self, now: Instant) -> Duration {
        let live = self
            .run
            .as_ref()
            .map(|r| now.saturating_duration_since(r.started_at))
            .unwrap_or_default();
        self.accumulated_uptime + live
    }
}

struct Inner<F> {
    state: Mutex<SinkState>,
    transition: tokio::sync::Mutex<()>,
    config: ConfigStore,
    fetcher: F,
    engine: EngineSettings,
    clock: Arc<dyn Clock>,
    log: ActivityLog,
    active_loops: Arc<AtomicUsize>,
    peak_loops: AtomicUsize,
}

/// Handle to the traffic sink. Cheap to clone.
pub struct SinkWorker<F: Fetcher = HttpFetcher> {
    inner: Arc<Inner<F>>,
}

impl<F: Fetcher> Clone for SinkWorker<F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Decrements the live-loop counter when a download loop exits.
pub(crate) struct LoopGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<F: Fetcher> SinkWorker<F> {
    /// A stopped worker with quota and URLs taken from `config`.
    pub fn new(
        config: ConfigStore,
        fetcher: F,
        engine: EngineSettings,
        clock: Arc<dyn Clock>,
        log: ActivityLog,
    ) -> Self {
        let settings = config.get_config();
        let today = clock.today();
        let state = SinkState {
            run: None,
            next_run_id: 1,
            last_stop: SinkStatus::Stopped,
            accumulated_uptime: Duration::ZERO,
            quota: QuotaTracker::new(settings.daily_quota_bytes(), today),
            speed: SpeedMeter::new(engine.speed_history_len, engine.max_display_mbps),
            download_count: 0,
            total_bytes: 0,
            urls: settings.urls,
            retired: Vec::new(),
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                transition: tokio::sync::Mutex::new(()),
                config,
                fetcher,
                engine,
                clock,
                log,
                active_loops: Arc::new(AtomicUsize::new(0)),
                peak_loops: AtomicUsize::new(0),
            }),
        }
    }

    // ── Transitions ──────────────────────────────────────────────────────────

    /// Flip the run state.
    pub async fn toggle(&self) -> ToggleResponse {
        let _transition = self.inner.transition.lock().await;
        let running = self.lock().run.is_some();
        if running {
            self.stop_now(SinkStatus::Stopped).await
        } else {
            self.start_now().await
        }
    }

    /// Start if stopped; otherwise report the current state.
    pub async fn start(&self) -> ToggleResponse {
        let _transition = self.inner.transition.lock().await;
        if self.lock().run.is_some() {
            return self.toggle_response();
        }
        self.start_now().await
    }

    /// Stop if running; otherwise report the current state.
    pub async fn stop(&self) -> ToggleResponse {
        let _transition = self.inner.transition.lock().await;
        self.stop_now(SinkStatus::Stopped).await
    }

    /// Stop and wait for every task this worker ever spawned to exit.
    pub async fn shutdown(&self) {
        let _transition = self.inner.transition.lock().await;
        self.stop_now(SinkStatus::Stopped).await;
        let retired = std::mem::take(&mut self.lock().retired);
        join_all(retired).await;
        tracing::info!("sink worker shut down");
    }

    async fn start_now(&self) -> ToggleResponse {
        let settings = self.inner.config.get_config();

        // Tasks of the previous run were signalled when it stopped; wait for
        // them so two download loops never overlap.
        let retired = std::mem::take(&mut self.lock().retired);
        join_all(retired).await;

        let today = self.inner.clock.today();
        let now = Instant::now();
        let mut st = self.lock();

        let quota = settings.daily_quota_bytes();
        st.urls = settings.urls;
        if !st.quota.set_limit(quota) {
            tracing::warn!("configured quota is zero, keeping previous quota");
        }
        st.quota.reset(today);
        st.download_count = 0;
        st.total_bytes = 0;
        st.speed.reset(now);

        let id = st.next_run_id;
        st.next_run_id += 1;

        let (stop_tx, _) = broadcast::channel(1);
        let download = tokio::spawn(engine::download_loop(
            self.clone(),
            id,
            stop_tx.subscribe(),
        ));
        let speed = tokio::spawn(speed_loop(self.clone(), id, stop_tx.subscribe()));

        st.run = Some(ActiveRun {
            id,
            started_at: now,
            stop_tx,
            tasks: vec![download, speed],
        });

        tracing::info!(
            run_id = id,
            urls = st.urls.len(),
            quota_bytes = st.quota.limit(),
            "sink started"
        );
        self.inner
            .log
            .push(format!("sink started with {} url(s)", st.urls.len()));

        ToggleResponse {
            is_running: true,
            status: SinkStatus::Running,
        }
    }

    async fn stop_now(&self, reason: SinkStatus) -> ToggleResponse {
        let retired = {
            let mut st = self.lock();
            if !self.stop_locked(&mut st, reason) {
                return ToggleResponse {
                    is_running: false,
                    status: st.last_stop,
                };
            }
            std::mem::take(&mut st.retired)
        };
        join_all(retired).await;
        ToggleResponse {
            is_running: false,
            status: reason,
        }
    }

    /// Running → Stopped under the state lock. Signals the run's tasks but
    /// does not wait for them. Returns false if nothing was running.
    fn stop_locked(&self, st: &mut SinkState, reason: SinkStatus) -> bool {
        let Some(run) = st.run.take() else {
            return false;
        };
        let interval = Instant::now().saturating_duration_since(run.started_at);
        st.accumulated_uptime += interval;
        st.last_stop = reason;
        st.speed.reset(Instant::now());
        let _ = run.stop_tx.send(());
        st.retired.extend(run.tasks);

        tracing::info!(
            run_id = run.id,
            reason = reason.as_str(),
            interval_secs = interval.as_secs(),
            today_bytes = st.quota.used(),
            "sink stopped"
        );
        match reason {
            SinkStatus::QuotaExceeded => self
                .inner
                .log
                .push("daily quota reached, sink stopped automatically"),
            _ => self.inner.log.push("sink stopped"),
        }
        true
    }

    // ── Status ───────────────────────────────────────────────────────────────

    /// Consistent snapshot of the sink.
    ///
    /// Side effects: starts a new quota period on a calendar day change, and
    /// stops the sink with `quota_exceeded` when today's usage has reached
    /// the quota.
    pub fn status(&self) -> StatusSnapshot {
        let today = self.inner.clock.today();
        let mut st = self.lock();
        self.roll_over_locked(&mut st, today);
        if st.run.is_some() && st.quota.exceeded() {
            self.stop_locked(&mut st, SinkStatus::QuotaExceeded);
        }

        let now = Instant::now();
        let running = st.run.is_some();
        StatusSnapshot {
            is_running: running,
            status: if running {
                SinkStatus::Running
            } else {
                st.last_stop
            },
            speed_mbps: if running {
                round2(st.speed.current())
            } else {
                0.0
            },
            today_bytes: st.quota.used(),
            today_quota_bytes: st.quota.limit(),
            today_quota_gb: bytes_to_gb(st.quota.limit()),
            uptime_seconds: st.uptime(now).as_secs(),
            download_count: st.download_count,
        }
    }

    /// Current smoothed speed and the recent samples, oldest first.
    pub fn speed(&self) -> (f64, Vec<f64>) {
        let st = self.lock();
        if st.run.is_none() {
            return (0.0, st.speed.history());
        }
        (round2(st.speed.current()), st.speed.history())
    }

    pub fn is_running(&self) -> bool {
        self.lock().run.is_some()
    }

    /// Bytes discarded in the current run.
    pub fn total_bytes(&self) -> u64 {
        self.lock().total_bytes
    }

    /// Download loops alive right now.
    pub fn active_loops(&self) -> usize {
        self.inner.active_loops.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously alive download loops ever seen.
    pub fn peak_loops(&self) -> usize {
        self.inner.peak_loops.load(Ordering::SeqCst)
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.inner.log
    }

    // ── Config ───────────────────────────────────────────────────────────────

    /// Change the daily quota. Today's usage is kept; the next check uses the
    /// new limit. Zero is ignored.
    pub fn update_quota(&self, gigabytes: u64) {
        let bytes = blackhole_core::units::gb_to_bytes(gigabytes);
        if !self.lock().quota.set_limit(bytes) {
            tracing::warn!(gigabytes, "ignoring zero daily quota");
            return;
        }
        tracing::info!(gigabytes, "daily quota updated");
        self.inner
            .log
            .push(format!("daily quota set to {gigabytes} GB"));
    }

    /// Replace the candidate URL list. An in-flight download keeps going;
    /// the next selection uses the new list.
    pub fn refresh_urls(&self, urls: Vec<String>) {
        let count = urls.len();
        self.lock().urls = urls;
        tracing::info!(count, "url list refreshed");
        self.inner.log.push(format!("url list refreshed: {count} url(s)"));
    }

    /// Pick up a changed config document. The quota is only touched when
    /// the update changed it.
    pub fn apply_config(&self, settings: &SinkSettings, quota_changed: bool) {
        self.refresh_urls(settings.urls.clone());
        if quota_changed {
            self.update_quota(settings.daily_quota_min_gb);
        }
    }

    // ── Engine hooks ─────────────────────────────────────────────────────────

    pub(crate) fn engine(&self) -> &EngineSettings {
        &self.inner.engine
    }

    pub(crate) fn fetcher(&self) -> &F {
        &self.inner.fetcher
    }

    pub(crate) fn enter_loop(&self) -> LoopGuard {
        let now = self.inner.active_loops.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.peak_loops.fetch_max(now, Ordering::SeqCst);
        LoopGuard {
            active: self.inner.active_loops.clone(),
        }
    }

    /// Choose the next URL uniformly at random.
    pub(crate) fn next_url(&self, run_id: u64) -> Selection {
        let st = self.lock();
        if !st.is_current(run_id) {
            return Selection::Stale;
        }
        match st.urls.choose(&mut rand::thread_rng()) {
            Some(url) => Selection::Url(url.clone()),
            None => Selection::Empty,
        }
    }

    /// Account one processed chunk. Counters move together under one lock;
    /// the quota is checked after the chunk is counted.
    pub(crate) fn record_chunk(&self, run_id: u64, len: u64) -> ChunkOutcome {
        let today = self.inner.clock.today();
        let mut st = self.lock();
        if !st.is_current(run_id) {
            return ChunkOutcome::Abandon;
        }
        self.roll_over_locked(&mut st, today);

        st.quota.add(len);
        st.total_bytes = st.total_bytes.saturating_add(len);
        st.download_count += 1;
        st.speed.record(len, Instant::now());

        if st.quota.exceeded() {
            self.stop_locked(&mut st, SinkStatus::QuotaExceeded);
            return ChunkOutcome::Abandon;
        }
        ChunkOutcome::Continue
    }

    /// Speed task tick. Returns false once the run is over.
    pub(crate) fn sample_speed(&self, run_id: u64) -> bool {
        let mut st = self.lock();
        if !st.is_current(run_id) {
            return false;
        }
        st.speed.tick(Instant::now());
        true
    }

    pub(crate) fn log(&self) -> &ActivityLog {
        &self.inner.log
    }

    #[cfg(test)]
    pub(crate) fn set_quota_bytes(&self, bytes: u64) {
        self.lock().quota.set_limit(bytes);
    }

    fn roll_over_locked(&self, st: &mut SinkState, today: chrono::NaiveDate) {
        let previous = st.quota.period();
        if st.quota.roll_over(today) {
            // A quota stop belongs to the period that just ended.
            if st.run.is_none() && st.last_stop == SinkStatus::QuotaExceeded {
                st.last_stop = SinkStatus::Stopped;
            }
            tracing::info!(%previous, %today, "new quota period");
            self.inner.log.push(format!("new quota period {today}"));
        }
    }

    fn toggle_response(&self) -> ToggleResponse {
        let st = self.lock();
        match st.run {
            Some(_) => ToggleResponse {
                is_running: true,
                status: SinkStatus::Running,
            },
            None => ToggleResponse {
                is_running: false,
                status: st.last_stop,
            },
        }
    }

    fn lock(&self) -> MutexGuard<'_, SinkState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "sink task failed");
        }
    }
}

/// Recomputes the smoothed speed once a second, independent of chunk arrival.
async fn speed_loop<F: Fetcher>(
    worker: SinkWorker<F>,
    run_id: u64,
    mut stop: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = stop.recv() => return,
            _ = interval.tick() => {
                if !worker.sample_speed(run_id) {
                    return;
                }
            }
        }
    }
}
