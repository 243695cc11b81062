pub mod activity;
pub mod clock;
mod engine;
pub mod fetch;
pub mod history;
pub mod monitor;
pub mod quota;
pub mod sink;
pub mod speed;

#[cfg(test)]
mod testing;

pub use activity::ActivityLog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use fetch::{Body, FetchError, Fetcher, HttpFetcher};
pub use history::{sink_history, HistoryError};
pub use monitor::{InterfaceMonitor, MonitorError};
pub use sink::SinkWorker;
