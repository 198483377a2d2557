//! Relay Probe
//!
//! Concurrently measures latency (OS ping) and approximate throughput (a
//! stop-and-wait TCP echo exchange) across a list of candidate endpoints,
//! under live pause/resume/stop control, and returns a ranked result set.

pub mod aggregator;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod logging;
pub mod models;
pub mod output;
pub mod probe;
pub mod types;

// Re-export commonly used types
pub use error::{AppError, ProbeError, Result};
pub use executor::{ControlSignals, RunCallbacks, RunControl, RunReport, WorkerPool};
pub use models::{Config, ProbeResult, ProbeStatus, ProbeTarget, SpeedResult, TargetLocation};
pub use probe::{LatencyProber, NetworkProber, ProbeParams, SpeedProber, SpeedSettings, TargetProber};
pub use types::{RelayProtocol, SortKey, TestType};

/// Application version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    pub const DEFAULT_MAX_WORKERS: usize = 15;
    pub const DEFAULT_PING_COUNT: u32 = 3;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    /// Added to the ping timeout so the utility can flush its summary
    pub const PROCESS_TIMEOUT_GRACE: Duration = Duration::from_secs(2);
    pub const DEFAULT_PING_COMMAND: &str = "ping";

    pub const DEFAULT_SPEED_DURATION: Duration = Duration::from_secs(5);
    pub const DEFAULT_CHUNK_SIZE: usize = 8192;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_millis(2000);
    /// HTTPS, HTTP, alternate HTTP, WireGuard
    pub const DEFAULT_SPEED_PORTS: &[u16] = &[443, 80, 8080, 51820];

    /// Elapsed time at or below this is too short for a throughput figure
    pub const MIN_THROUGHPUT_WINDOW: Duration = Duration::from_millis(10);

    pub const DEFAULT_ENABLE_COLOR: bool = true;
}
