//! Data models for targets, results and configuration

pub mod config;
pub mod result;
pub mod target;

// Re-export main model types
pub use config::Config;
pub use result::{ProbeResult, ProbeStatus, SpeedResult};
pub use target::{ProbeTarget, TargetLocation};
