//! Type definitions shared across the prober

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use crate::error::{AppError, Result};

/// Which measurements a run performs per target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    /// ICMP echo latency only
    #[default]
    Ping,
    /// Echo-protocol throughput only
    Speed,
    /// Latency followed by throughput
    Both,
}

impl TestType {
    pub fn includes_latency(&self) -> bool {
        matches!(self, Self::Ping | Self::Both)
    }

    pub fn includes_speed(&self) -> bool {
        matches!(self, Self::Speed | Self::Both)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Speed => "speed",
            Self::Both => "both",
        }
    }
}

impl FromStr for TestType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ping" | "latency" => Ok(Self::Ping),
            "speed" | "throughput" => Ok(Self::Speed),
            "both" | "all" => Ok(Self::Both),
            other => Err(AppError::parse(format!(
                "Invalid test type '{}': expected ping, speed or both",
                other
            ))),
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ranking key for the final result list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Ascending latency, unknown latency last
    #[default]
    Latency,
    /// Descending download throughput, unknown last
    Download,
    /// Descending upload throughput, unknown last
    Upload,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Latency => "latency",
            Self::Download => "download",
            Self::Upload => "upload",
        }
    }
}

impl FromStr for SortKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "latency" | "ping" => Ok(Self::Latency),
            "download" | "down" => Ok(Self::Download),
            "upload" | "up" => Ok(Self::Upload),
            other => Err(AppError::parse(format!(
                "Invalid sort key '{}': expected latency, download or upload",
                other
            ))),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relay protocol filter for inventory loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayProtocol {
    #[default]
    Any,
    WireGuard,
    OpenVpn,
}

impl RelayProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::WireGuard => "wireguard",
            Self::OpenVpn => "openvpn",
        }
    }
}

impl FromStr for RelayProtocol {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "any" | "both" | "all" => Ok(Self::Any),
            "wireguard" | "wg" => Ok(Self::WireGuard),
            "openvpn" | "ovpn" => Ok(Self::OpenVpn),
            other => Err(AppError::parse(format!(
                "Invalid protocol '{}': expected wireguard, openvpn or any",
                other
            ))),
        }
    }
}

impl fmt::Display for RelayProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latency classification used by the colored output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyLevel {
    /// Under 50 ms
    Excellent,
    /// 50 to 125 ms
    Good,
    /// 125 to 250 ms
    Fair,
    /// 250 ms or more
    Poor,
    /// No measurement
    Unknown,
}

impl LatencyLevel {
    pub fn from_latency(latency_ms: Option<f64>) -> Self {
        match latency_ms {
            None => Self::Unknown,
            Some(ms) if ms < 50.0 => Self::Excellent,
            Some(ms) if ms < 125.0 => Self::Good,
            Some(ms) if ms < 250.0 => Self::Fair,
            Some(_) => Self::Poor,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Unknown => "unknown",
        }
    }
}
