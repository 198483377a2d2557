//! Per-target probe failures
//!
//! These never abort a run. The worker pool attaches them to the target's
//! result and keeps going.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ProbeError {
    #[error("target has no network address")]
    MissingAddress,

    #[error("ping command '{0}' not found")]
    CommandNotFound(String),

    #[error("host could not be resolved")]
    UnknownHost,

    #[error("all echo requests were lost")]
    PacketLoss,

    #[error("ping exited with status {}", .0.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    ExitStatus(Option<i32>),

    #[error("ping did not finish within {0}s")]
    ProcessTimeout(u64),

    #[error("ping output contained no average round-trip time")]
    Unparsable,

    #[error("no candidate port accepted a connection ({0})")]
    ConnectFailed(String),

    #[error("probe cancelled by stop request")]
    Cancelled,

    #[error("probe I/O failure: {0}")]
    Io(String),
}

impl ProbeError {
    /// Conditions that affect every target equally and are reported once per run.
    pub fn is_global(&self) -> bool {
        matches!(self, Self::CommandNotFound(_))
    }

    /// Short machine-friendly label used in tables and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::MissingAddress => "no-address",
            Self::CommandNotFound(_) => "no-ping",
            Self::UnknownHost => "unknown-host",
            Self::PacketLoss => "packet-loss",
            Self::ExitStatus(_) => "exit-status",
            Self::ProcessTimeout(_) => "timeout",
            Self::Unparsable => "unparsable",
            Self::ConnectFailed(_) => "connect-failed",
            Self::Cancelled => "cancelled",
            Self::Io(_) => "io",
        }
    }
}
