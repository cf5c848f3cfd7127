use super::models::{ScanId, ScanStatus};
use crate::utils::time::format_duration;
use std::time::Duration;
use thiserror::Error;

/// Classified failure raised while validating, resolving or supervising a scan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanFault {
    #[error("invalid target or dangerous characters in target: {0}")]
    InvalidTarget(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("{tool} binary not found at {path}")]
    BinaryNotFound { tool: String, path: String },

    #[error("{tool} exceeded its timeout of {}", budget(.limit))]
    Timeout { tool: String, limit: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("{tool} execution failed: {message}")]
    Execution { tool: String, message: String },
}

fn budget(limit: &Duration) -> String {
    format_duration(*limit)
}

impl ScanFault {
    pub fn kind(&self) -> &'static str {
        match self {
            ScanFault::InvalidTarget(_) => "invalid_target",
            ScanFault::UnknownTool(_) => "unknown_tool",
            ScanFault::BinaryNotFound { .. } => "binary_not_found",
            ScanFault::Timeout { .. } => "timeout",
            ScanFault::Cancelled { .. } => "cancelled",
            ScanFault::Execution { .. } => "execution",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("scan {0} not found")]
    NotFound(ScanId),

    #[error("scan {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: ScanId,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Reasons a dispatch request is refused before the scan is queued or run.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("rejected: {0}")]
    Rejected(#[from] ScanFault),

    #[error("scan {0} not found")]
    ScanNotFound(ScanId),

    #[error("scan {id} is {status}, only pending scans can be dispatched")]
    NotPending { id: ScanId, status: ScanStatus },

    #[error("scan {id} was created for {expected}, not {requested}")]
    ToolMismatch {
        id: ScanId,
        expected: String,
        requested: String,
    },

    #[error("scan {0} is running in another process and cannot be signalled from here")]
    RunningElsewhere(ScanId),

    #[error("execution pool is shut down")]
    PoolClosed,

    #[error(transparent)]
    Store(#[from] StoreError),
}
