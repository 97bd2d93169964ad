use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Journal store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Clock never reached a plausible date on first boot")]
    ClockUnset,

    #[error("Uplink error: {0}")]
    Uplink(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to create or truncate slot file {path}: {source}")]
    Init {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to append to slot file {path}: {source}")]
    Append {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read slot file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32, delay: Duration },
    Ignore,
    Restart,
    Fatal,
}

impl AppError {
    /// How the supervisor should react to this error. The journal is the only
    /// record of captured data, so anything that makes it unreliable is fatal.
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        match self {
            AppError::Store(_) => RecoveryStrategy::Fatal,
            AppError::ClockUnset => RecoveryStrategy::Fatal,
            AppError::Config(_) => RecoveryStrategy::Fatal,
            // The transport reconnects on its own; the cycle's send is skipped,
            // never retried here.
            AppError::Uplink(_) => RecoveryStrategy::Ignore,
        }
    }
}
