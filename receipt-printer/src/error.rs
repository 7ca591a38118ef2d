//! Error types for the printer library

use thiserror::Error;

/// Printer error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Could not reach the printer at all
    #[error("Connection failed: {0}")]
    Connection(String),

    /// IO error while streaming bytes
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Printer reported itself offline (paper out, cover open, queue disabled)
    #[error("Printer offline: {0}")]
    Offline(String),

    /// Timeout waiting for printer
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The spooler helper rejected the job
    #[error("Spooler error: {0}")]
    Spooler(String),
}

impl PrintError {
    /// Whether the failure means the device could not be reached,
    /// as opposed to the device misbehaving once reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            PrintError::Connection(_) | PrintError::Offline(_) | PrintError::Timeout(_)
        )
    }
}

/// Result type for printer operations
pub type PrintResult<T> = Result<T, PrintError>;
