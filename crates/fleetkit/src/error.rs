//! Error types for fleet operations.
//!
//! [`Error`] covers everything that talks to the cloud provider or reads
//! policy documents. [`TransportError`] is kept separate: it describes why a
//! single host failed to run a command and always ends up inside that host's
//! [`CommandOutcome`](crate::types::CommandOutcome), never propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while listing or reconciling the fleet.
#[derive(Debug, Error)]
pub enum Error {
    /// An upstream provider call failed (listing, put, delete, set ports)
    #[error("{operation} failed: {message}")]
    Provider {
        /// Provider operation that failed, e.g. `get-instances`
        operation: String,
        /// Error text reported by the provider
        message: String,
    },

    /// A policy document exists but could not be read or parsed
    #[error("invalid policy document {}: {message}", .path.display())]
    PolicyLoad {
        /// Path of the offending document
        path: PathBuf,
        /// Parser or IO error text
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a provider failure.
    pub fn provider(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the provider API.
    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }
}

/// Result type for fleet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a single host failed to run a command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The server has no public address to connect to
    #[error("server has no public IP address")]
    NoAddress,

    /// The transport process could not be started
    #[error("could not start ssh: {0}")]
    Spawn(String),

    /// The command did not finish before the deadline
    #[error("timed out after {secs}s")]
    Timeout {
        /// Deadline that was exceeded
        secs: u64,
    },

    /// The remote command (or ssh itself) exited unsuccessfully
    #[error("exit status {}: {stderr}", .code.map_or_else(|| "signal".to_string(), |c| c.to_string()))]
    NonZeroExit {
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The SSH key could not be provisioned
    #[error("credentials unavailable: {0}")]
    Credentials(String),

    /// The worker panicked while running the command
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The worker stopped without reporting a result
    #[error("worker exited without reporting a result")]
    Lost,
}

impl TransportError {
    /// Stable short identifier for display and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoAddress => "no-address",
            Self::Spawn(_) => "spawn",
            Self::Timeout { .. } => "timeout",
            Self::NonZeroExit { .. } => "exit",
            Self::Credentials(_) => "credentials",
            Self::Panicked(_) => "panic",
            Self::Lost => "lost",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider("get-instances", "AccessDenied");
        assert_eq!(err.to_string(), "get-instances failed: AccessDenied");
        assert!(err.is_provider());
    }

    #[test]
    fn test_non_zero_exit_display() {
        let err = TransportError::NonZeroExit {
            code: Some(255),
            stderr: "Permission denied (publickey)".into(),
        };
        assert_eq!(err.to_string(), "exit status 255: Permission denied (publickey)");
        assert_eq!(err.kind(), "exit");

        let killed = TransportError::NonZeroExit {
            code: None,
            stderr: String::new(),
        };
        assert!(killed.to_string().starts_with("exit status signal"));
    }
}
