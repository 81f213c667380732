//! Error types for linecardchk

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Line card check errors
#[derive(Error, Debug)]
pub enum LinecardError {
    /// Module enumeration failed; no snapshot can be built
    #[error("Module enumeration failed: {0}")]
    Enumeration(String),

    /// Counter query for a single module could not be completed
    #[error("Query failed for module {module}: {message}")]
    QueryFailure {
        /// Module slot that failed.
        module: String,
        /// Error message.
        message: String,
    },

    /// Persisted state exists but cannot be decoded
    #[error("Corrupt state file {}: {message}", path.display())]
    CorruptState {
        /// State file that failed to decode.
        path: PathBuf,
        /// Decoder message.
        message: String,
    },

    /// Another run holds the state lock
    #[error("State file {} is locked by another run", path.display())]
    StateLocked {
        /// Lock file path.
        path: PathBuf,
    },

    /// Reading or writing the state file failed
    #[error("State file {}: {source}", path.display())]
    StateIo {
        /// State file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Appending to the history log failed
    #[error("History log {}: {source}", path.display())]
    LogAppend {
        /// History log path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Alert could not be delivered to the sink
    #[error("Alert delivery failed: {0}")]
    AlertDelivery(String),

    /// Failed to execute a shell command (spawn error)
    #[error("Failed to execute shell command '{command}': {source}")]
    ShellExec {
        /// The command that failed to execute.
        command: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// Shell command returned non-zero exit code
    #[error("Shell command failed: '{command}' (exit code {exit_code}): {output}")]
    ShellCommandFailed {
        /// The command that failed.
        command: String,
        /// The exit code.
        exit_code: i32,
        /// Combined stdout/stderr output.
        output: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Device output could not be interpreted
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LinecardError {
    /// Creates a query failure for one module.
    pub fn query_failure(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::QueryFailure {
            module: module.into(),
            message: message.into(),
        }
    }

    /// Creates a corrupt state error.
    pub fn corrupt_state(path: &Path, message: impl Into<String>) -> Self {
        Self::CorruptState {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates a state IO error.
    pub fn state_io(path: &Path, source: io::Error) -> Self {
        Self::StateIo {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for linecardchk operations
pub type Result<T> = std::result::Result<T, LinecardError>;
