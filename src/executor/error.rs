//! Executor error types.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

/// Errors that can occur while running a batch of protocol commands.
#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    /// The munin binary is not available.
    #[error("munin binary not found at {0}")]
    ResourceMissing(PathBuf),

    /// Spawning, writing to, reading from or waiting on the child failed.
    #[error("I/O error: {0}")]
    IoFailure(#[from] std::io::Error),

    /// The child exited unsuccessfully.
    #[error("Exit value from munin is {status} instead of zero")]
    NonZeroExit {
        status: ExitStatus,
        /// Combined stdout and stderr, in the order they were written.
        output: String,
    },

    /// The child did not finish in time and was terminated.
    #[error("munin did not finish within {0:?}")]
    Timeout(Duration),

    /// The run was cancelled and the child was terminated.
    #[error("munin execution cancelled")]
    Cancelled,
}

impl ExecutionError {
    /// Create an `ExecutionError` from a spawn failure, classifying a missing
    /// binary separately.
    pub(crate) fn from_spawn(binary: &Path, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::ResourceMissing(binary.to_path_buf()),
            _ => Self::IoFailure(err),
        }
    }

    /// Captured output of a failed run, if any.
    #[must_use]
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::NonZeroExit { output, .. } => Some(output),
            _ => None,
        }
    }
}
