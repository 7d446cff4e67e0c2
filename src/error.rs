//! Error types for the watch source and the test runner.

use std::path::PathBuf;

use thiserror::Error;

/// Failures setting up the watch. Only ever fatal at startup.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The root to watch is missing or is not a directory.
    #[error("watch root {} is not a directory", .0.display())]
    MissingRoot(PathBuf),

    /// The OS watcher refused to register the path.
    #[error("failed to watch {}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// Creating the OS watcher failed.
    #[error("failed to create file watcher: {0}")]
    Init(#[from] notify::Error),
}

/// The runner process could not be started or talked to. Terminal for one run only.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("runner io error: {0}")]
    Io(#[from] std::io::Error),
}
