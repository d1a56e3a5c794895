use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building a router or emitting a line.
#[derive(Debug, Error)]
pub enum StreamLogError {
    /// Opening, appending to or creating the directory of a log file failed.
    #[error("failed to write log file {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing to the console target failed.
    #[error("failed to write to console: {0}")]
    Console(#[source] std::io::Error),

    /// A sink kind name that does not match any known back-end.
    #[error("unknown sink kind '{0}' (expected console, file or host)")]
    UnknownSinkKind(String),

    /// Environment configuration could not be read.
    #[error("invalid streamlog configuration: {0}")]
    Config(String),

    /// The working directory needed to resolve the log folder is unavailable.
    #[error("cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    /// Another `log` backend was already installed.
    #[error("unable to install log facade bridge: {0}")]
    LoggerInstall(#[from] log::SetLoggerError),
}

pub type Result<T, E = StreamLogError> = std::result::Result<T, E>;
