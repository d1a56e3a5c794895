//! # streamlog-core
//! Core sinks and formatting for streamlog - leveled multi-sink log routing.

mod config;
mod error;
mod file_sink;
mod sink;
mod utils;

pub use config::StreamLogConfig;
pub use error::{Result, StreamLogError};
pub use file_sink::{DEFAULT_EXTENSION, DEFAULT_LOG_FOLDER, FileSink, FileSpec};
pub use sink::{
    ConsoleSink, HostChannel, HostDebugSink, LogFacadeChannel, Sink, SinkKind, SinkWriter,
};
pub use utils::{MessageFormatter, Severity, TIMESTAMP_FORMAT};
