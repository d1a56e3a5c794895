//! # streamlog
//! Leveled log router with named streams, per-stream gating and file mirroring.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! streamlog = "0.1.0"
//! ```
//!
//! ```rust
//! use streamlog::{router_config, InitStatus, SinkKind};
//!
//! let router = router_config().build().unwrap();
//! assert_eq!(router.init(SinkKind::Console), InitStatus::Ok);
//! router.info("Hello, world!").unwrap();
//! ```
//!
//! ## Streams and gating
//! Each stream id gets its own stream the first time it is written to.
//! Streams can be silenced one by one or all at once; the default stream is
//! never affected by the bulk calls.
//!
//! ```rust
//! use streamlog::{router_config, MirrorOverride, Severity, SinkKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let router = router_config()
//!     .with_log_dir(dir.path())
//!     .with_timestamps(false)
//!     .build()
//!     .unwrap();
//! router.init(SinkKind::File);
//!
//! router.write("connected", Some("net"), Severity::Info, MirrorOverride::Unchanged).unwrap();
//! router.disable_all();
//! router.write("dropped", Some("net"), Severity::Error, MirrorOverride::Unchanged).unwrap();
//! router.info("default stream still writes").unwrap();
//!
//! let net = std::fs::read_to_string(dir.path().join("net.txt")).unwrap();
//! assert_eq!(net, "[usual]  connected          \n");
//! ```
//!
//! ## Mirroring to files
//! A console or host stream can copy every line into `<log dir>/<id>.txt`.
//! The setting sticks until it is switched off again.
//!
//! ```rust
//! use streamlog::{router_config, MirrorOverride, Severity, SinkKind};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let router = router_config()
//!     .with_log_dir(dir.path())
//!     .build()
//!     .unwrap();
//! router.init(SinkKind::Console);
//! router.write("kept on disk too", Some("audit"), Severity::Warning, MirrorOverride::Enable).unwrap();
//! assert!(dir.path().join("audit.txt").exists());
//! ```
//!
//! ## Using the `log` macros
//! ```rust
//! use std::sync::Arc;
//! use streamlog::{router_config, SinkKind};
//!
//! let router = Arc::new(router_config().build().unwrap());
//! router.init(SinkKind::Console);
//! streamlog::install(Arc::clone(&router), log::LevelFilter::Info).unwrap();
//! log::info!("to the default stream");
//! log::warn!(target: "net", "to the 'net' stream");
//! ```

mod registry;
mod router;

use std::sync::Arc;

use log::{LevelFilter, Log};

pub use registry::{DEFAULT_STREAM, Stream, StreamRegistry};
pub use router::{InitStatus, LogRouter, MirrorOverride, RouterBuilder};
pub use streamlog_core::{
    ConsoleSink, FileSink, FileSpec, HostChannel, HostDebugSink, LogFacadeChannel,
    MessageFormatter, Result, Severity, Sink, SinkKind, SinkWriter, StreamLogConfig,
    StreamLogError,
};

/// Targets of the crate's own records, never routed back into a router.
const INTERNAL_TARGET: &str = "streamlog";

/// `log` backend forwarding records to a [`LogRouter`].
///
/// A record keeping the default target (its module path) goes to the default
/// stream; an explicit `target:` names the stream.
pub struct RouterLogger {
    router: Arc<LogRouter>,
    level: LevelFilter,
}

impl RouterLogger {
    pub fn new(router: Arc<LogRouter>, level: LevelFilter) -> Self {
        Self { router, level }
    }

    fn stream_of<'a>(record: &'a log::Record) -> Option<&'a str> {
        match record.module_path() {
            Some(path) if path == record.target() => None,
            _ => Some(record.target()),
        }
    }
}

impl Log for RouterLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level && !metadata.target().starts_with(INTERNAL_TARGET)
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        self.router
            .write(
                record.args(),
                Self::stream_of(record),
                record.level().into(),
                MirrorOverride::Unchanged,
            )
            .ok();
    }

    fn flush(&self) {}
}

/// Installs `router` as the global `log` backend.
pub fn install(router: Arc<LogRouter>, level: LevelFilter) -> Result<()> {
    log::set_boxed_logger(Box::new(RouterLogger::new(router, level)))?;
    log::set_max_level(level);
    Ok(())
}

/// Returns a default RouterBuilder for configuring a router.
pub fn router_config() -> RouterBuilder {
    RouterBuilder::default()
}
