use std::{
    fmt,
    io::Write,
    str::FromStr,
    sync::{Arc, Mutex},
};

use colored::Colorize;

use crate::{
    error::{Result, StreamLogError},
    file_sink::FileSink,
    utils::Severity,
};

/// Back-end family used for newly created streams.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Console,
    File,
    HostDebug,
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SinkKind::Console => "console",
            SinkKind::File => "file",
            SinkKind::HostDebug => "host",
        };
        f.write_str(name)
    }
}

impl FromStr for SinkKind {
    type Err = StreamLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "stdout" => Ok(SinkKind::Console),
            "file" | "txt" => Ok(SinkKind::File),
            "host" | "host-debug" | "unity" => Ok(SinkKind::HostDebug),
            other => Err(StreamLogError::UnknownSinkKind(other.to_string())),
        }
    }
}

/// Anything that can take a rendered line.
pub trait SinkWriter {
    fn emit(&self, text: &str, severity: Severity) -> Result<()>;
}

/// Closed set of output back-ends.
pub enum Sink {
    Console(ConsoleSink),
    File(FileSink),
    HostDebug(HostDebugSink),
}

impl Sink {
    pub fn kind(&self) -> SinkKind {
        match self {
            Sink::Console(_) => SinkKind::Console,
            Sink::File(_) => SinkKind::File,
            Sink::HostDebug(_) => SinkKind::HostDebug,
        }
    }
}

impl SinkWriter for Sink {
    fn emit(&self, text: &str, severity: Severity) -> Result<()> {
        match self {
            Sink::Console(w) => w.emit(text, severity),
            Sink::File(w) => w.emit(text, severity),
            Sink::HostDebug(w) => w.emit(text, severity),
        }
    }
}

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// Writes lines to stdout, or to an injected writer.
///
/// Clones share the same target and lock, so lines from different streams
/// never interleave.
#[derive(Clone)]
pub struct ConsoleSink {
    out: SharedWriter,
    colorize: bool,
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::stdout()
    }
}

impl ConsoleSink {
    pub fn stdout() -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(std::io::stdout()))),
            colorize: true,
        }
    }

    /// Console sink writing plain lines into `writer`.
    pub fn with_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
            colorize: false,
        }
    }
}

impl SinkWriter for ConsoleSink {
    fn emit(&self, text: &str, severity: Severity) -> Result<()> {
        let line = if self.colorize {
            match severity {
                Severity::Info => text.normal(),
                Severity::Warning => text.yellow(),
                Severity::Error => text.red(),
            }
            .to_string()
        } else {
            text.to_string()
        };
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(out, "{line}").map_err(StreamLogError::Console)?;
        out.flush().map_err(StreamLogError::Console)
    }
}

/// Debug channel supplied by the embedding environment.
pub trait HostChannel: Send + Sync {
    fn info(&self, text: &str);
    fn warning(&self, text: &str);
    fn error(&self, text: &str);
}

/// Forwards lines to the host channel matching their severity.
#[derive(Clone)]
pub struct HostDebugSink {
    channel: Arc<dyn HostChannel>,
}

impl HostDebugSink {
    pub fn new(channel: Arc<dyn HostChannel>) -> Self {
        Self { channel }
    }
}

impl SinkWriter for HostDebugSink {
    fn emit(&self, text: &str, severity: Severity) -> Result<()> {
        match severity {
            Severity::Info => self.channel.info(text),
            Severity::Warning => self.channel.warning(text),
            Severity::Error => self.channel.error(text),
        }
        Ok(())
    }
}

/// Host channel backed by whatever `log` implementation the host installed.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFacadeChannel;

impl LogFacadeChannel {
    pub const TARGET: &'static str = "streamlog::host";
}

impl HostChannel for LogFacadeChannel {
    fn info(&self, text: &str) {
        log::info!(target: Self::TARGET, "{text}");
    }

    fn warning(&self, text: &str) {
        log::warn!(target: Self::TARGET, "{text}");
    }

    fn error(&self, text: &str) {
        log::error!(target: Self::TARGET, "{text}");
    }
}
