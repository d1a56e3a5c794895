use std::{
    fmt::Display,
    io::Write,
    path::PathBuf,
    sync::{Arc, OnceLock},
};

use log::{debug, trace, warn};
use streamlog_core::{
    ConsoleSink, DEFAULT_EXTENSION, DEFAULT_LOG_FOLDER, FileSpec, HostChannel, MessageFormatter,
    Result, Severity, SinkKind, StreamLogConfig, StreamLogError,
};

use crate::registry::{DEFAULT_STREAM, Stream, StreamRegistry};

/// Outcome of [`LogRouter::init`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStatus {
    Ok,
    /// The router was already initialized; nothing changed.
    AlreadyInitialized,
    /// The requested kind is unavailable here; file output was selected.
    EnvironmentUnsupported,
}

/// Per-write change to a stream's file mirror. Changes persist for later
/// writes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MirrorOverride {
    #[default]
    Unchanged,
    Enable,
    Disable,
}

/// Builder for a [`LogRouter`].
pub struct RouterBuilder {
    log_dir: Option<PathBuf>,
    extension: String,
    timestamps: bool,
    console: Option<ConsoleSink>,
    host: Option<Arc<dyn HostChannel>>,
    sink: SinkKind,
}

impl Default for RouterBuilder {
    fn default() -> Self {
        Self {
            log_dir: None,
            extension: DEFAULT_EXTENSION.into(),
            timestamps: true,
            console: None,
            host: None,
            sink: SinkKind::File,
        }
    }
}

impl RouterBuilder {
    /// Folder holding per-stream files. Relative paths are resolved against
    /// the working directory at build time. Defaults to `Log`.
    pub fn with_log_dir<P: Into<PathBuf>>(self, dir: P) -> Self {
        Self {
            log_dir: Some(dir.into()),
            ..self
        }
    }
    /// Extension of per-stream files, `txt` by default.
    pub fn with_extension(self, extension: &str) -> Self {
        Self {
            extension: extension.into(),
            ..self
        }
    }
    /// Append the local time to each line.
    pub fn with_timestamps(self, yes: bool) -> Self {
        Self {
            timestamps: yes,
            ..self
        }
    }
    /// Send console output to `writer` instead of stdout.
    pub fn with_console_writer<W: Write + Send + 'static>(self, writer: W) -> Self {
        Self {
            console: Some(ConsoleSink::with_writer(writer)),
            ..self
        }
    }
    /// Provide the host debug channel, making [`SinkKind::HostDebug`] usable.
    pub fn with_host_channel(self, channel: Arc<dyn HostChannel>) -> Self {
        Self {
            host: Some(channel),
            ..self
        }
    }
    /// Sink kind used by [`LogRouter::init_configured`].
    pub fn with_sink(self, sink: SinkKind) -> Self {
        Self { sink, ..self }
    }
    /// Applies `STREAMLOG_SINK`, `STREAMLOG_TIMESTAMP`, `STREAMLOG_LOG_DIR`
    /// and `STREAMLOG_EXTENSION`.
    pub fn from_env(self) -> Result<Self> {
        let config = StreamLogConfig::load()?;
        Ok(Self {
            sink: config.sink_kind()?,
            timestamps: config.TIMESTAMP,
            log_dir: Some(PathBuf::from(&config.LOG_DIR)),
            extension: config.EXTENSION,
            ..self
        })
    }

    pub fn build(self) -> Result<LogRouter> {
        let Self {
            log_dir,
            extension,
            timestamps,
            console,
            host,
            sink,
        } = self;
        let log_dir = log_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FOLDER));
        let folder = if log_dir.is_absolute() {
            log_dir
        } else {
            std::env::current_dir()
                .map_err(StreamLogError::CurrentDir)?
                .join(log_dir)
        };
        let registry = StreamRegistry::new(
            FileSpec::new(folder, &extension),
            console.unwrap_or_default(),
            host,
        );
        Ok(LogRouter {
            registry,
            formatter: MessageFormatter::new(timestamps),
            configured: sink,
            active: OnceLock::new(),
        })
    }
}

struct Active {
    kind: SinkKind,
    default: Arc<Stream>,
}

/// Routes messages to named streams over the sink kind chosen at init.
pub struct LogRouter {
    registry: StreamRegistry,
    formatter: MessageFormatter,
    configured: SinkKind,
    active: OnceLock<Active>,
}

impl LogRouter {
    /// Selects the sink kind and creates the default stream. Only the first
    /// call has any effect.
    pub fn init(&self, kind: SinkKind) -> InitStatus {
        let mut status = InitStatus::AlreadyInitialized;
        self.active.get_or_init(|| {
            let active = self.registry.resolve_kind(kind);
            status = if active == kind {
                InitStatus::Ok
            } else {
                InitStatus::EnvironmentUnsupported
            };
            Active {
                kind: active,
                default: self.registry.get_or_create(active, DEFAULT_STREAM),
            }
        });
        match status {
            InitStatus::Ok => debug!("router initialized with {kind} output"),
            InitStatus::EnvironmentUnsupported => {
                warn!("{kind} output unavailable, router falls back to file output")
            }
            InitStatus::AlreadyInitialized => debug!("router already initialized"),
        }
        status
    }

    /// [`init`](Self::init) with the kind from the builder or environment.
    pub fn init_configured(&self) -> InitStatus {
        self.init(self.configured)
    }

    pub fn is_environment_suitable(&self, kind: SinkKind) -> bool {
        self.registry.is_environment_suitable(kind)
    }

    pub fn active_kind(&self) -> Option<SinkKind> {
        self.active.get().map(|a| a.kind)
    }

    pub fn default_stream(&self) -> Option<Arc<Stream>> {
        self.active.get().map(|a| Arc::clone(&a.default))
    }

    /// Existing stream under the active kind; never creates one.
    pub fn stream(&self, id: &str) -> Option<Arc<Stream>> {
        let active = self.active.get()?;
        self.registry.get(active.kind, id)
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    /// Writes `message` to `stream` (the default stream when `None`).
    ///
    /// File names are derived from the stream id with path separators and
    /// `..` flattened, so every file stays inside the log folder.
    ///
    /// The mirror override is applied before gating, so it sticks even when
    /// the stream is disabled. A disabled stream drops the message on both
    /// its sink and its mirror. Before [`init`](Self::init) this is a no-op.
    pub fn write<M: Display>(
        &self,
        message: M,
        stream: Option<&str>,
        severity: Severity,
        mirror: MirrorOverride,
    ) -> Result<()> {
        let Some(active) = self.active.get() else {
            trace!("router not initialized, message dropped");
            return Ok(());
        };
        let target = match stream {
            None => Arc::clone(&active.default),
            Some(id) => self.registry.get_or_create(active.kind, id),
        };
        match mirror {
            MirrorOverride::Unchanged => {}
            MirrorOverride::Enable => {
                target.set_mirror(true);
            }
            MirrorOverride::Disable => {
                target.set_mirror(false);
            }
        }
        let written = target.emit(severity, || {
            self.formatter.render(&message.to_string(), severity)
        })?;
        if !written {
            trace!("stream '{}' disabled, message dropped", target.id());
        }
        Ok(())
    }

    pub fn info<M: Display>(&self, message: M) -> Result<()> {
        self.write(message, None, Severity::Info, MirrorOverride::Unchanged)
    }

    pub fn warning<M: Display>(&self, message: M) -> Result<()> {
        self.write(message, None, Severity::Warning, MirrorOverride::Unchanged)
    }

    pub fn error<M: Display>(&self, message: M) -> Result<()> {
        self.write(message, None, Severity::Error, MirrorOverride::Unchanged)
    }

    fn turn(&self, id: &str, enabled: bool) {
        match self.stream(id) {
            Some(stream) => stream.set_enabled(enabled),
            None => debug!("no stream '{id}' to toggle"),
        }
    }

    fn turn_all(&self, enabled: bool) {
        let Some(active) = self.active.get() else {
            return;
        };
        self.registry.for_each(active.kind, |stream| {
            if stream.id() != DEFAULT_STREAM {
                stream.set_enabled(enabled);
            }
        });
    }

    /// Disables the stream `id`. Unlike the bulk calls, this also silences
    /// the default stream when given [`DEFAULT_STREAM`].
    pub fn disable(&self, id: &str) {
        self.turn(id, false);
    }

    pub fn enable(&self, id: &str) {
        self.turn(id, true);
    }

    /// Disables every stream except the default one.
    pub fn disable_all(&self) {
        self.turn_all(false);
    }

    /// Enables every stream except the default one, which bulk operations
    /// never touch.
    pub fn enable_all(&self) {
        self.turn_all(true);
    }
}

#[cfg(test)]
mod tests {
    use std::{
        fs,
        sync::{Mutex, mpsc},
    };

    use super::*;

    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Capture {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().unwrap().clone())
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    struct HostRecorder(mpsc::Sender<(Severity, String)>);

    impl HostChannel for HostRecorder {
        fn info(&self, text: &str) {
            self.0.send((Severity::Info, text.into())).unwrap();
        }
        fn warning(&self, text: &str) {
            self.0.send((Severity::Warning, text.into())).unwrap();
        }
        fn error(&self, text: &str) {
            self.0.send((Severity::Error, text.into())).unwrap();
        }
    }

    fn console_router(dir: &std::path::Path) -> (LogRouter, Capture) {
        let capture = Capture::default();
        let router = RouterBuilder::default()
            .with_log_dir(dir.join("Log"))
            .with_timestamps(false)
            .with_console_writer(capture.clone())
            .build()
            .unwrap();
        assert_eq!(router.init(SinkKind::Console), InitStatus::Ok);
        (router, capture)
    }

    fn last_line(path: PathBuf) -> String {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .last()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_init_is_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = console_router(dir.path());
        let default = router.default_stream().unwrap();
        assert_eq!(router.init(SinkKind::File), InitStatus::AlreadyInitialized);
        assert_eq!(router.active_kind(), Some(SinkKind::Console));
        assert!(Arc::ptr_eq(&default, &router.default_stream().unwrap()));
        assert_eq!(router.registry().len(), 1);
    }

    #[test]
    fn test_write_before_init_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let capture = Capture::default();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path())
            .with_console_writer(capture.clone())
            .build()
            .unwrap();
        router.info("early").unwrap();
        router
            .write("early", Some("x"), Severity::Error, MirrorOverride::Enable)
            .unwrap();
        router.disable_all();
        assert!(router.active_kind().is_none());
        assert!(router.registry().is_empty());
        assert!(capture.lines().is_empty());
    }

    #[test]
    fn test_host_debug_without_channel_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path().join("Log"))
            .with_timestamps(false)
            .build()
            .unwrap();
        assert!(!router.is_environment_suitable(SinkKind::HostDebug));
        assert_eq!(
            router.init(SinkKind::HostDebug),
            InitStatus::EnvironmentUnsupported
        );
        assert_eq!(router.active_kind(), Some(SinkKind::File));
        router.info("fallback").unwrap();
        assert_eq!(
            last_line(dir.path().join("Log/default.txt")),
            "[usual]  fallback          "
        );
    }

    #[test]
    fn test_host_debug_routes_by_severity() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path())
            .with_timestamps(false)
            .with_host_channel(Arc::new(HostRecorder(tx)))
            .build()
            .unwrap();
        assert!(router.is_environment_suitable(SinkKind::HostDebug));
        assert_eq!(router.init(SinkKind::HostDebug), InitStatus::Ok);
        router.warning("careful").unwrap();
        router
            .write("bad", Some("ui"), Severity::Error, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![
                (Severity::Warning, "[warning]  careful          ".to_string()),
                (Severity::Error, "[error]  bad          ".to_string()),
            ]
        );
    }

    #[test]
    fn test_same_id_returns_same_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = console_router(dir.path());
        router.info("a").unwrap();
        router
            .write("b", Some("net"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        let first = router.stream("net").unwrap();
        router
            .write("c", Some("net"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert!(Arc::ptr_eq(&first, &router.stream("net").unwrap()));
        let default = router.stream(DEFAULT_STREAM).unwrap();
        assert!(Arc::ptr_eq(&default, &router.default_stream().unwrap()));
    }

    #[test]
    fn test_disable_and_enable_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (router, capture) = console_router(dir.path());
        router
            .write("first", Some("x"), Severity::Info, MirrorOverride::Enable)
            .unwrap();
        router.disable("x");
        router
            .write("hidden", Some("x"), Severity::Error, MirrorOverride::Unchanged)
            .unwrap();
        router.enable("x");
        router
            .write("again", Some("x"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(
            capture.lines(),
            vec!["[usual]  first          ", "[usual]  again          "]
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("Log/x.txt")).unwrap(),
            "[usual]  first          \n[usual]  again          \n"
        );
    }

    #[test]
    fn test_disable_unknown_stream_does_not_create_it() {
        let dir = tempfile::tempdir().unwrap();
        let (router, _) = console_router(dir.path());
        router.disable("ghost");
        assert!(router.stream("ghost").is_none());
        router
            .write("boo", Some("ghost"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert!(router.stream("ghost").unwrap().is_enabled());
    }

    #[test]
    fn test_disable_default_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let (router, capture) = console_router(dir.path());
        router.info("before").unwrap();
        router.disable(DEFAULT_STREAM);
        router.info("muted").unwrap();
        router
            .write("other", Some("x"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router.enable_all();
        router.info("still muted").unwrap();
        router.enable(DEFAULT_STREAM);
        router.info("after").unwrap();
        assert_eq!(
            capture.lines(),
            vec![
                "[usual]  before          ",
                "[usual]  other          ",
                "[usual]  after          ",
            ]
        );
    }

    #[test]
    fn test_disable_all_spares_default_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (router, capture) = console_router(dir.path());
        router
            .write("a1", Some("a"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router
            .write("b1", Some("b"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router.disable_all();
        router
            .write("a2", Some("a"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router
            .write("b2", Some("b"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router.info("still here").unwrap();
        router.enable_all();
        router
            .write("b3", Some("b"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(
            capture.lines(),
            vec![
                "[usual]  a1          ",
                "[usual]  b1          ",
                "[usual]  still here          ",
                "[usual]  b3          ",
            ]
        );
    }

    #[test]
    fn test_file_stream_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path().join("Log"))
            .with_timestamps(false)
            .build()
            .unwrap();
        assert_eq!(router.init(SinkKind::File), InitStatus::Ok);
        router
            .write("hello", Some("s1"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(
            last_line(dir.path().join("Log/s1.txt")),
            "[usual]  hello          "
        );
    }

    #[test]
    fn test_file_stream_round_trip_with_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path().join("Log"))
            .build()
            .unwrap();
        router.init(SinkKind::File);
        router
            .write("hello", Some("s1"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        let line = last_line(dir.path().join("Log/s1.txt"));
        let stamp = line.strip_prefix("[usual]  hello          ").unwrap();
        assert!(
            chrono::NaiveDateTime::parse_from_str(stamp, streamlog_core::TIMESTAMP_FORMAT)
                .is_ok()
        );
    }

    #[test]
    fn test_mirror_on_console_stream_duplicates_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let (router, capture) = console_router(dir.path());
        router
            .write("twice", Some("m"), Severity::Warning, MirrorOverride::Enable)
            .unwrap();
        assert_eq!(capture.lines(), vec!["[warning]  twice          "]);
        assert_eq!(
            fs::read_to_string(dir.path().join("Log/m.txt")).unwrap(),
            "[warning]  twice          \n"
        );

        // sticky until explicitly disabled
        router
            .write("sticky", Some("m"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router
            .write("console only", Some("m"), Severity::Info, MirrorOverride::Disable)
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("Log/m.txt")).unwrap(),
            "[warning]  twice          \n[usual]  sticky          \n"
        );
        assert_eq!(capture.lines().len(), 3);
    }

    #[test]
    fn test_mirror_on_file_stream_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path().join("Log"))
            .with_timestamps(false)
            .build()
            .unwrap();
        router.init(SinkKind::File);
        router
            .write("once", Some("f"), Severity::Info, MirrorOverride::Enable)
            .unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("Log/f.txt")).unwrap(),
            "[usual]  once          \n"
        );
        assert!(!router.stream("f").unwrap().is_mirrored());
    }

    #[test]
    fn test_mirror_override_sticks_on_disabled_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (router, capture) = console_router(dir.path());
        router
            .write("on", Some("d"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router.disable("d");
        router
            .write("off", Some("d"), Severity::Info, MirrorOverride::Enable)
            .unwrap();
        assert!(!dir.path().join("Log/d.txt").exists());
        router.enable("d");
        router
            .write("back", Some("d"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(capture.lines().len(), 2);
        assert_eq!(
            fs::read_to_string(dir.path().join("Log/d.txt")).unwrap(),
            "[usual]  back          \n"
        );
    }

    #[test]
    fn test_file_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("Log");
        fs::write(&blocker, "not a folder").unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(&blocker)
            .build()
            .unwrap();
        router.init(SinkKind::File);
        assert!(matches!(
            router.info("lost"),
            Err(StreamLogError::File { .. })
        ));
    }

    #[test]
    fn test_init_configured_uses_builder_sink() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path())
            .with_console_writer(Capture::default())
            .with_sink(SinkKind::Console)
            .build()
            .unwrap();
        assert_eq!(router.init_configured(), InitStatus::Ok);
        assert_eq!(router.active_kind(), Some(SinkKind::Console));
    }

    #[test]
    fn test_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path())
            .with_extension("log")
            .with_timestamps(false)
            .build()
            .unwrap();
        router.init(SinkKind::File);
        router
            .write("x", Some("ext"), Severity::Error, MirrorOverride::Unchanged)
            .unwrap();
        assert_eq!(
            last_line(dir.path().join("ext.log")),
            "[error]  x          "
        );
    }

    #[test]
    fn test_stream_id_cannot_leave_log_folder() {
        let dir = tempfile::tempdir().unwrap();
        let router = RouterBuilder::default()
            .with_log_dir(dir.path().join("Log"))
            .with_timestamps(false)
            .build()
            .unwrap();
        router.init(SinkKind::File);
        router
            .write("up", Some("../escaped"), Severity::Info, MirrorOverride::Unchanged)
            .unwrap();
        router
            .write("deep", Some("a/b"), Severity::Info, MirrorOverride::Enable)
            .unwrap();
        assert!(!dir.path().join("escaped.txt").exists());
        let names: Vec<_> = fs::read_dir(dir.path().join("Log"))
            .unwrap()
            .map(|entry| entry.unwrap())
            .inspect(|entry| assert!(entry.file_type().unwrap().is_file()))
            .map(|entry| entry.file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|name| !name.contains("..")));
    }

    #[test]
    fn test_concurrent_writers_share_one_stream() {
        let dir = tempfile::tempdir().unwrap();
        let router = Arc::new(
            RouterBuilder::default()
                .with_log_dir(dir.path())
                .with_timestamps(false)
                .build()
                .unwrap(),
        );
        router.init(SinkKind::File);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let router = Arc::clone(&router);
                std::thread::spawn(move || {
                    for j in 0..25 {
                        router
                            .write(
                                format!("t{i}-{j}"),
                                Some("shared"),
                                Severity::Info,
                                MirrorOverride::Unchanged,
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(router.registry().len(), 2);
        let content = fs::read_to_string(dir.path().join("shared.txt")).unwrap();
        assert_eq!(content.lines().count(), 100);
        assert!(content.lines().all(|l| l.starts_with("[usual]  t")));
    }
}
