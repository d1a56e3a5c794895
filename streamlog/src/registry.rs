use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use log::{debug, warn};
use streamlog_core::{
    ConsoleSink, FileSink, FileSpec, HostChannel, HostDebugSink, Result, Severity, Sink,
    SinkKind, SinkWriter,
};

/// Id of the stream used when no id is given.
pub const DEFAULT_STREAM: &str = "default";

struct StreamState {
    valid: bool,
    mirror_enabled: bool,
    mirror: Option<FileSink>,
}

/// A named, gated binding between a stream id and its sink.
pub struct Stream {
    kind: SinkKind,
    id: String,
    sink: Sink,
    files: FileSpec,
    state: Mutex<StreamState>,
    // held only across the primary and mirror emits of one line
    write: Mutex<()>,
}

impl Stream {
    fn new(id: &str, sink: Sink, files: FileSpec) -> Self {
        Self {
            kind: sink.kind(),
            id: id.to_string(),
            sink,
            files,
            state: Mutex::new(StreamState {
                valid: true,
                mirror_enabled: false,
                mirror: None,
            }),
            write: Mutex::new(()),
        }
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Kind of the primary sink, after any environment fallback.
    pub fn kind(&self) -> SinkKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_enabled(&self) -> bool {
        self.state().valid
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state().valid = enabled;
    }

    /// Whether emits are currently copied into a mirror file.
    pub fn is_mirrored(&self) -> bool {
        let state = self.state();
        state.mirror_enabled && state.mirror.is_some()
    }

    /// Path of the attached mirror file, if one was ever attached.
    pub fn mirror_path(&self) -> Option<std::path::PathBuf> {
        self.state().mirror.as_ref().map(|m| m.path().to_path_buf())
    }

    /// Turns file mirroring on or off. File streams never mirror; returns
    /// false when the request was ignored for that reason.
    pub fn set_mirror(&self, enable: bool) -> bool {
        if self.kind == SinkKind::File {
            self.state().mirror_enabled = false;
            debug!("stream '{}' already writes to a file, mirror ignored", self.id);
            return false;
        }
        let mut state = self.state();
        state.mirror_enabled = enable;
        if enable && state.mirror.is_none() {
            state.mirror = Some(self.files.sink_for(&self.id));
        }
        true
    }

    /// Emits the line produced by `render` to the primary sink and, when
    /// attached, the mirror. A disabled stream emits nothing and never calls
    /// `render`. Returns whether anything was written.
    ///
    /// `render` runs with no lock held, so it may log through this router
    /// again. The state is read before rendering; a toggle that races with
    /// this call applies from the next emit.
    pub fn emit<F: FnOnce() -> String>(&self, severity: Severity, render: F) -> Result<bool> {
        let mirror = {
            let state = self.state();
            if !state.valid {
                return Ok(false);
            }
            state.mirror.clone().filter(|_| state.mirror_enabled)
        };
        let line = render();
        let _write = self.write.lock().unwrap_or_else(|e| e.into_inner());
        self.sink.emit(&line, severity)?;
        if let Some(mirror) = mirror {
            mirror.emit(&line, severity)?;
        }
        Ok(true)
    }
}

/// Memoized map from (kind, id) to streams. Entries are never replaced or
/// removed.
pub struct StreamRegistry {
    files: FileSpec,
    console: ConsoleSink,
    host: Option<HostDebugSink>,
    streams: Mutex<HashMap<(SinkKind, String), Arc<Stream>>>,
}

impl StreamRegistry {
    pub fn new(
        files: FileSpec,
        console: ConsoleSink,
        host: Option<Arc<dyn HostChannel>>,
    ) -> Self {
        Self {
            files,
            console,
            host: host.map(HostDebugSink::new),
            streams: Mutex::new(HashMap::new()),
        }
    }

    fn streams(&self) -> MutexGuard<'_, HashMap<(SinkKind, String), Arc<Stream>>> {
        self.streams.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Host debug output needs an injected channel; the other kinds are
    /// always available.
    pub fn is_environment_suitable(&self, kind: SinkKind) -> bool {
        match kind {
            SinkKind::Console | SinkKind::File => true,
            SinkKind::HostDebug => self.host.is_some(),
        }
    }

    /// `kind` if usable here, otherwise [`SinkKind::File`].
    pub fn resolve_kind(&self, kind: SinkKind) -> SinkKind {
        if self.is_environment_suitable(kind) {
            kind
        } else {
            SinkKind::File
        }
    }

    fn new_sink(&self, kind: SinkKind, id: &str) -> Sink {
        match (self.resolve_kind(kind), &self.host) {
            (SinkKind::Console, _) => Sink::Console(self.console.clone()),
            (SinkKind::HostDebug, Some(host)) => Sink::HostDebug(host.clone()),
            _ => Sink::File(self.files.sink_for(id)),
        }
    }

    /// Returns the stream for `(kind, id)`, creating it on first use.
    pub fn get_or_create(&self, kind: SinkKind, id: &str) -> Arc<Stream> {
        let mut created = None;
        let stream = {
            let mut streams = self.streams();
            let stream = streams.entry((kind, id.to_string())).or_insert_with(|| {
                let sink = self.new_sink(kind, id);
                created = Some(sink.kind());
                Arc::new(Stream::new(id, sink, self.files.clone()))
            });
            Arc::clone(stream)
        };
        match created {
            Some(actual) if actual != kind => {
                warn!("stream '{id}': {kind} output unavailable, using {actual}")
            }
            Some(actual) => debug!("created {actual} stream '{id}'"),
            None => {}
        }
        stream
    }

    /// Looks up an existing stream without creating one.
    pub fn get(&self, kind: SinkKind, id: &str) -> Option<Arc<Stream>> {
        self.streams().get(&(kind, id.to_string())).cloned()
    }

    /// Visits every stream registered under `kind`, in no particular order.
    pub fn for_each<F: FnMut(&Arc<Stream>)>(&self, kind: SinkKind, mut visitor: F) {
        for ((stream_kind, _), stream) in self.streams().iter() {
            if *stream_kind == kind {
                visitor(stream);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.streams().len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams().is_empty()
    }
}
