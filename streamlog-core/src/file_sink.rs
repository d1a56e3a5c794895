use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{
    error::{Result, StreamLogError},
    sink::SinkWriter,
    utils::Severity,
};

pub const DEFAULT_LOG_FOLDER: &str = "Log";
pub const DEFAULT_EXTENSION: &str = "txt";

/// Where per-stream log files live: `<folder>/<stream id>.<extension>`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSpec {
    pub folder: PathBuf,
    pub extension: String,
}

impl FileSpec {
    pub fn new<P: Into<PathBuf>>(folder: P, extension: &str) -> Self {
        Self {
            folder: folder.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// `<cwd>/Log` with the `txt` extension.
    pub fn in_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(StreamLogError::CurrentDir)?;
        Ok(Self::new(cwd.join(DEFAULT_LOG_FOLDER), DEFAULT_EXTENSION))
    }

    /// File for stream `id`. Separators and `..` in the id are replaced by
    /// `_`, so the result is always a direct child of `folder`.
    pub fn path_for(&self, id: &str) -> PathBuf {
        let stem: String = id
            .chars()
            .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
            .collect();
        let stem = stem.replace("..", "__");
        self.folder.join(format!("{stem}.{}", self.extension))
    }

    pub fn sink_for(&self, id: &str) -> FileSink {
        FileSink::new(self.path_for(id))
    }
}

/// Appends lines to one file, opening and closing it on every emit.
#[derive(Clone, Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, text: &str) -> std::io::Result<()> {
        if let Some(folder) = self.path.parent()
            && !folder.as_os_str().is_empty()
        {
            fs::create_dir_all(folder)?;
        }
        let mut file = File::options().create(true).append(true).open(&self.path)?;
        // whole line in a single append
        file.write_all(format!("{text}\n").as_bytes())?;
        file.flush()
    }
}

impl SinkWriter for FileSink {
    fn emit(&self, text: &str, _severity: Severity) -> Result<()> {
        self.append(text).map_err(|source| StreamLogError::File {
            path: self.path.clone(),
            source,
        })
    }
}
