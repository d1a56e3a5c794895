use derive_from_env::FromEnv;

use crate::{
    error::{Result, StreamLogError},
    sink::SinkKind,
};

/// Settings read from `STREAMLOG_*` environment variables.
#[derive(FromEnv)]
#[from_env(prefix = "STREAMLOG")]
#[allow(non_snake_case)]
pub struct StreamLogConfig {
    #[from_env(default = "file")]
    pub SINK: String,
    #[from_env(default = "true")]
    pub TIMESTAMP: bool,
    #[from_env(default = "Log")]
    pub LOG_DIR: String,
    #[from_env(default = "txt")]
    pub EXTENSION: String,
}

impl StreamLogConfig {
    pub fn load() -> Result<Self> {
        Self::from_env().map_err(|err| StreamLogError::Config(format!("{err:?}")))
    }

    pub fn sink_kind(&self) -> Result<SinkKind> {
        self.SINK.parse()
    }
}
