use chrono::{DateTime, Local};
use log::Level;

/// Timestamp layout appended to rendered lines.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Severity of a routed message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Tag written between brackets at the start of each line.
    pub fn tag(self) -> &'static str {
        match self {
            Severity::Info => "usual",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Severity::Error,
            Level::Warn => Severity::Warning,
            Level::Info | Level::Debug | Level::Trace => Severity::Info,
        }
    }
}

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Info => Level::Info,
            Severity::Warning => Level::Warn,
            Severity::Error => Level::Error,
        }
    }
}

/// Renders a message body into a single output line.
#[derive(Clone, Copy, Debug)]
pub struct MessageFormatter {
    timestamps: bool,
}

impl Default for MessageFormatter {
    fn default() -> Self {
        Self { timestamps: true }
    }
}

impl MessageFormatter {
    pub fn new(timestamps: bool) -> Self {
        Self { timestamps }
    }

    /// Renders with the current local time, if timestamps are enabled.
    pub fn render(&self, body: &str, severity: Severity) -> String {
        let now = self.timestamps.then(Local::now);
        self.render_at(body, severity, now)
    }

    /// Renders with an explicit clock reading. `time` is ignored when
    /// timestamps are disabled.
    pub fn render_at(
        &self,
        body: &str,
        severity: Severity,
        time: Option<DateTime<Local>>,
    ) -> String {
        let tag = severity.tag();
        let time = match time {
            Some(time) if self.timestamps => time.format(TIMESTAMP_FORMAT).to_string(),
            _ => String::new(),
        };
        format!("[{tag}]  {body}          {time}")
    }
}
