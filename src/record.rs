use chrono::{DateTime, Duration, FixedOffset, Local, LocalResult, NaiveDateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::error::Error;
use std::fmt;

/// Severity of a [`LogRecord`], ordered from least to most severe.
///
/// `None` sorts above everything else, so a logger whose minimum level is
/// `None` is effectively switched off.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Information,
    Warning,
    Error,
    Critical,
    None,
}

impl LogLevel {
    /// Four-letter tag used in rendered text lines.
    pub fn tag(self) -> &'static str {
        match self {
            LogLevel::Trace => "TRCE",
            LogLevel::Debug => "DBUG",
            LogLevel::Information => "INFO",
            LogLevel::Warning => "WARN",
            LogLevel::Error => "FAIL",
            LogLevel::Critical => "CRIT",
            LogLevel::None => "NONE",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "Trace",
            LogLevel::Debug => "Debug",
            LogLevel::Information => "Information",
            LogLevel::Warning => "Warning",
            LogLevel::Error => "Error",
            LogLevel::Critical => "Critical",
            LogLevel::None => "None",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    /// Accepts the wire names case-insensitively, plus the usual short forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" | "trce" => Ok(LogLevel::Trace),
            "debug" | "dbug" => Ok(LogLevel::Debug),
            "information" | "info" => Ok(LogLevel::Information),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "error" | "fail" => Ok(LogLevel::Error),
            "critical" | "crit" => Ok(LogLevel::Critical),
            "none" => Ok(LogLevel::None),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Serialized as the exact wire name; deserialized through [`FromStr`](std::str::FromStr),
/// so configuration files accept the same spellings as the environment.
impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl From<tracing::Level> for LogLevel {
    fn from(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => LogLevel::Trace,
            tracing::Level::DEBUG => LogLevel::Debug,
            tracing::Level::INFO => LogLevel::Information,
            tracing::Level::WARN => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }
}

/// The unit of information exchanged between the logger, its sinks and the
/// UDP wire.
///
/// Records are built once at the call site and never mutated after they
/// are handed to a sink. Field names follow the wire schema (`eventId` is
/// camel-cased on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    /// Local wall-clock time, truncated to milliseconds.
    #[serde(default = "now", deserialize_with = "deserialize_timestamp")]
    pub timestamp: DateTime<FixedOffset>,
    pub level: LogLevel,
    /// Logical emitter, usually dotted (`Worker.Task`).
    pub category: String,
    pub message: String,
    /// Rendered error description, if any.
    #[serde(default)]
    pub exception: Option<String>,
    /// `0` means unset.
    #[serde(default)]
    pub event_id: i32,
    /// Originating process or host.
    #[serde(default)]
    pub source: Option<String>,
}

impl LogRecord {
    pub fn new(level: LogLevel, category: impl Into<String>, message: impl Into<String>) -> Self {
        LogRecord {
            timestamp: now(),
            level,
            category: category.into(),
            message: message.into(),
            exception: None,
            event_id: 0,
            source: None,
        }
    }

    pub fn with_event_id(mut self, event_id: i32) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn with_exception(mut self, exception: impl Into<String>) -> Self {
        self.exception = Some(exception.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(3);
        self
    }

    /// A record with neither a message nor an exception carries nothing and
    /// must never reach a sink.
    pub fn is_emittable(&self) -> bool {
        !(self.message.is_empty() && self.exception.is_none())
    }
}

/// Render an error and its `source()` chain into a single description.
pub fn render_error(err: &(dyn Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        out.push_str("\n ---> ");
        out.push_str(&inner.to_string());
        cause = inner.source();
    }
    out
}

fn now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset().trunc_subsecs(3)
}

/// Accepts RFC 3339 timestamps, ISO-8601 timestamps with a basic-format
/// offset (`+0200`), and offset-less timestamps which are read as local
/// time.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .map(|ts| ts.trunc_subsecs(3))
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(resolve_local(&naive, |n| {
        Local.from_local_datetime(n).map(|ts| ts.fixed_offset())
    }))
}

/// Pin a wall-clock time to an instant using `lookup` for the zone.
///
/// An ambiguous time takes the earlier instant. A time skipped by a forward
/// transition keeps its wall-clock reading with the offset in force after
/// the transition, and falls back to UTC if the zone cannot tell.
fn resolve_local<F>(naive: &NaiveDateTime, lookup: F) -> DateTime<FixedOffset>
where
    F: Fn(&NaiveDateTime) -> LocalResult<DateTime<FixedOffset>>,
{
    if let Some(ts) = lookup(naive).earliest() {
        return ts;
    }
    naive
        .checked_add_signed(Duration::hours(2))
        .and_then(|later| lookup(&later).earliest())
        .and_then(|after| after.offset().from_local_datetime(naive).earliest())
        .unwrap_or_else(|| Utc.from_utc_datetime(naive).fixed_offset())
}
