use crate::error::SinkError;
use crate::format::format_line;
use crate::record::{LogLevel, LogRecord};
use crate::sink::LogSink;
use async_trait::async_trait;

#[cfg(unix)]
use std::os::unix::net::UnixDatagram;
#[cfg(unix)]
use std::path::Path;

/// Well-known locations of the local syslog daemon socket.
#[cfg(unix)]
const SYSLOG_SOCKETS: &[&str] = &["/dev/log", "/var/run/syslog", "/var/run/log"];

/// `user-level messages` facility.
const FACILITY_USER: u8 = 1;

/// Severity written to the OS event journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalSeverity {
    Error,
    Warning,
    Informational,
}

impl JournalSeverity {
    pub fn for_level(level: LogLevel) -> Self {
        match level {
            LogLevel::Critical | LogLevel::Error => JournalSeverity::Error,
            LogLevel::Warning => JournalSeverity::Warning,
            _ => JournalSeverity::Informational,
        }
    }

    /// Numeric syslog severity.
    fn code(self) -> u8 {
        match self {
            JournalSeverity::Error => 3,
            JournalSeverity::Warning => 4,
            JournalSeverity::Informational => 6,
        }
    }
}

/// Writes records to the host's system event journal.
///
/// On unix this is the local syslog daemon, reached through its datagram
/// socket with RFC 3164 framing. The socket is connected once, in
/// [`EventLogSink::register`]; if that fails no sink is produced and the
/// caller runs without one. On other platforms the sink accepts every
/// record and does nothing.
pub struct EventLogSink {
    source_name: String,
    #[cfg(unix)]
    socket: UnixDatagram,
}

impl EventLogSink {
    /// Register `source_name` with the system journal.
    #[cfg(unix)]
    pub fn register(source_name: impl Into<String>) -> Result<Self, SinkError> {
        let source_name = source_name.into();
        let mut last_err = None;
        for path in SYSLOG_SOCKETS {
            match Self::register_at(source_name.clone(), path) {
                Ok(sink) => return Ok(sink),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err.unwrap_or_else(|| SinkError::Unavailable("no syslog socket found".into())))
    }

    #[cfg(not(unix))]
    pub fn register(source_name: impl Into<String>) -> Result<Self, SinkError> {
        Ok(EventLogSink {
            source_name: source_name.into(),
        })
    }

    /// Register against an explicit syslog socket path.
    #[cfg(unix)]
    pub fn register_at(
        source_name: impl Into<String>,
        socket_path: impl AsRef<Path>,
    ) -> Result<Self, SinkError> {
        let socket = UnixDatagram::unbound()?;
        socket.connect(socket_path)?;
        socket.set_nonblocking(true)?;
        Ok(EventLogSink {
            source_name: source_name.into(),
            socket,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Build the RFC 3164 packet for a record.
    fn packet(&self, record: &LogRecord) -> String {
        let severity = JournalSeverity::for_level(record.level);
        let pri = FACILITY_USER * 8 + severity.code();
        format!(
            "<{pri}>{} {}[{}]: {}",
            record.timestamp.format("%b %e %H:%M:%S"),
            self.source_name,
            std::process::id(),
            format_line(record)
        )
    }
}

#[async_trait]
impl LogSink for EventLogSink {
    async fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        let packet = self.packet(record);
        #[cfg(unix)]
        self.socket.send(packet.as_bytes())?;
        #[cfg(not(unix))]
        drop(packet);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "event-log"
    }
}
