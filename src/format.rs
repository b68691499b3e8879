//! Plain-text rendering shared by the file and event-journal sinks.

use crate::record::LogRecord;
use std::fmt::Write;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Render a record as
/// `<timestamp> [<TAG>] [<source>] <category>[<eventId>]: <message>`.
///
/// The source part is omitted when the record has none. An exception is
/// appended on the following line, so the result may span several lines
/// but never ends with a newline.
pub fn format_line(record: &LogRecord) -> String {
    let mut line = String::with_capacity(64 + record.message.len());
    let _ = write!(
        line,
        "{} [{}] ",
        record.timestamp.format(TIMESTAMP_FORMAT),
        record.level.tag()
    );
    if let Some(source) = &record.source {
        let _ = write!(line, "[{source}] ");
    }
    let _ = write!(line, "{}[{}]: {}", record.category, record.event_id, record.message);
    if let Some(exception) = &record.exception {
        line.push('\n');
        line.push_str(exception);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use chrono::DateTime;

    fn fixed(record: LogRecord) -> LogRecord {
        let ts = DateTime::parse_from_rfc3339("2024-05-01T08:09:10.042+02:00").expect("timestamp");
        record.with_timestamp(ts)
    }

    #[test]
    fn formats_basic_line() {
        let record = fixed(LogRecord::new(LogLevel::Error, "Worker.Task", "disk full").with_event_id(7));
        assert_eq!(
            format_line(&record),
            "2024-05-01 08:09:10.042 [FAIL] Worker.Task[7]: disk full"
        );
    }

    #[test]
    fn includes_source_and_exception() {
        let record = fixed(
            LogRecord::new(LogLevel::Warning, "Api", "slow request")
                .with_source("host-a")
                .with_exception("timeout"),
        );
        assert_eq!(
            format_line(&record),
            "2024-05-01 08:09:10.042 [WARN] [host-a] Api[0]: slow request\ntimeout"
        );
    }
}
