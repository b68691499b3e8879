//! Environment variable names used by this crate for convenient
//! configuration of sinks and the listener from a service's environment.
//!
//! These are purely helpers; the sink types themselves never read the
//! environment. See [`LoggingConfig::from_env`](crate::config::LoggingConfig::from_env).

/// Minimum level (`Trace` .. `Critical`, `None`).
pub const LOG_RELAY_MIN_LEVEL_ENV: &str = "LOG_RELAY_MIN_LEVEL";

/// Source tag stamped on outgoing records.
pub const LOG_RELAY_SOURCE_ENV: &str = "LOG_RELAY_SOURCE";

/// Event-journal source name; setting it enables the event-journal sink.
pub const LOG_RELAY_EVENT_LOG_SOURCE_ENV: &str = "LOG_RELAY_EVENT_LOG_SOURCE";

/// Log file path; setting it enables the file sink.
pub const LOG_RELAY_FILE_PATH_ENV: &str = "LOG_RELAY_FILE_PATH";

/// Rotation threshold in KiB.
pub const LOG_RELAY_FILE_MAX_SIZE_KB_ENV: &str = "LOG_RELAY_FILE_MAX_SIZE_KB";

/// Number of rotated backups to keep.
pub const LOG_RELAY_FILE_MAX_BACKUPS_ENV: &str = "LOG_RELAY_FILE_MAX_BACKUPS";

/// Collector `host:port`; setting it enables the UDP sink.
pub const LOG_RELAY_UDP_ENDPOINT_ENV: &str = "LOG_RELAY_UDP_ENDPOINT";

/// Listener port; setting it enables the listener.
pub const LOG_RELAY_LISTEN_PORT_ENV: &str = "LOG_RELAY_LISTEN_PORT";

/// Listener bind address, e.g. `127.0.0.1`.
pub const LOG_RELAY_LISTEN_ADDRESS_ENV: &str = "LOG_RELAY_LISTEN_ADDRESS";

/// `true` to re-feed received records into the local logger.
pub const LOG_RELAY_LISTEN_INJECT_ENV: &str = "LOG_RELAY_LISTEN_INJECT";

/// Interpret common truthy spellings (`1`, `true`, `yes`, `on`).
pub fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
