use crate::env::*;
use crate::error::ConfigError;
use crate::record::LogLevel;
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete configuration of a logger and its companion listener.
///
/// Loaded once at startup and treated as immutable: changing it means
/// building a new [`MultiSinkLogger`](crate::logger::MultiSinkLogger).
/// Every sink is disabled unless configured.
///
/// JSON field names are camel-cased:
///
/// ```json
/// {
///   "minLevel": "Information",
///   "file": { "enabled": true, "path": "logs/app.log", "maxSizeKB": 10240, "maxBackupFiles": 5 },
///   "udp": { "enabled": true, "endpoint": "collector:9999", "source": "web-01" },
///   "listener": { "enabled": true, "port": 9999, "injectIntoLocalLogging": true }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub min_level: LogLevel,
    /// Source tag stamped on records created by the logger.
    pub source: Option<String>,
    pub event_log: EventLogConfig,
    pub file: FileConfig,
    pub udp: UdpConfig,
    pub listener: ListenerConfig,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventLogConfig {
    pub enabled: bool,
    /// Name the process registers under in the system journal.
    pub source_name: String,
    /// Journal socket to use instead of the well-known syslog locations.
    pub socket_path: Option<PathBuf>,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            source_name: "log-relay".to_string(),
            socket_path: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileConfig {
    pub enabled: bool,
    pub path: PathBuf,
    #[serde(rename = "maxSizeKB")]
    pub max_size_kb: u64,
    pub max_backup_files: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: PathBuf::from("logs/app.log"),
            max_size_kb: 10_240,
            max_backup_files: 5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UdpConfig {
    pub enabled: bool,
    /// Collector address as `"host:port"`.
    pub endpoint: String,
    /// Tag stamped on records that do not carry their own source.
    pub source: Option<String>,
    /// Encoded records larger than this are dropped.
    pub max_payload_bytes: usize,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "127.0.0.1:9999".to_string(),
            source: None,
            max_payload_bytes: crate::codec::MAX_DATAGRAM_PAYLOAD,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListenerConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub port: u16,
    /// Re-feed received records into the local logger.
    pub inject_into_local_logging: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "0.0.0.0".to_string(),
            port: 9999,
            inject_into_local_logging: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build a configuration from the `LOG_RELAY_*` environment variables
    /// listed in [`crate::env`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LoggingConfig::from_env`], reading values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoggingConfig::default();

        if let Some(level) = lookup(LOG_RELAY_MIN_LEVEL_ENV) {
            config.min_level = parse_value(LOG_RELAY_MIN_LEVEL_ENV, &level)?;
        }
        config.source = lookup(LOG_RELAY_SOURCE_ENV);

        if let Some(name) = lookup(LOG_RELAY_EVENT_LOG_SOURCE_ENV) {
            config.event_log.enabled = true;
            config.event_log.source_name = name;
        }

        if let Some(path) = lookup(LOG_RELAY_FILE_PATH_ENV) {
            config.file.enabled = true;
            config.file.path = PathBuf::from(path);
        }
        if let Some(size) = lookup(LOG_RELAY_FILE_MAX_SIZE_KB_ENV) {
            config.file.max_size_kb = parse_value(LOG_RELAY_FILE_MAX_SIZE_KB_ENV, &size)?;
        }
        if let Some(count) = lookup(LOG_RELAY_FILE_MAX_BACKUPS_ENV) {
            config.file.max_backup_files = parse_value(LOG_RELAY_FILE_MAX_BACKUPS_ENV, &count)?;
        }

        if let Some(endpoint) = lookup(LOG_RELAY_UDP_ENDPOINT_ENV) {
            config.udp.enabled = true;
            config.udp.endpoint = endpoint;
            config.udp.source = config.source.clone();
        }

        if let Some(port) = lookup(LOG_RELAY_LISTEN_PORT_ENV) {
            config.listener.enabled = true;
            config.listener.port = parse_value(LOG_RELAY_LISTEN_PORT_ENV, &port)?;
        }
        if let Some(address) = lookup(LOG_RELAY_LISTEN_ADDRESS_ENV) {
            config.listener.bind_address = address;
        }
        if let Some(inject) = lookup(LOG_RELAY_LISTEN_INJECT_ENV) {
            config.listener.inject_into_local_logging = parse_flag(&inject);
        }

        Ok(config)
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}
