pub mod record;
pub mod error;
pub mod sink;
pub mod format;
pub mod codec;

pub mod file_sink;
#[cfg(feature = "event-log")]
pub mod event_log;
pub mod udp;

pub mod logger;
pub mod listener;

pub mod config;
pub mod env;
pub mod layer;
pub mod init;

pub use config::LoggingConfig;
pub use listener::{ListenerHandle, ListenerState, LogListener};
pub use logger::{CategoryLogger, MultiSinkLogger};
pub use record::{LogLevel, LogRecord};
pub use sink::LogSink;
