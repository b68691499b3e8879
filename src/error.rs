use std::io;
use std::net::SocketAddr;

/// Failure of a single sink operation.
///
/// These never escape a logging call: the logger reports them on the
/// crate's own `tracing` diagnostics and moves on to the next sink.
#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to encode record: {0}")]
    Encode(#[from] CodecError),

    #[error("payload of {size} bytes exceeds the {limit} byte datagram limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Error raised while turning a datagram payload into a record, or back.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload does not match the record schema: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fatal listener error; terminates the listener only.
#[derive(thiserror::Error, Debug)]
pub enum ListenerError {
    #[error("failed to bind listener socket on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),
}

/// Error raised when loading a [`LoggingConfig`](crate::config::LoggingConfig).
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}
