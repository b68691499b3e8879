use crate::codec::{self, MAX_DATAGRAM_PAYLOAD};
use crate::config::UdpConfig;
use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::LogSink;
use async_trait::async_trait;
use std::borrow::Cow;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Fire-and-forget sender of [`LogRecord`]s to one fixed UDP endpoint.
///
/// Every record becomes exactly one datagram. There are no
/// acknowledgements, retries or fragmentation; a record whose encoding is
/// larger than `max_payload` bytes is dropped with a warning.
pub struct UdpSink {
    socket: UdpSocket,
    endpoint: SocketAddr,
    source: Option<String>,
    max_payload: usize,
}

impl UdpSink {
    /// Resolve `endpoint` (`"host:port"`) and bind a local socket of the
    /// matching address family.
    ///
    /// **Parameters**
    /// - `endpoint`: collector address; host names are resolved once here.
    /// - `source`: tag stamped on records that do not carry their own.
    ///
    /// **Returns**
    /// - `Err(SinkError::InvalidEndpoint)` if the endpoint is malformed or
    ///   cannot be resolved.
    /// - `Err(SinkError::Io)` if no local socket could be bound.
    pub async fn connect(endpoint: &str, source: Option<String>) -> Result<Self, SinkError> {
        let endpoint = resolve_endpoint(endpoint).await?;
        let local: SocketAddr = if endpoint.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Ok(UdpSink {
            socket,
            endpoint,
            source,
            max_payload: MAX_DATAGRAM_PAYLOAD,
        })
    }

    pub async fn from_config(config: &UdpConfig) -> Result<Self, SinkError> {
        let sink = Self::connect(&config.endpoint, config.source.clone()).await?;
        Ok(sink.with_max_payload(config.max_payload_bytes))
    }

    /// Override the largest payload that will be sent.
    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload.min(MAX_DATAGRAM_PAYLOAD);
        self
    }

    pub fn endpoint(&self) -> SocketAddr {
        self.endpoint
    }

    /// Send a record and forget about it; transport errors are swallowed.
    pub async fn send(&self, record: &LogRecord) {
        if let Err(e) = self.transmit(record).await {
            debug!(endpoint = %self.endpoint, error = %e, "udp log send failed");
        }
    }

    async fn transmit(&self, record: &LogRecord) -> Result<(), SinkError> {
        let record = match (&record.source, &self.source) {
            (None, Some(source)) => Cow::Owned(record.clone().with_source(source.clone())),
            _ => Cow::Borrowed(record),
        };

        let payload = codec::encode(&record)?;
        if payload.len() > self.max_payload {
            warn!(
                size = payload.len(),
                limit = self.max_payload,
                category = %record.category,
                "dropping oversized log record"
            );
            return Err(SinkError::PayloadTooLarge {
                size: payload.len(),
                limit: self.max_payload,
            });
        }

        self.socket.send_to(&payload, self.endpoint).await?;
        Ok(())
    }
}

#[async_trait]
impl LogSink for UdpSink {
    async fn write(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.transmit(record).await
    }

    fn name(&self) -> &'static str {
        "udp"
    }
}

/// Parse and resolve a `"host:port"` endpoint string.
pub async fn resolve_endpoint(endpoint: &str) -> Result<SocketAddr, SinkError> {
    let invalid = |reason: &str| SinkError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let (host, port) = endpoint
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

    let mut addrs = tokio::net::lookup_host(endpoint.trim())
        .await
        .map_err(|e| invalid(&e.to_string()))?;
    addrs.next().ok_or_else(|| invalid("host did not resolve"))
}
