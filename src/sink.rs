use crate::error::SinkError;
use crate::record::LogRecord;
use async_trait::async_trait;

/// Destination for [`LogRecord`]s fanned out by the
/// [`MultiSinkLogger`](crate::logger::MultiSinkLogger).
///
/// Each implementation is an independent variant (event journal, rotating
/// file, UDP endpoint, ...). The logger calls `write` on every configured
/// sink in turn and discards a failing sink's error locally, so an
/// implementation only has to report its own failure and never has to
/// worry about the others.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was handed to the destination.
    /// - `Err(..)` on any sink-local failure (I/O, socket, permission).
    ///   The caller treats this as transient and does not retry.
    ///
    /// Implementations must not block beyond a bounded copy into an OS
    /// buffer or a single file append.
    async fn write(&self, record: &LogRecord) -> Result<(), SinkError>;

    /// Short name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Flush any buffered records. Default implementation is a no-op.
    async fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }
}
