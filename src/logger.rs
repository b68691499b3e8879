use crate::config::{EventLogConfig, LoggingConfig};
use crate::file_sink::FileSink;
use crate::record::{render_error, LogLevel, LogRecord};
use crate::sink::LogSink;
use crate::udp::UdpSink;
use std::error::Error;
use std::sync::Arc;
use tracing::{debug, warn};

#[cfg(feature = "event-log")]
use crate::event_log::EventLogSink;

/// Level-gated fan-out of log records to a fixed set of sinks.
///
/// Cloning is cheap and every clone shares the same sink set. The sink set
/// and the minimum level are fixed at construction; build a new logger to
/// change them.
///
/// Delivery is synchronous: once [`MultiSinkLogger::dispatch`] returns,
/// every sink has been tried exactly once. A failing sink is reported on
/// this crate's own `tracing` diagnostics and skipped; it never stops
/// delivery to the others and never surfaces to the caller.
#[derive(Clone)]
pub struct MultiSinkLogger {
    inner: Arc<Inner>,
}

struct Inner {
    min_level: LogLevel,
    source: Option<String>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl MultiSinkLogger {
    pub fn builder() -> MultiSinkLoggerBuilder {
        MultiSinkLoggerBuilder::default()
    }

    /// Build a logger with every sink enabled in `config`.
    ///
    /// A sink that cannot be set up (journal registration refused,
    /// malformed UDP endpoint, ...) is left out for the lifetime of the
    /// logger; the failure is logged once here and never retried.
    pub async fn from_config(config: &LoggingConfig) -> Self {
        let mut builder = Self::builder()
            .min_level(config.min_level)
            .source(config.source.clone());

        if config.event_log.enabled {
            if let Some(sink) = event_log_sink(&config.event_log) {
                builder = builder.sink(sink);
            }
        }

        if config.file.enabled {
            builder = builder.sink(Arc::new(FileSink::from_config(&config.file)));
        }

        if config.udp.enabled {
            match UdpSink::from_config(&config.udp).await {
                Ok(sink) => builder = builder.sink(Arc::new(sink)),
                Err(e) => warn!(endpoint = %config.udp.endpoint, error = %e, "udp log sink disabled"),
            }
        }

        builder.build()
    }

    /// `true` if a record at `level` would be delivered.
    pub fn is_enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::None && level >= self.inner.min_level
    }

    pub fn min_level(&self) -> LogLevel {
        self.inner.min_level
    }

    /// Source tag stamped on records this logger creates.
    pub fn source(&self) -> Option<&str> {
        self.inner.source.as_deref()
    }

    pub fn sink_count(&self) -> usize {
        self.inner.sinks.len()
    }

    /// Handle that logs under `category`.
    pub fn category(&self, category: impl Into<String>) -> CategoryLogger {
        CategoryLogger {
            logger: self.clone(),
            category: category.into(),
        }
    }

    /// Gate, build and fan out one record.
    ///
    /// `message` is only invoked when `level` passes the gate.
    pub async fn log<F>(
        &self,
        level: LogLevel,
        category: &str,
        event_id: i32,
        message: F,
        exception: Option<&(dyn Error + 'static)>,
    ) where
        F: FnOnce() -> String,
    {
        if !self.is_enabled(level) {
            return;
        }

        let mut record = LogRecord::new(level, category, message()).with_event_id(event_id);
        if let Some(err) = exception {
            record.exception = Some(render_error(err));
        }
        if let Some(source) = &self.inner.source {
            record.source = Some(source.clone());
        }
        self.dispatch(&record).await;
    }

    /// Deliver an already-built record to every sink.
    ///
    /// Records below the minimum level, and records with neither a message
    /// nor an exception, are dropped before any sink is touched.
    ///
    /// **Returns** the number of sinks that accepted the record.
    pub async fn dispatch(&self, record: &LogRecord) -> usize {
        if !self.is_enabled(record.level) || !record.is_emittable() {
            return 0;
        }

        let mut delivered = 0;
        for sink in &self.inner.sinks {
            match sink.write(record).await {
                Ok(()) => delivered += 1,
                Err(e) => debug!(sink = sink.name(), error = %e, "log sink write failed"),
            }
        }
        delivered
    }

    /// Flush every sink, ignoring failures.
    pub async fn flush(&self) {
        for sink in &self.inner.sinks {
            if let Err(e) = sink.flush().await {
                debug!(sink = sink.name(), error = %e, "log sink flush failed");
            }
        }
    }
}

#[cfg(feature = "event-log")]
fn event_log_sink(config: &EventLogConfig) -> Option<Arc<dyn LogSink>> {
    let source_name = config.source_name.as_str();
    let registered = match &config.socket_path {
        #[cfg(unix)]
        Some(path) => EventLogSink::register_at(source_name, path),
        _ => EventLogSink::register(source_name),
    };
    match registered {
        Ok(sink) => Some(Arc::new(sink)),
        Err(e) => {
            warn!(source_name, error = %e, "event log sink disabled");
            None
        }
    }
}

#[cfg(not(feature = "event-log"))]
fn event_log_sink(_config: &EventLogConfig) -> Option<Arc<dyn LogSink>> {
    warn!("event log sink requested but the `event-log` feature is not enabled");
    None
}

#[derive(Default)]
pub struct MultiSinkLoggerBuilder {
    min_level: LogLevel,
    source: Option<String>,
    sinks: Vec<Arc<dyn LogSink>>,
}

impl MultiSinkLoggerBuilder {
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Source tag stamped on records created through [`MultiSinkLogger::log`].
    pub fn source(mut self, source: Option<String>) -> Self {
        self.source = source;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn build(self) -> MultiSinkLogger {
        MultiSinkLogger {
            inner: Arc::new(Inner {
                min_level: self.min_level,
                source: self.source,
                sinks: self.sinks,
            }),
        }
    }
}

/// A [`MultiSinkLogger`] bound to one category.
#[derive(Clone)]
pub struct CategoryLogger {
    logger: MultiSinkLogger,
    category: String,
}

impl CategoryLogger {
    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn is_enabled(&self, level: LogLevel) -> bool {
        self.logger.is_enabled(level)
    }

    pub async fn log<F>(
        &self,
        level: LogLevel,
        event_id: i32,
        message: F,
        exception: Option<&(dyn Error + 'static)>,
    ) where
        F: FnOnce() -> String,
    {
        self.logger
            .log(level, &self.category, event_id, message, exception)
            .await;
    }

    pub async fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, 0, || message.to_string(), None).await;
    }

    pub async fn info(&self, message: &str) {
        self.log(LogLevel::Information, 0, || message.to_string(), None).await;
    }

    pub async fn warn(&self, message: &str) {
        self.log(LogLevel::Warning, 0, || message.to_string(), None).await;
    }

    pub async fn error(&self, message: &str, exception: Option<&(dyn Error + 'static)>) {
        self.log(LogLevel::Error, 0, || message.to_string(), exception).await;
    }
}
