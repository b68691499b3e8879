use crate::logger::MultiSinkLogger;
use crate::record::{render_error, LogLevel, LogRecord};
use std::fmt::Write as _;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Events whose target starts with this prefix come from this crate's own
/// diagnostics and are never forwarded.
const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");

/// `tracing_subscriber` layer that turns `tracing` events into
/// [`LogRecord`]s and hands them to a [`MultiSinkLogger`].
///
/// The event's target becomes the record category, an `event_id` field
/// becomes the event id, and an `error`/`exception` field becomes the
/// exception. Other fields are appended to the message as `key=value`.
/// Records carry the logger's source tag, as with [`MultiSinkLogger::log`].
///
/// Sink I/O happens on a background task fed by a bounded channel, so the
/// application thread only pays for building the record. When the channel
/// is full the record is dropped and counted.
pub struct RelayLayer {
    sender: mpsc::Sender<LogRecord>,
    logger: MultiSinkLogger,
    /// Successfully enqueued for delivery.
    pub forwarded_events: Arc<AtomicU64>,
    /// Dropped because the channel was full.
    pub dropped_events: Arc<AtomicU64>,
}

impl RelayLayer {
    /// Create the layer and spawn the task that dispatches records to
    /// `logger`. The task ends once the layer is dropped and the channel
    /// has drained.
    ///
    /// `buffer` is raised to at least 16.
    pub fn new(logger: MultiSinkLogger, buffer: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<LogRecord>(buffer.max(16));

        let dispatcher = logger.clone();
        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                dispatcher.dispatch(&record).await;
            }
            dispatcher.flush().await;
        });

        (
            Self {
                sender: tx,
                logger,
                forwarded_events: Arc::new(AtomicU64::new(0)),
                dropped_events: Arc::new(AtomicU64::new(0)),
            },
            handle,
        )
    }
}

impl<S> Layer<S> for RelayLayer
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let meta = event.metadata();
        if meta.target().starts_with(OWN_TARGET) {
            return;
        }
        let level = LogLevel::from(*meta.level());
        if !self.logger.is_enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let mut record = LogRecord::new(level, meta.target(), visitor.into_message())
            .with_event_id(visitor.event_id);
        record.exception = visitor.exception;
        record.source = self.logger.source().map(str::to_string);

        match self.sender.try_send(record) {
            Ok(()) => {
                self.forwarded_events.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {
                self.dropped_events.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    extra: String,
    event_id: i32,
    exception: Option<String>,
}

impl FieldVisitor {
    fn into_message(&mut self) -> String {
        let mut message = std::mem::take(&mut self.message);
        message.push_str(&self.extra);
        message
    }

    fn push_extra(&mut self, field: &Field, value: &dyn std::fmt::Display) {
        let _ = write!(self.extra, " {}={}", field.name(), value);
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "exception" | "error" => self.exception = Some(value.to_string()),
            _ => self.push_extra(field, &value),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        if field.name() == "event_id" {
            self.event_id = i32::try_from(value).unwrap_or_default();
        } else {
            self.push_extra(field, &value);
        }
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        if field.name() == "event_id" {
            self.event_id = i32::try_from(value).unwrap_or_default();
        } else {
            self.push_extra(field, &value);
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.push_extra(field, &value);
    }

    fn record_error(&mut self, _field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.exception = Some(render_error(value));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "exception" | "error" => self.exception = Some(format!("{:?}", value)),
            _ => {
                let _ = write!(self.extra, " {}={:?}", field.name(), value);
            }
        }
    }
}
