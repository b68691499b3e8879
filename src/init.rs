use crate::layer::RelayLayer;
use crate::logger::MultiSinkLogger;
use tokio::task::JoinHandle;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the `tracing` bridge.
///
/// **Fields**
/// - `channel_buffer`: maximum number of [`LogRecord`](crate::record::LogRecord)s
///   queued for the dispatcher task before new ones are dropped.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is added
///   on top of [`RelayLayer`] so events are also printed to the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            enable_stdout: true,
        }
    }
}

/// Install a global `tracing` subscriber that forwards every event passing
/// `logger`'s level gate to its sinks.
///
/// **Returns** the dispatcher task handle, or an error if a global
/// subscriber was already installed.
pub fn init_tracing_with_config(
    logger: MultiSinkLogger,
    config: LayerConfig,
) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    let (layer, handle) = RelayLayer::new(logger, config.channel_buffer);

    // Two subscriber shapes because the fmt layer changes the type.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(handle)
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(logger: MultiSinkLogger) -> Result<JoinHandle<()>, SetGlobalDefaultError> {
    init_tracing_with_config(logger, LayerConfig::default())
}
