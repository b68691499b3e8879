use tokio::time::{sleep, Duration};

use log_relay_sink::init::{init_tracing_with_config, LayerConfig};
use log_relay_sink::{LogLevel, LoggingConfig, MultiSinkLogger};

/// Emits a few records through every sink configured in the environment.
///
/// Example:
/// `LOG_RELAY_FILE_PATH=logs/demo.log LOG_RELAY_UDP_ENDPOINT=127.0.0.1:9999 cargo run --example emit`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config = LoggingConfig::from_env()?;
    // Without LOG_RELAY_UDP_ENDPOINT the collector defaults to 127.0.0.1:9999.
    config.udp.enabled = true;

    let logger = MultiSinkLogger::from_config(&config).await;
    println!("logging to {} sink(s)", logger.sink_count());

    let worker = logger.category("Demo.Worker");
    worker.info("worker started").await;
    worker
        .log(LogLevel::Warning, 3, || format!("queue depth {} above threshold", 512), None)
        .await;

    let err = std::io::Error::other("no space left on device");
    worker
        .log(LogLevel::Error, 7, || "disk full".to_string(), Some(&err))
        .await;

    // `tracing` events go through the same sinks.
    let dispatcher = init_tracing_with_config(
        logger.clone(),
        LayerConfig {
            channel_buffer: 256,
            enable_stdout: true,
        },
    )?;
    tracing::error!(target: "Demo.Tracing", event_id = 42, "emitted via tracing");

    sleep(Duration::from_millis(200)).await;
    dispatcher.abort();
    Ok(())
}
