use log_relay_sink::{ListenerState, LogListener, LoggingConfig, MultiSinkLogger};
use tokio_util::sync::CancellationToken;

/// Receives log datagrams until Ctrl-C, printing each record and merging it
/// into the local sinks when `LOG_RELAY_LISTEN_INJECT=true`.
///
/// Example:
/// `LOG_RELAY_LISTEN_PORT=9999 LOG_RELAY_LISTEN_INJECT=true LOG_RELAY_FILE_PATH=logs/merged.log cargo run --example listen`
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().init();

    let mut config = LoggingConfig::from_env()?;
    config.listener.enabled = true;

    let local = MultiSinkLogger::from_config(&config).await;
    let listener = LogListener::new(config.listener.clone()).with_logger(local);
    let handle = listener.handle();
    handle.subscribe(|record, source| {
        println!(
            "{} [{}] {} {}[{}]: {}",
            record.timestamp, record.level, source, record.category, record.event_id, record.message
        );
    });

    let cancel = CancellationToken::new();
    let task = listener.spawn(cancel.clone());

    match handle.listening().await {
        Some(addr) => println!("listening on {addr}, Ctrl-C to stop"),
        None => {
            let state = task.await?;
            return Err(format!("listener did not start: {state:?}").into());
        }
    }

    tokio::signal::ctrl_c().await?;
    cancel.cancel();
    let state = task.await?;
    assert_eq!(state, ListenerState::Stopped);
    Ok(())
}
