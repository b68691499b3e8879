//! UDP listener that turns inbound datagrams back into [`LogRecord`]s.
//!
//! ```text
//! Idle ──bind──► Bound ──► Listening ◄──► Decoding
//!   │              │           │
//!   │ disabled     │           └── cancel ──► Stopped
//!   ▼              ▼ bind error
//! Disabled       Failed
//! ```
//!
//! One receive loop per listener. Each datagram is decoded, raised to the
//! subscribed observers and, if configured, re-fed into a local
//! [`MultiSinkLogger`]. A malformed datagram is logged and skipped. The
//! pending receive is raced against a [`CancellationToken`], so a stop
//! request never waits for the next datagram.

use crate::codec;
use crate::config::ListenerConfig;
use crate::error::ListenerError;
use crate::logger::MultiSinkLogger;
use crate::record::LogRecord;
use std::net::{IpAddr, SocketAddr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Large enough for any UDP payload.
const RECV_BUFFER_SIZE: usize = 65_536;

/// Lifecycle of a [`LogListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Bound,
    Listening,
    Decoding,
    /// Cancelled after listening; the socket has been released.
    Stopped,
    /// Configuration disabled the listener; no socket was bound.
    Disabled,
    /// The socket could not be bound.
    Failed,
}

impl ListenerState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ListenerState::Stopped | ListenerState::Disabled | ListenerState::Failed
        )
    }
}

/// Observer of received records. Called with the record and its source tag
/// (the record's `source`, or the sender's socket address) from the
/// listener's own task, so it must return quickly.
pub type RecordObserver = Arc<dyn Fn(&LogRecord, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Shared {
    next_id: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, RecordObserver)>>,
    local_addr: OnceLock<SocketAddr>,
}

impl Shared {
    fn subscribe(&self, observer: RecordObserver) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn notify(&self, record: &LogRecord, source: &str) {
        // Snapshot so observers may (un)subscribe from inside the callback.
        let observers: Vec<RecordObserver> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(record, source))).is_err() {
                warn!(source, "log record observer panicked");
            }
        }
    }
}

/// Cloneable view of a listener: subscriptions and state, usable after the
/// listener itself has been moved into its task.
#[derive(Clone)]
pub struct ListenerHandle {
    shared: Arc<Shared>,
    state: watch::Receiver<ListenerState>,
}

impl ListenerHandle {
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&LogRecord, &str) + Send + Sync + 'static,
    {
        self.shared.subscribe(Arc::new(observer))
    }

    /// **Returns** `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.unsubscribe(id)
    }

    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Address the socket is bound to, once bound.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.local_addr.get().copied()
    }

    /// Wait until the listener is receiving, or has ended.
    ///
    /// **Returns** the bound address, or `None` if the listener ended
    /// without listening.
    pub async fn listening(&self) -> Option<SocketAddr> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| matches!(s, ListenerState::Listening | ListenerState::Decoding) || s.is_terminal())
            .await
            .map(|s| *s)
            .ok()?;
        if reached.is_terminal() {
            None
        } else {
            self.local_addr()
        }
    }

    /// Wait until the listener reaches a terminal state.
    pub async fn finished(&self) -> ListenerState {
        let mut state = self.state.clone();
        let reached = match state.wait_for(|s| s.is_terminal()).await {
            Ok(s) => *s,
            Err(_) => self.state(),
        };
        reached
    }
}

/// Receives log datagrams on one UDP port for the rest of its life.
///
/// Single use: [`LogListener::run`] consumes the listener, and once it has
/// stopped a new instance is required.
pub struct LogListener {
    config: ListenerConfig,
    logger: Option<MultiSinkLogger>,
    shared: Arc<Shared>,
    state: watch::Sender<ListenerState>,
}

impl LogListener {
    pub fn new(config: ListenerConfig) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        LogListener {
            config,
            logger: None,
            shared: Arc::new(Shared::default()),
            state,
        }
    }

    /// Local logger that receives decoded records when
    /// `inject_into_local_logging` is set.
    pub fn with_logger(mut self, logger: MultiSinkLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn handle(&self) -> ListenerHandle {
        ListenerHandle {
            shared: Arc::clone(&self.shared),
            state: self.state.subscribe(),
        }
    }

    /// Run the listener on a new task.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<ListenerState> {
        tokio::spawn(self.run(cancel))
    }

    /// Bind and receive until `cancel` fires.
    ///
    /// **Returns** the terminal state: `Disabled` if the configuration
    /// disables the listener, `Failed` if the socket could not be bound,
    /// `Stopped` after cancellation. The socket is released in every case.
    pub async fn run(self, cancel: CancellationToken) -> ListenerState {
        if !self.config.enabled {
            debug!("log listener disabled");
            return self.set_state(ListenerState::Disabled);
        }

        let socket = match self.bind().await {
            Ok(socket) => socket,
            Err(e) => {
                error!(error = %e, "log listener failed to start");
                return self.set_state(ListenerState::Failed);
            }
        };
        let local = socket
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::new(IpAddr::from([0, 0, 0, 0]), self.config.port));
        let _ = self.shared.local_addr.set(local);
        self.set_state(ListenerState::Bound);

        info!(addr = %local, "log listener started");
        self.set_state(ListenerState::Listening);

        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = socket.recv_from(&mut buf) => result,
            };

            match received {
                Ok((len, peer)) => {
                    self.set_state(ListenerState::Decoding);
                    self.process_datagram(&buf[..len], peer).await;
                    self.set_state(ListenerState::Listening);
                }
                Err(e) => warn!(error = %e, "log listener receive failed"),
            }
        }

        drop(socket);
        info!(addr = %local, "log listener stopped");
        self.set_state(ListenerState::Stopped)
    }

    async fn bind(&self) -> Result<UdpSocket, ListenerError> {
        let ip: IpAddr = self
            .config
            .bind_address
            .trim()
            .parse()
            .map_err(|_| ListenerError::InvalidAddress(self.config.bind_address.clone()))?;
        let addr = SocketAddr::new(ip, self.config.port);
        UdpSocket::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })
    }

    /// Decode one datagram and dispatch it.
    async fn process_datagram(&self, payload: &[u8], peer: SocketAddr) {
        let mut record = match codec::decode(payload) {
            Ok(record) => record,
            Err(e) => {
                warn!(%peer, error = %e, "discarding malformed log datagram");
                return;
            }
        };

        let source = record.source.clone().unwrap_or_else(|| peer.to_string());
        self.shared.notify(&record, &source);

        if self.config.inject_into_local_logging {
            if let Some(logger) = &self.logger {
                if record.source.is_none() {
                    record.source = Some(source);
                }
                logger.dispatch(&record).await;
            }
        }
    }

    fn set_state(&self, state: ListenerState) -> ListenerState {
        self.state.send_replace(state);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogLevel;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};
    use tracing_test::traced_test;

    fn local_config() -> ListenerConfig {
        ListenerConfig {
            enabled: true,
            bind_address: "127.0.0.1".into(),
            port: 0,
            inject_into_local_logging: false,
        }
    }

    async fn sender() -> UdpSocket {
        UdpSocket::bind("127.0.0.1:0").await.expect("bind sender")
    }

    fn payload(message: &str) -> Vec<u8> {
        codec::encode(&LogRecord::new(LogLevel::Information, "Remote", message)).expect("encode")
    }

    #[tokio::test]
    async fn disabled_listener_never_binds() {
        let listener = LogListener::new(ListenerConfig::default());
        let handle = listener.handle();

        let state = listener.run(CancellationToken::new()).await;
        assert_eq!(state, ListenerState::Disabled);
        assert_eq!(handle.state(), ListenerState::Disabled);
        assert!(handle.local_addr().is_none());
    }

    #[tokio::test]
    #[traced_test]
    async fn bind_failure_is_fatal_to_listener_only() {
        let occupied = sender().await;
        let mut config = local_config();
        config.port = occupied.local_addr().expect("addr").port();

        let listener = LogListener::new(config);
        let handle = listener.handle();
        let state = listener.run(CancellationToken::new()).await;

        assert_eq!(state, ListenerState::Failed);
        assert!(handle.listening().await.is_none());
        assert!(logs_contain("log listener failed to start"));
    }

    #[tokio::test]
    #[traced_test]
    async fn malformed_datagram_is_skipped() {
        let listener = LogListener::new(local_config());
        let handle = listener.handle();
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.subscribe(move |record, _| {
            let _ = tx.send(record.message.clone());
        });

        // Drive the listener on this task so its diagnostics land in the
        // test's span.
        let cancel = CancellationToken::new();
        let run = listener.run(cancel.clone());
        let drive = async {
            let addr = handle.listening().await.expect("listening");
            let socket = sender().await;
            socket.send_to(b"{\"level\":\"Err", addr).await.expect("send");
            socket.send_to(&payload("well formed"), addr).await.expect("send");

            let first = timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("notification")
                .expect("open");
            assert_eq!(first, "well formed");
            assert!(rx.try_recv().is_err());
            cancel.cancel();
        };

        let (state, ()) = tokio::join!(run, drive);
        assert_eq!(state, ListenerState::Stopped);
        assert!(logs_contain("discarding malformed log datagram"));
    }

    #[tokio::test]
    async fn observers_receive_source_tag_and_can_unsubscribe() {
        let listener = LogListener::new(local_config());
        let handle = listener.handle();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = handle.subscribe(move |_, source| {
            let _ = tx_a.send(source.to_string());
        });
        handle.subscribe(move |_, source| {
            let _ = tx_b.send(source.to_string());
        });

        let cancel = CancellationToken::new();
        let task = listener.spawn(cancel.clone());
        let addr = handle.listening().await.expect("listening");
        let socket = sender().await;
        let peer = socket.local_addr().expect("addr").to_string();

        socket.send_to(&payload("anonymous"), addr).await.expect("send");
        let tagged = LogRecord::new(LogLevel::Warning, "Remote", "tagged").with_source("edge-2");
        assert_eq!(rx_a.recv().await.as_deref(), Some(peer.as_str()));
        assert_eq!(rx_b.recv().await.as_deref(), Some(peer.as_str()));

        assert!(handle.unsubscribe(a));
        assert!(!handle.unsubscribe(a));
        socket
            .send_to(&codec::encode(&tagged).expect("encode"), addr)
            .await
            .expect("send");
        assert_eq!(rx_b.recv().await.as_deref(), Some("edge-2"));
        assert!(rx_a.try_recv().is_err());

        cancel.cancel();
        task.await.expect("join");
    }

    #[tokio::test]
    async fn panicking_observer_does_not_stop_listener() {
        let listener = LogListener::new(local_config());
        let handle = listener.handle();
        handle.subscribe(|_, _| panic!("observer bug"));
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.subscribe(move |record, _| {
            let _ = tx.send(record.message.clone());
        });

        let cancel = CancellationToken::new();
        let task = listener.spawn(cancel.clone());
        let addr = handle.listening().await.expect("listening");
        let socket = sender().await;

        socket.send_to(&payload("one"), addr).await.expect("send");
        socket.send_to(&payload("two"), addr).await.expect("send");
        assert_eq!(rx.recv().await.as_deref(), Some("one"));
        assert_eq!(rx.recv().await.as_deref(), Some("two"));

        cancel.cancel();
        assert_eq!(task.await.expect("join"), ListenerState::Stopped);
    }

    #[tokio::test]
    async fn cancellation_unblocks_pending_receive_and_releases_socket() {
        let listener = LogListener::new(local_config());
        let handle = listener.handle();
        let cancel = CancellationToken::new();
        let task = listener.spawn(cancel.clone());
        let addr = handle.listening().await.expect("listening");

        cancel.cancel();
        let state = timeout(Duration::from_millis(500), task)
            .await
            .expect("stopped promptly")
            .expect("join");
        assert_eq!(state, ListenerState::Stopped);
        assert_eq!(handle.finished().await, ListenerState::Stopped);

        // The port is free again once the listener has stopped.
        UdpSocket::bind(addr).await.expect("rebind released port");
    }
}
