//! Persistent TCP link to the aggregation server
//!
//! The link cycles `Disconnected → Connecting → Connected → Closing →
//! Disconnected` for as long as it runs. Every close, whatever the cause,
//! is followed by a fixed reconnect delay and a fresh attempt. There is no
//! backoff and no retry limit.
//!
//! The connection task owns the socket. Writers only queue bytes, so a peer
//! that stops reading stalls the connection task alone, until the write
//! timeout closes the link.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, trace, warn};

use crate::{error::*, StreamTransport};

/// Writes queued per connection before [`Error::Backlog`]
const OUTBOX_CAPACITY: usize = 32;

/// Connection settings for [`TcpLink`]
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub host: String,
    pub port: u16,

    /// Line written first on every new connection
    pub greeting: Option<String>,

    /// Limit for establishing a connection
    pub connect_timeout: Duration,

    /// Close the connection when nothing is read or written for this long
    pub idle_timeout: Duration,

    /// Close the connection when one write cannot complete in this time
    pub write_timeout: Duration,

    /// Delay between a close and the next attempt
    pub reconnect_interval: Duration,
}

impl LinkConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            greeting: None,
            connect_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_millis(3_650_000 * 2),
            write_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(5),
        }
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = Some(greeting.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    /// `host:port` string used to connect
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Link state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// What the link reports to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Connection established and greeting sent
    Connected(SocketAddr),

    /// One read worth of bytes
    Data(Bytes),

    /// Connection gone, reconnect scheduled
    Disconnected,
}

/// Self-healing TCP client
///
/// Reads are reported through [`LinkEvent`]s from [`TcpLink::run`]. Writes
/// go through [`StreamTransport::write`] from any task and reach the socket
/// in call order.
pub struct TcpLink {
    config: LinkConfig,
    outbox: Mutex<Option<mpsc::Sender<Bytes>>>,
    state: RwLock<LinkState>,
    peer: RwLock<Option<SocketAddr>>,
    attempts: AtomicU64,
}

impl TcpLink {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            outbox: Mutex::new(None),
            state: RwLock::new(LinkState::Disconnected),
            peer: RwLock::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Get current state
    pub fn state(&self) -> LinkState {
        *self.state.read()
    }

    /// Number of connection attempts so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }

    /// Keep the link up until the event receiver is dropped
    pub async fn run(&self, events: mpsc::Sender<LinkEvent>) {
        loop {
            let result = self.serve(&events).await;
            self.teardown();

            if events.is_closed() {
                debug!("Link owner gone, stopping");
                return;
            }

            let delay = self.config.reconnect_interval;
            match result {
                Ok(()) => info!("[TCP] Closed, reconnect in {:?}", delay),
                Err(e) => warn!(
                    error = %e,
                    "[TCP] Closed for transmission error, reconnect in {:?}", delay
                ),
            }

            if events.send(LinkEvent::Disconnected).await.is_err() {
                return;
            }

            sleep(delay).await;
        }
    }

    /// One connection lifetime
    async fn serve(&self, events: &mpsc::Sender<LinkEvent>) -> Result<()> {
        self.set_state(LinkState::Connecting);
        self.attempts.fetch_add(1, Ordering::AcqRel);

        let addr = self.config.addr();
        info!("[TCP] Connecting {}...", addr);

        let connect_timeout = self.config.connect_timeout;
        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::ConnectionTimeout(connect_timeout))??;

        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        let local = stream.local_addr()?;
        let (mut reader, mut writer) = stream.into_split();

        let write_timeout = self.config.write_timeout;
        if let Some(greeting) = &self.config.greeting {
            timeout(write_timeout, writer.write_all(greeting.as_bytes()))
                .await
                .map_err(|_| Error::WriteTimeout(write_timeout))??;
        }

        let (outbox, mut outgoing) = mpsc::channel::<Bytes>(OUTBOX_CAPACITY);
        *self.outbox.lock() = Some(outbox);
        *self.peer.write() = Some(peer);
        self.set_state(LinkState::Connected);

        let idle = self.config.idle_timeout;
        info!(
            "[TCP] Connected to {}, local port: {}, timeout {:?}",
            peer,
            local.port(),
            idle
        );

        if events.send(LinkEvent::Connected(peer)).await.is_err() {
            return Ok(());
        }

        let deadline = sleep(idle);
        tokio::pin!(deadline);

        loop {
            let mut buf = BytesMut::with_capacity(4096);

            tokio::select! {
                read = reader.read_buf(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }

                    trace!("Received {} bytes via TCP: {}", n, hex::encode(&buf));
                    deadline.as_mut().reset(Instant::now() + idle);

                    if events.send(LinkEvent::Data(buf.freeze())).await.is_err() {
                        return Ok(());
                    }
                }
                Some(data) = outgoing.recv() => {
                    trace!("Sending {} bytes via TCP: {}", data.len(), hex::encode(&data));

                    timeout(write_timeout, writer.write_all(&data))
                        .await
                        .map_err(|_| Error::WriteTimeout(write_timeout))??;
                    deadline.as_mut().reset(Instant::now() + idle);
                }
                _ = &mut deadline => return Err(Error::IdleTimeout(idle)),
            }
        }
    }

    fn teardown(&self) {
        self.set_state(LinkState::Closing);

        // Queued writes die with the connection
        self.outbox.lock().take();
        *self.peer.write() = None;

        self.set_state(LinkState::Disconnected);
    }

    fn set_state(&self, state: LinkState) {
        let mut current = self.state.write();
        if *current != state {
            debug!(from = ?*current, to = ?state, "Link state");
            *current = state;
        }
    }
}

#[async_trait]
impl StreamTransport for TcpLink {
    async fn write(&self, data: &[u8]) -> Result<()> {
        let outbox = self.outbox.lock().clone().ok_or(Error::NotConnected)?;

        outbox
            .try_send(Bytes::copy_from_slice(data))
            .map_err(|e| match e {
                TrySendError::Full(_) => {
                    warn!("[TCP] Write queue full, dropping {} bytes", data.len());
                    Error::Backlog
                }
                TrySendError::Closed(_) => Error::NotConnected,
            })
    }

    fn is_writable(&self) -> bool {
        self.state() == LinkState::Connected && self.outbox.lock().is_some()
    }

    fn peer(&self) -> String {
        let peer = *self.peer.read();
        peer.map(|addr| addr.to_string())
            .unwrap_or_else(|| self.config.addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::net::TcpListener;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(rx: &mut mpsc::Receiver<LinkEvent>) -> LinkEvent {
        timeout(WAIT, rx.recv()).await.unwrap().unwrap()
    }

    fn spawn_link(config: LinkConfig) -> (Arc<TcpLink>, mpsc::Receiver<LinkEvent>) {
        let link = Arc::new(TcpLink::new(config));
        let (tx, rx) = mpsc::channel(16);
        let runner = Arc::clone(&link);
        tokio::spawn(async move { runner.run(tx).await });
        (link, rx)
    }

    #[tokio::test]
    async fn test_link_sends_greeting_and_reports_data() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (link, mut rx) =
            spawn_link(LinkConfig::new("127.0.0.1", port).with_greeting("store S01\r\n"));

        let (mut server, _) = listener.accept().await.unwrap();

        let mut greeting = [0u8; 11];
        server.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"store S01\r\n");

        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));
        assert_eq!(link.state(), LinkState::Connected);
        assert!(link.is_writable());

        server.write_all(b"hello").await.unwrap();
        assert_eq!(next_event(&mut rx).await, LinkEvent::Data(Bytes::from_static(b"hello")));

        link.write(b"world").await.unwrap();
        let mut echoed = [0u8; 5];
        server.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"world");
    }

    #[tokio::test]
    async fn test_link_reconnects_after_close() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port)
                .with_greeting("store S01\r\n")
                .with_reconnect_interval(Duration::from_millis(20)),
        );

        for _ in 0..3 {
            let (mut server, _) = listener.accept().await.unwrap();
            let mut greeting = [0u8; 11];
            server.read_exact(&mut greeting).await.unwrap();
            assert_eq!(&greeting, b"store S01\r\n");

            assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));
            drop(server);
            assert_eq!(next_event(&mut rx).await, LinkEvent::Disconnected);
        }

        assert!(link.attempts() >= 3);
    }

    #[tokio::test]
    async fn test_link_retries_refused_connections() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port).with_reconnect_interval(Duration::from_millis(10)),
        );

        for _ in 0..3 {
            assert_eq!(next_event(&mut rx).await, LinkEvent::Disconnected);
        }

        assert!(link.attempts() >= 3);
        assert!(!link.is_writable());
    }

    #[tokio::test]
    async fn test_link_idle_timeout_closes() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (_link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port)
                .with_idle_timeout(Duration::from_millis(50))
                .with_reconnect_interval(Duration::from_secs(60)),
        );

        let (_server, _) = listener.accept().await.unwrap();

        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));
        assert_eq!(next_event(&mut rx).await, LinkEvent::Disconnected);
    }

    #[tokio::test]
    async fn test_stalled_peer_closes_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port)
                .with_idle_timeout(Duration::from_millis(300))
                .with_write_timeout(Duration::from_millis(200))
                .with_reconnect_interval(Duration::from_millis(20)),
        );

        // Accepts but never reads
        let (_stalled, _) = listener.accept().await.unwrap();
        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));

        let writer = Arc::clone(&link);
        let flood = tokio::spawn(async move {
            let chunk = vec![0x55u8; 1 << 20];
            for _ in 0..64 {
                if writer.write(&chunk).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        assert_eq!(next_event(&mut rx).await, LinkEvent::Disconnected);
        assert!(!link.is_writable());

        let (_fresh, _) = timeout(WAIT, listener.accept()).await.unwrap().unwrap();
        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));
        assert!(link.attempts() >= 2);

        flood.abort();
    }

    #[tokio::test]
    async fn test_writes_keep_link_alive() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port).with_idle_timeout(Duration::from_millis(150)),
        );

        let (mut server, _) = listener.accept().await.unwrap();
        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));

        // The server never sends; outgoing traffic alone resets the idle timer
        for _ in 0..8 {
            link.write(b"tick").await.unwrap();
            let mut tick = [0u8; 4];
            server.read_exact(&mut tick).await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        assert!(rx.try_recv().is_err());
        assert_eq!(link.state(), LinkState::Connected);
    }

    #[tokio::test]
    async fn test_write_after_peer_close_fails_fast() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (link, mut rx) = spawn_link(
            LinkConfig::new("127.0.0.1", port).with_reconnect_interval(Duration::from_secs(60)),
        );

        let (server, _) = listener.accept().await.unwrap();
        assert!(matches!(next_event(&mut rx).await, LinkEvent::Connected(_)));

        drop(server);
        assert_eq!(next_event(&mut rx).await, LinkEvent::Disconnected);

        assert!(!link.is_writable());
        assert!(matches!(link.write(b"late").await, Err(Error::NotConnected)));
    }

    #[tokio::test]
    async fn test_write_while_disconnected() {
        let link = TcpLink::new(LinkConfig::new("127.0.0.1", 9));

        assert_eq!(link.state(), LinkState::Disconnected);
        assert!(matches!(link.write(b"x").await, Err(Error::NotConnected)));
        assert_eq!(link.peer(), "127.0.0.1:9");
    }
}
