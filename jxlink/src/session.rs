//! Device sessions
//!
//! A [`Session`] is a handle on one controller. It is bound either to the
//! shared UDP socket, talking to the controller directly, or to the upstream
//! stream, where frames are prefixed with the controller address and the
//! server relays them.

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use tokio::sync::oneshot;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use jxlink_core::{
    bcd::{self, BcdWidth},
    constants::{DEFAULT_DEVICE_PORT, INIT_MAGIC, REGISTER_CARD_SIZE},
    payload, CorrelationKey, Frame, FunctionCode, Registry, RemoteFrame,
};
use jxlink_transport::{DatagramTransport, StreamTransport};
use jxlink_types::Payload;

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Outcome of a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Broadcast sent, nobody to wait for
    Sent,

    /// The controller answered
    Received(Frame),
}

impl Reply {
    pub fn frame(self) -> Option<Frame> {
        match self {
            Self::Sent => None,
            Self::Received(frame) => Some(frame),
        }
    }
}

#[derive(Clone)]
enum Link {
    Datagram {
        transport: Arc<dyn DatagramTransport>,
        address: Option<Ipv4Addr>,
        port: u16,
    },
    Stream {
        transport: Arc<dyn StreamTransport>,
        address: Ipv4Addr,
    },
}

/// Builder for [`Session`]
pub struct SessionBuilder {
    registry: Registry<Frame>,
    datagram: Option<Arc<dyn DatagramTransport>>,
    stream: Option<Arc<dyn StreamTransport>>,
    address: Option<Ipv4Addr>,
    port: Option<u16>,
    timeout: Duration,
}

impl SessionBuilder {
    /// Talk to the controller over the local UDP socket
    pub fn datagram(mut self, transport: Arc<dyn DatagramTransport>) -> Self {
        self.datagram = Some(transport);
        self
    }

    /// Talk to the controller through the upstream stream
    pub fn stream(mut self, transport: Arc<dyn StreamTransport>) -> Self {
        self.stream = Some(transport);
        self
    }

    /// Controller address; without one, datagram sessions broadcast
    pub fn address(mut self, address: Ipv4Addr) -> Self {
        self.address = Some(address);
        self
    }

    /// Controller UDP port (default: 6767)
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Correlation window per command (default: 30s)
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when the transports or address conflict.
    pub fn build(self) -> Result<Session> {
        let link = match (self.datagram, self.stream) {
            (Some(_), Some(_)) => {
                return Err(Error::Config(
                    "session cannot use both datagram and stream transports".into(),
                ));
            }
            (None, None) => {
                return Err(Error::Config("session needs a transport".into()));
            }
            (Some(transport), None) => Link::Datagram {
                transport,
                address: self.address.filter(|ip| !ip.is_broadcast()),
                port: self.port.unwrap_or(DEFAULT_DEVICE_PORT),
            },
            (None, Some(transport)) => {
                if self.port.is_some() {
                    return Err(Error::Config(
                        "device port only applies to datagram sessions".into(),
                    ));
                }
                let address = self.address.ok_or_else(|| {
                    Error::Config("stream session needs a device address".into())
                })?;
                Link::Stream { transport, address }
            }
        };

        Ok(Session {
            link,
            registry: self.registry,
            timeout: self.timeout,
        })
    }
}

/// JX controller session
///
/// Every command registers a waiter in the shared [`Registry`] before it is
/// written, then waits for the matching reply or the timeout. Broadcast
/// commands resolve as soon as they are sent.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use jxlink::{Registry, Session};
/// use jxlink_transport::UdpTransport;
///
/// # async fn example() -> jxlink::Result<()> {
/// let socket = Arc::new(UdpTransport::bind("0.0.0.0:0").await?);
/// let session = Session::builder(Registry::new())
///     .datagram(socket)
///     .address("192.168.3.250".parse().unwrap())
///     .build()?;
///
/// session.open_door(1, true).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Session {
    link: Link,
    registry: Registry<Frame>,
    timeout: Duration,
}

impl Session {
    /// Default correlation window
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn builder(registry: Registry<Frame>) -> SessionBuilder {
        SessionBuilder {
            registry,
            datagram: None,
            stream: None,
            address: None,
            port: None,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set command timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Controller address, `None` when broadcasting
    pub fn address(&self) -> Option<Ipv4Addr> {
        match &self.link {
            Link::Datagram { address, .. } => *address,
            Link::Stream { address, .. } => Some(*address),
        }
    }

    pub fn is_broadcast(&self) -> bool {
        self.address().is_none()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build, send and correlate one command
    pub async fn send_command(&self, code: FunctionCode, payload: impl Into<Bytes>) -> Result<Reply> {
        let frame = Frame::with_payload(code, payload);

        debug!(
            controller = %self.target(),
            payload = %hex::encode(&frame.payload),
            "Func {}",
            code
        );

        self.dispatch(code, &frame.encode(), self.timeout).await
    }

    /// Send an already encoded frame and correlate on its function code
    pub async fn deliver(&self, raw: &[u8]) -> Result<Reply> {
        let code = Frame::peek_code(raw)?;
        self.dispatch(code, raw, self.timeout).await
    }

    /// Send a command, sending again each time a reply does not arrive in time
    ///
    /// Only timeouts are retried; transport errors return at once.
    pub async fn send_with_retry(
        &self,
        code: FunctionCode,
        payload: impl Into<Bytes>,
        policy: &RetryPolicy,
    ) -> Result<Reply> {
        let data = Frame::with_payload(code, payload).encode();
        let attempts = policy.attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.dispatch(code, &data, policy.per_attempt_timeout).await {
                Err(Error::Timeout { .. }) if attempt < attempts => {
                    warn!(
                        controller = %self.target(),
                        "{} attempt {}/{} timed out, retrying",
                        code,
                        attempt,
                        attempts
                    );
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    // Commands

    /// Open a door, closing it again automatically unless `auto_close` is false
    pub async fn open_door(&self, door: u8, auto_close: bool) -> Result<Reply> {
        let hold = if auto_close { 0 } else { 1 };
        self.send_command(FunctionCode::OpenDoor, vec![door, hold]).await
    }

    /// Allow a card until `expires`
    pub async fn register_card(&self, card_no: u32, expires: NaiveDate) -> Result<Reply> {
        let mut buf = vec![0u8; REGISTER_CARD_SIZE];
        buf[..3].copy_from_slice(&bcd::encode_date(expires)?);
        buf[3..7].copy_from_slice(&payload::card(card_no));

        self.send_command(FunctionCode::RegisterCard, buf).await
    }

    pub async fn delete_card(&self, card_no: u32) -> Result<Reply> {
        self.send_command(FunctionCode::DeleteCard, payload::card(card_no).to_vec())
            .await
    }

    /// Ask whether a card is allowed
    pub async fn query_auth(&self, card_no: u32) -> Result<Reply> {
        self.send_command(FunctionCode::QueryAuth, payload::card(card_no).to_vec())
            .await
    }

    pub async fn init_device(&self) -> Result<Reply> {
        self.send_command(FunctionCode::InitDevice, INIT_MAGIC.to_vec())
            .await
    }

    /// Read the controller clock
    ///
    /// The reply carries the short 6-byte BCD form even though
    /// [`Session::set_time`] writes the long 7-byte form.
    pub async fn read_time(&self) -> Result<DateTime<FixedOffset>> {
        let code = FunctionCode::ReadTime;
        if self.is_broadcast() {
            return Err(Error::NoResponder(code));
        }

        let frame = self
            .send_command(code, Bytes::new())
            .await?
            .frame()
            .ok_or(Error::NoResponder(code))?;

        match frame.fields()? {
            Payload::Time(time) => Ok(time),
            other => Err(Error::UnexpectedReply {
                code,
                reason: format!("expected a clock value, got {}", other),
            }),
        }
    }

    /// Set the controller clock, written as 7-byte BCD in the protocol zone
    pub async fn set_time<Tz: TimeZone>(&self, time: &DateTime<Tz>) -> Result<Reply> {
        let payload = bcd::encode(time, BcdWidth::Long)?;
        self.send_command(FunctionCode::SetTime, payload).await
    }

    /// Set the controller clock to now
    pub async fn sync_time(&self) -> Result<Reply> {
        self.set_time(&Utc::now()).await
    }

    /// Start pushing pass events
    pub async fn enable_realtime(&self) -> Result<Reply> {
        self.send_command(FunctionCode::EnableRealtime, Bytes::new())
            .await
    }

    pub async fn disable_realtime(&self) -> Result<Reply> {
        self.send_command(FunctionCode::DisableRealtime, Bytes::new())
            .await
    }

    /// Point the controller at this bridge
    pub async fn set_server(&self) -> Result<Reply> {
        self.send_command(FunctionCode::SET_SERVER, Bytes::new())
            .await
    }

    // Helper methods

    fn target(&self) -> String {
        match self.address() {
            Some(address) => address.to_string(),
            None => "all".to_string(),
        }
    }

    async fn dispatch(&self, code: FunctionCode, data: &[u8], wait: Duration) -> Result<Reply> {
        match &self.link {
            Link::Stream { transport, address } => {
                let key = CorrelationKey::scoped(transport.peer(), *address, code);
                let prefixed = RemoteFrame::prefix(*address, data);
                self.exchange(key, wait, transport.write(&prefixed)).await
            }
            Link::Datagram {
                transport,
                address: Some(address),
                port,
            } => {
                let key = CorrelationKey::local(*address, code);
                let target = SocketAddr::V4(SocketAddrV4::new(*address, *port));
                self.exchange(key, wait, transport.send_to(data, target)).await
            }
            Link::Datagram {
                transport,
                address: None,
                port,
            } => {
                debug!("Sending {} to 255.255.255.255:{}", code, port);
                transport.broadcast(data, *port).await?;
                Ok(Reply::Sent)
            }
        }
    }

    /// Register the waiter, run `send`, then wait for the reply
    async fn exchange<F>(&self, key: CorrelationKey, wait: Duration, send: F) -> Result<Reply>
    where
        F: Future<Output = jxlink_transport::Result<()>>,
    {
        let (tx, rx) = oneshot::channel();
        let id = self.registry.watch(key.clone(), move |frame| {
            let _ = tx.send(frame);
        });

        if let Err(e) = send.await {
            self.registry.cancel(&key, id);
            return Err(e.into());
        }

        let started = Instant::now();
        let reply = timeout(wait, async move {
            match rx.await {
                Ok(frame) => frame,
                // Waiter was replaced, nothing will answer this call
                Err(_) => std::future::pending().await,
            }
        })
        .await;

        match reply {
            Ok(frame) => {
                debug!(key = %key, "Reply received: {}", frame);
                Ok(Reply::Received(frame))
            }
            Err(_) => {
                self.registry.cancel(&key, id);
                let elapsed = started.elapsed();
                warn!(key = %key, "No reply after {:?}", elapsed);
                Err(Error::Timeout {
                    code: key.code,
                    elapsed,
                })
            }
        }
    }
}
