//! Bridge between the controller network and the aggregation server
//!
//! Controller datagrams are correlated with pending commands and relayed
//! upstream with their sender address prefixed. Upstream frames are
//! stripped of the prefix and delivered to the addressed controller.
//! Heartbeat lines are answered in between.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use jxlink_core::{constants::ADDRESS_SIZE, CorrelationKey, Frame, Registry, RemoteFrame};
use jxlink_transport::{LinkEvent, StreamTransport, TcpLink, UdpTransport};

use crate::config::BridgeConfig;
use crate::control::{self, ControlLine, Inbound};
use crate::error::{Error, Result};
use crate::session::Session;

/// Aborts the link task when the bridge loop goes away
struct LinkTask(JoinHandle<()>);

impl Drop for LinkTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Protocol gateway
///
/// Cloning is cheap: every clone shares the socket, the link and the
/// correlation registry.
///
/// # Examples
///
/// ```no_run
/// use jxlink::{Bridge, BridgeConfig, RemoteConfig, StoreId};
///
/// # async fn example() -> jxlink::Result<()> {
/// let config = BridgeConfig::new(6767)
///     .with_remote(RemoteConfig::new("aggregator.local", 8000, StoreId::new("S01")?));
///
/// let bridge = Bridge::bind(config).await?;
/// bridge.run().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Bridge {
    config: Arc<BridgeConfig>,
    udp: Arc<UdpTransport>,
    link: Option<Arc<TcpLink>>,
    registry: Registry<Frame>,
}

impl Bridge {
    /// Validate the configuration and bind the controller socket
    pub async fn bind(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let udp = UdpTransport::bind(config.listen).await?;
        let link = config
            .remote
            .as_ref()
            .map(|remote| Arc::new(TcpLink::new(remote.link_config())));

        info!(
            "[UDP] Listening on {}, controllers on port {}",
            udp.local_addr(),
            config.device_port
        );

        Ok(Self {
            config: Arc::new(config),
            udp: Arc::new(udp),
            link,
            registry: Registry::new(),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.udp.local_addr()
    }

    pub fn registry(&self) -> &Registry<Frame> {
        &self.registry
    }

    /// Upstream link, if a remote is configured
    pub fn link(&self) -> Option<&Arc<TcpLink>> {
        self.link.as_ref()
    }

    /// Session for a controller on the local network, broadcast when `None`
    pub fn session(&self, address: Option<Ipv4Addr>) -> Result<Session> {
        let mut builder = Session::builder(self.registry.clone())
            .datagram(self.udp.clone())
            .port(self.config.device_port)
            .timeout(self.config.command_timeout);

        if let Some(address) = address {
            builder = builder.address(address);
        }

        builder.build()
    }

    /// Session for a controller reached through the upstream link
    pub fn remote_session(&self, address: Ipv4Addr) -> Result<Session> {
        let link = self
            .link
            .clone()
            .ok_or_else(|| Error::Config("no remote configured".into()))?;

        Session::builder(self.registry.clone())
            .stream(link)
            .address(address)
            .timeout(self.config.command_timeout)
            .build()
    }

    /// Relay traffic until the future is dropped
    pub async fn run(&self) {
        let (tx, mut rx) = mpsc::channel(64);

        let _link_task = match &self.link {
            Some(link) => {
                let link = Arc::clone(link);
                Some(LinkTask(tokio::spawn(async move { link.run(tx).await })))
            }
            None => None,
        };

        loop {
            tokio::select! {
                received = self.udp.recv_from() => match received {
                    Ok((data, from)) => self.on_datagram(data, from).await,
                    Err(e) => warn!(error = %e, "[UDP] Receive failed"),
                },
                Some(event) = rx.recv() => self.on_link_event(event),
            }
        }
    }

    /// Controller to server
    async fn on_datagram(&self, data: Bytes, from: SocketAddr) {
        debug!(from = %from, "[UDP] {}", hex::encode(&data));

        let frame = match Frame::decode(&data) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(from = %from, error = %e, "[UDP] Dropping malformed frame");
                return;
            }
        };

        let ip = match from {
            SocketAddr::V4(addr) => *addr.ip(),
            SocketAddr::V6(addr) => match addr.ip().to_ipv4_mapped() {
                Some(ip) => ip,
                None => {
                    warn!(from = %from, "[UDP] Dropping frame from non-IPv4 sender");
                    return;
                }
            },
        };

        if frame.code.is_unsolicited() {
            match frame.fields() {
                Ok(fields) => info!("[UDP] {}: {} {}", ip, frame.code, fields),
                Err(e) => warn!("[UDP] {}: {} ({})", ip, frame.code, e),
            }
        } else {
            debug!("[UDP] {}: {}", ip, frame);
        }

        self.registry
            .notify(&CorrelationKey::local(ip, frame.code), frame);

        let Some(link) = &self.link else {
            return;
        };

        if !link.is_writable() {
            debug!("[TCP] Link down, dropping frame from {}", ip);
            return;
        }

        if let Err(e) = link.write(&RemoteFrame::prefix(ip, &data)).await {
            error!(error = %e, "[TCP] Forward failed");
        }
    }

    fn on_link_event(&self, event: LinkEvent) {
        match event {
            LinkEvent::Connected(peer) => debug!("[TCP] Link up to {}", peer),
            LinkEvent::Disconnected => debug!("[TCP] Link down"),
            LinkEvent::Data(chunk) => {
                for inbound in control::classify(chunk) {
                    match inbound {
                        Inbound::Control(line) => self.on_control(line),
                        Inbound::Frame(data) => self.on_remote_frame(data),
                    }
                }
            }
        }
    }

    fn on_control(&self, line: String) {
        info!("[TCP] Got {:?}", line);

        let ControlLine::Ping { nonce, store_code } = ControlLine::parse(&line) else {
            return;
        };

        let Some(link) = self.link.clone() else {
            return;
        };
        let delay = self.config.heartbeat_delay;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let pong = control::pong_now(&nonce, &store_code);
            if let Err(e) = link.write(pong.as_bytes()).await {
                warn!(error = %e, "[TCP] Heartbeat reply failed");
            }
        });
    }

    /// Server to controller
    fn on_remote_frame(&self, data: Bytes) {
        let remote = match RemoteFrame::decode(&data) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(error = %e, "[TCP] Dropping malformed remote frame");
                return;
            }
        };

        // Answer to a command sent through a stream session
        if let Some(link) = &self.link {
            let key = CorrelationKey::scoped(link.peer(), remote.address, remote.frame.code);
            if self.registry.notify(&key, remote.frame.clone()) {
                return;
            }
        }

        let session = match self.session(Some(remote.address)) {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, "[UDP] Cannot reach {}", remote.address);
                return;
            }
        };

        // Delivery waits for the controller, keep the loop free meanwhile
        tokio::spawn(async move {
            match session.deliver(&data[ADDRESS_SIZE..]).await {
                Ok(_) => debug!("[UDP] {} {} acknowledged", remote.address, remote.frame.code),
                Err(e) => error!("[UDP] {} {} {}", remote.address, remote.frame.code, e),
            }
        });
    }
}
