//! UDP transport for JX controllers
//!
//! One socket serves every controller: it receives events and replies from
//! all of them and sends commands to any of them.

use std::net::{SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{debug, trace, warn};

use crate::{error::*, DatagramTransport};

/// Largest datagram accepted from a controller
const MAX_DATAGRAM: usize = 2048;

/// Shared UDP socket for the local controller network
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind the listening socket
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            warn!("Failed to bind UDP socket: {}", e);
            Error::Io(e)
        })?;
        let local_addr = socket.local_addr()?;

        debug!("UDP listening on {}", local_addr);

        Ok(Self { socket, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive one datagram
    pub async fn recv_from(&self) -> Result<(Bytes, SocketAddr)> {
        let mut buf = BytesMut::with_capacity(MAX_DATAGRAM);
        buf.resize(MAX_DATAGRAM, 0);

        let (n, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);

        trace!(from = %from, "Received {} bytes via UDP: {}", n, hex::encode(&buf));

        Ok((buf.freeze(), from))
    }
}

#[async_trait]
impl DatagramTransport for UdpTransport {
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()> {
        trace!(to = %target, "Sending {} bytes via UDP: {}", data.len(), hex::encode(data));

        self.socket.send_to(data, target).await?;
        Ok(())
    }

    async fn broadcast(&self, data: &[u8], port: u16) -> Result<()> {
        let target = SocketAddr::V4(SocketAddrV4::new(std::net::Ipv4Addr::BROADCAST, port));

        self.socket.set_broadcast(true)?;
        self.send_to(data, target).await
    }
}
