//! Transport layer for JX controllers
//!
//! Controllers sit on the local network and speak UDP. The aggregation
//! server is reached over one persistent TCP connection.

pub mod error;
pub mod tcp;
pub mod udp;

pub use error::{Error, Result};
pub use tcp::{LinkConfig, LinkEvent, LinkState, TcpLink};
pub use udp::UdpTransport;

use std::net::SocketAddr;

use async_trait::async_trait;

/// Connectionless transport towards controllers
#[async_trait]
pub trait DatagramTransport: Send + Sync {
    /// Send one datagram to a controller
    async fn send_to(&self, data: &[u8], target: SocketAddr) -> Result<()>;

    /// Send one datagram to every controller on the segment
    async fn broadcast(&self, data: &[u8], port: u16) -> Result<()>;
}

/// Persistent stream towards the aggregation server
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Queue bytes for the peer, delivered in call order
    ///
    /// Never waits on the peer: a stalled connection fails the write instead.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Check if a write would reach a connected peer
    fn is_writable(&self) -> bool;

    /// Identity of the connected peer
    fn peer(&self) -> String;
}
