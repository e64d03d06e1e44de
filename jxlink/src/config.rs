//! Bridge configuration

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use jxlink_core::constants::DEFAULT_DEVICE_PORT;
use jxlink_transport::LinkConfig;
use jxlink_types::StoreId;

use crate::error::{Error, Result};

/// Upstream aggregation server settings
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub host: String,
    pub port: u16,

    /// Announced as `store <id>` on every connect
    pub store_id: StoreId,

    /// Fixed delay between a close and the next attempt (default: 5s)
    pub reconnect_interval: Duration,

    /// Limit for establishing the connection (default: 1s)
    pub connect_timeout: Duration,

    /// Base of the steady-state idle timeout (default: 3 650 000 ms)
    pub remote_timeout: Duration,

    /// Idle timeout is `remote_timeout * idle_multiplier` (default: 2)
    pub idle_multiplier: u32,
}

impl RemoteConfig {
    pub fn new(host: impl Into<String>, port: u16, store_id: StoreId) -> Self {
        Self {
            host: host.into(),
            port,
            store_id,
            reconnect_interval: Duration::from_millis(5000),
            connect_timeout: Duration::from_secs(1),
            remote_timeout: Duration::from_millis(3_650_000),
            idle_multiplier: 2,
        }
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration, multiplier: u32) -> Self {
        self.remote_timeout = timeout;
        self.idle_multiplier = multiplier;
        self
    }

    /// Steady-state idle timeout of the upstream connection
    pub fn idle_timeout(&self) -> Duration {
        self.remote_timeout.saturating_mul(self.idle_multiplier)
    }

    /// Line identifying this bridge to the server
    pub fn greeting(&self) -> String {
        format!("store {}\r\n", self.store_id)
    }

    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::new(self.host.clone(), self.port)
            .with_greeting(self.greeting())
            .with_connect_timeout(self.connect_timeout)
            .with_idle_timeout(self.idle_timeout())
            .with_reconnect_interval(self.reconnect_interval)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::Config("remote host must not be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("remote port must not be 0".into()));
        }
        if self.reconnect_interval.is_zero() {
            return Err(Error::Config("reconnect interval must be positive".into()));
        }
        if self.idle_multiplier == 0 || self.remote_timeout.is_zero() {
            return Err(Error::Config("remote idle timeout must be positive".into()));
        }
        Ok(())
    }
}

/// Everything the bridge needs to run
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Local UDP address controllers report to
    pub listen: SocketAddr,

    /// UDP port controllers accept commands on (default: 6767)
    pub device_port: u16,

    /// Upstream server, `None` for a local-only bridge
    pub remote: Option<RemoteConfig>,

    /// Per-command correlation window (default: 30s)
    pub command_timeout: Duration,

    /// Delay before answering a heartbeat (default: 10ms)
    pub heartbeat_delay: Duration,
}

impl BridgeConfig {
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, listen_port)),
            ..Self::default()
        }
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_device_port(mut self, port: u16) -> Self {
        self.device_port = port;
        self
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_heartbeat_delay(mut self, delay: Duration) -> Self {
        self.heartbeat_delay = delay;
        self
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.device_port == 0 {
            return Err(Error::Config("device port must not be 0".into()));
        }
        if self.command_timeout.is_zero() {
            return Err(Error::Config("command timeout must be positive".into()));
        }
        if let Some(remote) = &self.remote {
            remote.validate()?;
        }
        Ok(())
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_DEVICE_PORT)),
            device_port: DEFAULT_DEVICE_PORT,
            remote: None,
            command_timeout: Duration::from_secs(30),
            heartbeat_delay: Duration::from_millis(10),
        }
    }
}
