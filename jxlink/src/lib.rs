//! # jxlink
//!
//! Gateway between JX door-access controllers on a local network and a
//! central aggregation server.
//!
//! ## Features
//!
//! - Bit-exact controller frame codec
//! - Commands correlated with their asynchronous replies
//! - Self-healing upstream link with heartbeat answers
//! - Async/await API using Tokio
//!
//! ## Quick Start
//!
//! ```no_run
//! use jxlink::{Bridge, BridgeConfig};
//!
//! #[tokio::main]
//! async fn main() -> jxlink::Result<()> {
//!     // Local-only bridge on an ephemeral port
//!     let bridge = Bridge::bind(BridgeConfig::new(0)).await?;
//!
//!     let runner = bridge.clone();
//!     tokio::spawn(async move { runner.run().await });
//!
//!     let door = bridge.session(Some("192.168.3.250".parse().unwrap()))?;
//!     println!("{}", door.read_time().await?);
//!
//!     Ok(())
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod control;
pub mod error;
pub mod retry;
pub mod session;

// Re-exports
pub use bridge::Bridge;
pub use config::{BridgeConfig, RemoteConfig};
pub use error::{Error, Result};
pub use retry::RetryPolicy;
pub use session::{Reply, Session, SessionBuilder};

// Re-export types
pub use jxlink_core::{CorrelationKey, Frame, FunctionCode, Registry, RemoteFrame};
pub use jxlink_types::{PassEvent, Payload, StoreId};
