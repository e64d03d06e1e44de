//! High-level error types

use std::time::Duration;

use jxlink_core::FunctionCode;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Core protocol error: {0}")]
    Core(#[from] jxlink_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] jxlink_transport::Error),

    #[error("Type error: {0}")]
    Types(#[from] jxlink_types::Error),

    #[error("{code} timed out after {elapsed:?}")]
    Timeout { code: FunctionCode, elapsed: Duration },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0} needs a device address, broadcast has no responder")]
    NoResponder(FunctionCode),

    #[error("Unexpected reply to {code}: {reason}")]
    UnexpectedReply { code: FunctionCode, reason: String },
}
