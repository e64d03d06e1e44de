//! Transport errors

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection timeout after {0:?}")]
    ConnectionTimeout(Duration),

    #[error("Idle timeout after {0:?}")]
    IdleTimeout(Duration),

    #[error("Write timeout after {0:?}")]
    WriteTimeout(Duration),

    #[error("Write queue full")]
    Backlog,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
