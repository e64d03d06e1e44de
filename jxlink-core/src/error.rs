//! Error types for jxlink-core

use crate::function::FunctionCode;

/// Result type alias for codec operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Checksum verification failed (strict decoding only)
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch {
        expected: u16,
        received: u16,
    },

    /// Payload is too short for the layout its function code implies
    #[error("Payload too short for {code}: expected at least {expected} bytes, got {actual} bytes")]
    PayloadTooShort {
        code: FunctionCode,
        expected: usize,
        actual: usize,
    },

    /// A BCD byte holds a nibble above 9
    #[error("Invalid BCD byte: 0x{0:02X}")]
    InvalidBcd(u8),

    /// Date or time cannot be represented on the wire
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Device address is not a dotted-decimal IPv4 address
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),
}

