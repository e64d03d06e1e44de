//! Frame checksum
//!
//! Controllers protect every frame with CRC-16/XMODEM (polynomial 0x1021,
//! initial value 0x0000) computed over header and payload. The value is
//! written big-endian as exactly two bytes.

use crc::{Crc, CRC_16_XMODEM};
use tracing::trace;

const XMODEM: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// Calculate the checksum of a header and payload
///
/// # Examples
///
/// ```
/// use jxlink_core::checksum;
///
/// assert_eq!(checksum::calculate(b"123456789"), 0x31C3);
/// ```
pub fn calculate(data: &[u8]) -> u16 {
    let checksum = XMODEM.checksum(data);

    trace!(
        len = data.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Encode a checksum as its two wire bytes
///
/// Small values keep their leading zero byte: `0x0005` is `[0x00, 0x05]`.
pub fn to_bytes(checksum: u16) -> [u8; 2] {
    checksum.to_be_bytes()
}

/// Verify a checksum
pub fn verify(data: &[u8], expected: u16) -> bool {
    calculate(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_check_value() {
        // Catalogue check value for CRC-16/XMODEM
        assert_eq!(calculate(b"123456789"), 0x31C3);
    }

    #[test]
    fn test_checksum_empty() {
        assert_eq!(calculate(&[]), 0x0000);
    }

    #[test]
    fn test_checksum_verify() {
        let data = [0x80, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0xAA, 0x00, 0x00, 0x01, 0x00];
        let checksum = calculate(&data);

        assert!(verify(&data, checksum));
        assert!(!verify(&data, checksum.wrapping_add(1)));
    }

    #[test]
    fn test_checksum_bytes_keep_leading_zero() {
        assert_eq!(to_bytes(0x0005), [0x00, 0x05]);
        assert_eq!(to_bytes(0x1234), [0x12, 0x34]);
    }

    #[test]
    fn test_checksum_different_codes() {
        let a = calculate(&[0x80, 0xFF, 0xFF, 0x00, 0x00, 0x07, 0xAA, 0x00, 0x00]);
        let b = calculate(&[0x80, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0xAA, 0x00, 0x00]);

        assert_ne!(a, b);
    }
}
