//! Device address packing
//!
//! Remote-carried frames start with the controller address packed one
//! octet per byte: `192.168.3.250` travels as `C0 A8 03 FA`.

use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Pack a dotted-decimal address into its 4 wire bytes
///
/// # Examples
///
/// ```
/// use jxlink_core::address;
///
/// let bytes = address::encode("192.168.3.250").unwrap();
/// assert_eq!(bytes, [192, 168, 3, 250]);
/// ```
pub fn encode(address: &str) -> Result<[u8; 4]> {
    Ipv4Addr::from_str(address)
        .map(|ip| ip.octets())
        .map_err(|_| Error::InvalidAddress(address.to_string()))
}

/// Unpack 4 wire bytes into a dotted-decimal address
pub fn decode(bytes: [u8; 4]) -> String {
    Ipv4Addr::from(bytes).to_string()
}

/// Read the address prefix of a remote-carried frame
pub fn read_prefix(data: &[u8]) -> Result<Ipv4Addr> {
    match data.get(..4) {
        Some(&[a, b, c, d]) => Ok(Ipv4Addr::new(a, b, c, d)),
        _ => Err(Error::FrameTooShort {
            expected: 4,
            actual: data.len(),
        }),
    }
}
