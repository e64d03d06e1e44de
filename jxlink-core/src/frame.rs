//! Controller frame structure and encoding/decoding

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    address, checksum,
    constants::*,
    error::{Error, Result},
    function::FunctionCode,
    payload,
};
use jxlink_types::Payload;

/// Controller protocol frame
///
/// # Frame Structure
///
/// ```text
/// ┌──────┬───────────┬───────┬──────┬──────┬───────┬───────────┬──────────┐
/// │ 0x80 │ 0xFF 0xFF │ 00 00 │ code │ 0xAA │ 00 00 │  Payload  │ Checksum │
/// │  1   │     2     │   2   │  1   │  1   │   2   │  N bytes  │ 2 (BE)   │
/// └──────┴───────────┴───────┴──────┴──────┴───────┴───────────┴──────────┘
/// ```
///
/// The checksum is CRC-16/XMODEM over header and payload.
///
/// # Examples
///
/// ```
/// use jxlink_core::{Frame, FunctionCode};
///
/// let frame = Frame::with_payload(FunctionCode::OpenDoor, vec![1, 0]);
/// let encoded = frame.encode();
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    /// Function code
    pub code: FunctionCode,

    /// Function-specific payload
    pub payload: Bytes,
}

impl Frame {
    /// Frame header size in bytes
    pub const HEADER_SIZE: usize = HEADER_SIZE;

    /// Create a frame with empty payload
    pub fn new(code: FunctionCode) -> Self {
        Self {
            code,
            payload: Bytes::new(),
        }
    }

    /// Create a frame with payload
    pub fn with_payload(code: FunctionCode, payload: impl Into<Bytes>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    /// Header bytes for a function code
    pub fn header(code: FunctionCode) -> [u8; HEADER_SIZE] {
        [
            HEAD_MARKER,
            BROADCAST_PLACEHOLDER[0],
            BROADCAST_PLACEHOLDER[1],
            0x00,
            0x00,
            code.code(),
            FUNC_MARKER,
            0x00,
            0x00,
        ]
    }

    /// Calculate checksum for this frame
    pub fn checksum(&self) -> u16 {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&Self::header(self.code));
        buf.extend_from_slice(&self.payload);
        checksum::calculate(&buf)
    }

    /// Encode frame to bytes
    ///
    /// Identical frames always encode to identical bytes.
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());

        buf.put_slice(&Self::header(self.code));
        buf.put_slice(&self.payload);

        let checksum = checksum::calculate(&buf);
        buf.put_slice(&checksum::to_bytes(checksum));

        buf
    }

    /// Read the function code of a raw frame without decoding it
    pub fn peek_code(buf: &[u8]) -> Result<FunctionCode> {
        Self::check_len(buf)?;
        Ok(FunctionCode::from(buf[FUNC_OFFSET]))
    }

    /// Decode frame from bytes
    ///
    /// The checksum trailer is skipped, not verified. Controllers in the
    /// field are known to send frames the bridge must still relay; use
    /// [`Frame::decode_strict`] where verification is wanted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooShort`] if the buffer cannot hold a header
    /// and checksum.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        Self::check_len(buf)?;

        let code = FunctionCode::from(buf[FUNC_OFFSET]);
        let payload = Bytes::copy_from_slice(&buf[HEADER_SIZE..buf.len() - CHECKSUM_SIZE]);

        Ok(Self { code, payload })
    }

    /// Decode frame and verify its checksum
    pub fn decode_strict(buf: &[u8]) -> Result<Self> {
        Self::check_len(buf)?;

        let split = buf.len() - CHECKSUM_SIZE;
        let received = u16::from_be_bytes([buf[split], buf[split + 1]]);
        let expected = checksum::calculate(&buf[..split]);

        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Self::decode(buf)
    }

    /// Decode the payload into its structured form
    pub fn fields(&self) -> Result<Payload> {
        payload::decode(self.code, &self.payload)
    }

    /// Get total encoded frame size
    pub fn size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CHECKSUM_SIZE
    }

    fn check_len(buf: &[u8]) -> Result<()> {
        if buf.len() < MIN_FRAME_SIZE {
            return Err(Error::FrameTooShort {
                expected: MIN_FRAME_SIZE,
                actual: buf.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("code", &self.code)
            .field("checksum", &format!("0x{:04X}", self.checksum()))
            .field("payload", &hex::encode(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}](len={})", self.code, self.payload.len())
    }
}

/// Frame carried over the upstream link, prefixed with its device address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFrame {
    /// Controller the frame came from or is meant for
    pub address: Ipv4Addr,

    pub frame: Frame,
}

impl RemoteFrame {
    pub fn new(address: Ipv4Addr, frame: Frame) -> Self {
        Self { address, frame }
    }

    /// Encode as address prefix followed by the frame
    pub fn encode(&self) -> BytesMut {
        Self::prefix(self.address, &self.frame.encode())
    }

    /// Decode a remote-carried frame
    ///
    /// Trailing zero padding stays in the payload, like every other byte
    /// between header and checksum.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let address = address::read_prefix(buf)?;
        let frame = Frame::decode(&buf[ADDRESS_SIZE..])?;
        Ok(Self { address, frame })
    }

    /// Prepend an address to already-encoded frame bytes
    pub fn prefix(address: Ipv4Addr, raw: &[u8]) -> BytesMut {
        let mut buf = BytesMut::with_capacity(ADDRESS_SIZE + raw.len());
        buf.put_slice(&address.octets());
        buf.put_slice(raw);
        buf
    }
}
