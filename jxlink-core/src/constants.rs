//! Protocol constants

use std::net::Ipv4Addr;

/// First byte of every frame header
pub const HEAD_MARKER: u8 = 0x80;

/// Marker byte following the function code
pub const FUNC_MARKER: u8 = 0xAA;

/// Broadcast address placeholder carried in every header
pub const BROADCAST_PLACEHOLDER: [u8; 2] = [0xFF, 0xFF];

/// Byte offset of the function code inside a frame
pub const FUNC_OFFSET: usize = 5;

/// Frame header size
pub const HEADER_SIZE: usize = 9;

/// Checksum trailer size
pub const CHECKSUM_SIZE: usize = 2;

/// Smallest frame: header, empty payload, checksum
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Size of the device address prefix on remote-carried frames
pub const ADDRESS_SIZE: usize = 4;

/// Fixed length of a remote-carried frame, zero padded
pub const REMOTE_FRAME_SIZE: usize = 64;

/// Default UDP port controllers listen on
pub const DEFAULT_DEVICE_PORT: u16 = 6767;

/// Destination used when a command has no specific controller
pub const BROADCAST_ADDR: Ipv4Addr = Ipv4Addr::BROADCAST;

/// Protocol timezone offset (Asia/Shanghai, no daylight saving)
pub const PROTOCOL_UTC_OFFSET_SECS: i32 = 8 * 3600;

/// Payload of the init-device command
pub const INIT_MAGIC: [u8; 4] = [0x55, 0xAA, 0xE1, 0x1E];

/// Register-card payload size
pub const REGISTER_CARD_SIZE: usize = 12;

/// Minimum pass-event payload size (flags, time, door, card)
pub const PASS_EVENT_SIZE: usize = 13;
