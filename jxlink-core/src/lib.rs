//! # jxlink-core
//!
//! Core protocol implementation for JX door-access controllers.
//!
//! This crate provides the low-level protocol primitives:
//! - Frame structure and encoding/decoding
//! - CRC-16/XMODEM checksum
//! - Function code definitions and payload layouts
//! - BCD timestamps and device address packing
//! - Command/reply correlation

pub mod address;
pub mod bcd;
pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod function;
pub mod payload;
pub mod registry;

pub use error::{Error, Result};
pub use frame::{Frame, RemoteFrame};
pub use function::FunctionCode;
pub use registry::{CorrelationKey, Registry, WatchId};
