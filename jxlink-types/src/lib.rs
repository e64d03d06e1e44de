//! Type definitions for jxlink

pub mod error;
pub mod payload;
pub mod store;

pub use error::{Error, Result};
pub use payload::{PassEvent, Payload};
pub use store::StoreId;
