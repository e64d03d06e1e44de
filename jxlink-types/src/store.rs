//! Store identifier sent when the bridge announces itself upstream

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier of the store a bridge serves
///
/// Travels inside the `store <id>\r\n` line, so it must be a single
/// non-empty token of printable ASCII.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StoreId(String);

impl StoreId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();

        if id.is_empty() {
            return Err(Error::Validation("store id must not be empty".into()));
        }

        if let Some(c) = id.chars().find(|c| !c.is_ascii_graphic()) {
            return Err(Error::Validation(format!(
                "store id {:?} contains invalid character {:?}",
                id, c
            )));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StoreId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for StoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
