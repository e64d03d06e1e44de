//! Correlation of commands with their asynchronous replies
//!
//! A reply carries no request id, only the function code of the command it
//! answers. Callers register a waiter under a [`CorrelationKey`] before
//! sending; whatever receives the reply notifies the registry with the same
//! key.

use std::collections::HashMap;
use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::function::FunctionCode;

/// Identifies the command a reply belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    /// Upstream peer or store the command travelled through, if any
    pub scope: Option<String>,

    /// Controller address
    pub address: Ipv4Addr,

    pub code: FunctionCode,
}

impl CorrelationKey {
    /// Key for a command sent straight to a controller
    pub fn local(address: Ipv4Addr, code: FunctionCode) -> Self {
        Self {
            scope: None,
            address,
            code,
        }
    }

    /// Key for a command relayed through an upstream peer
    pub fn scoped(scope: impl Into<String>, address: Ipv4Addr, code: FunctionCode) -> Self {
        Self {
            scope: Some(scope.into()),
            address,
            code,
        }
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scope) = &self.scope {
            write!(f, "{}-", scope)?;
        }
        write!(f, "{}-0x{:02X}", self.address, self.code.code())
    }
}

/// Handle returned by [`Registry::watch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

type Callback<T> = Box<dyn FnOnce(T) + Send>;

struct Waiter<T> {
    id: WatchId,
    callback: Callback<T>,
}

struct RegistryInner<T> {
    waiters: HashMap<CorrelationKey, Waiter<T>>,
    next_id: u64,
}

/// Table of pending waiters, one per key
///
/// Cloning is cheap and every clone shares the same table. Registering a
/// second waiter under a key drops the first one unfired: callers must keep
/// at most one command outstanding per controller and function code.
pub struct Registry<T> {
    inner: Arc<Mutex<RegistryInner<T>>>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner {
                waiters: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a waiter, replacing any waiter already under `key`
    pub fn watch<F>(&self, key: CorrelationKey, callback: F) -> WatchId
    where
        F: FnOnce(T) + Send + 'static,
    {
        let mut inner = self.inner.lock();

        let id = WatchId(inner.next_id);
        inner.next_id = inner.next_id.wrapping_add(1);

        let waiter = Waiter {
            id,
            callback: Box::new(callback),
        };

        if inner.waiters.insert(key.clone(), waiter).is_some() {
            debug!(key = %key, "Replaced pending waiter");
        } else {
            trace!(key = %key, "Watching");
        }

        id
    }

    /// Fire and remove the waiter under `key`
    ///
    /// Returns `false` when nobody is waiting. Unsolicited controller events
    /// share the channel with replies, so a miss is not an error.
    pub fn notify(&self, key: &CorrelationKey, value: T) -> bool {
        // Callback runs outside the lock so it may touch the registry
        let waiter = self.inner.lock().waiters.remove(key);

        match waiter {
            Some(waiter) => {
                debug!(key = %key, "Correlation hit");
                (waiter.callback)(value);
                true
            }
            None => {
                trace!(key = %key, "Correlation miss");
                false
            }
        }
    }

    /// Remove the waiter under `key` if it is still the one `id` names
    pub fn cancel(&self, key: &CorrelationKey, id: WatchId) -> bool {
        let mut inner = self.inner.lock();

        match inner.waiters.get(key) {
            Some(waiter) if waiter.id == id => {
                inner.waiters.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.inner.lock().waiters.contains_key(key)
    }

    /// Number of pending waiters
    pub fn len(&self) -> usize {
        self.inner.lock().waiters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pending", &self.len())
            .finish()
    }
}
