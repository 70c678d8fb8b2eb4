//! Connection registry: ids and per-connection cancellation

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Hands out connection ids and tracks the live connections of one server.
///
/// Ids start at 1 and are never reused. Every connection gets a child of the
/// server token, so cancelling the server closes every session.
#[derive(Debug)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    shutdown: CancellationToken,
    active: Mutex<HashMap<u64, CancellationToken>>,
}

impl ConnectionRegistry {
    pub fn new(shutdown: CancellationToken) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU64::new(1),
            shutdown,
            active: Mutex::new(HashMap::new()),
        })
    }

    fn active(&self) -> MutexGuard<'_, HashMap<u64, CancellationToken>> {
        // The map stays consistent even if a holder panicked.
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new connection. Dropping the guard deregisters it.
    pub fn register(self: &Arc<Self>) -> ConnectionGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancel = self.shutdown.child_token();
        let active = {
            let mut map = self.active();
            map.insert(id, cancel.clone());
            map.len()
        };
        debug!(connection_id = id, active, "Connection registered");
        ConnectionGuard { id, cancel, registry: Arc::clone(self) }
    }

    /// Close one connection's session. Returns `false` for unknown ids.
    pub fn close(&self, id: u64) -> bool {
        match self.active().get(&id) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    pub fn is_active(&self, id: u64) -> bool {
        self.active().contains_key(&id)
    }
}

/// Registration of one live connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: u64,
    cancel: CancellationToken,
    registry: Arc<ConnectionRegistry>,
}

impl ConnectionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.registry.active().remove(&self.id);
        debug!(connection_id = self.id, "Connection deregistered");
    }
}
