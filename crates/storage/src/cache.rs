use std::sync::Arc;

use cartflow_core::Cart;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub cart: Option<Cart>,
    /// Set by revalidation; cleared when a fresh cart is stored.
    pub stale: bool,
    /// Bumped every time a fetched cart replaces the previous one.
    pub revision: u64,
}

/// Last authoritative cart seen by the client.
///
/// Cloning shares the same entry. Readers can [`subscribe`](Self::subscribe)
/// to be notified when the cart is replaced or invalidated.
#[derive(Debug, Clone)]
pub struct CartCache {
    entry: Arc<watch::Sender<CacheEntry>>,
}

impl Default for CartCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CartCache {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(CacheEntry::default());
        Self { entry: Arc::new(tx) }
    }

    pub fn entry(&self) -> CacheEntry {
        self.entry.borrow().clone()
    }

    pub fn cart(&self) -> Option<Cart> {
        self.entry.borrow().cart.clone()
    }

    pub fn revision(&self) -> u64 {
        self.entry.borrow().revision
    }

    pub fn is_stale(&self) -> bool {
        self.entry.borrow().stale
    }

    /// True when there is nothing cached yet or the cache was invalidated.
    pub fn needs_refresh(&self) -> bool {
        let entry = self.entry.borrow();
        entry.stale || entry.cart.is_none()
    }

    /// Returns false if the entry was already stale.
    pub fn invalidate(&self) -> bool {
        let changed = self.entry.send_if_modified(|entry| {
            if entry.stale {
                return false;
            }
            entry.stale = true;
            true
        });
        if changed {
            tracing::debug!(revision = self.revision(), "cart cache invalidated");
        }
        changed
    }

    pub fn replace(&self, cart: Cart) -> u64 {
        let mut revision = 0;
        self.entry.send_modify(|entry| {
            entry.revision += 1;
            entry.stale = false;
            entry.cart = Some(cart);
            revision = entry.revision;
        });
        tracing::debug!(revision, "cart cache replaced");
        revision
    }

    pub fn subscribe(&self) -> watch::Receiver<CacheEntry> {
        self.entry.subscribe()
    }
}
