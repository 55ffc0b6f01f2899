//! Handler registry shared by the message channel and the alert bus.
//!
//! Dispatch works on a snapshot of matching entries taken under the owner's
//! lock; the lock is released before any handler runs, and each entry is
//! re-checked with [`Registry::contains`] right before it is invoked.  That is
//! what lets a handler subscribe or unsubscribe (itself or others) mid-pass.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

pub(crate) type Handler<E> = Arc<dyn Fn(&E) + Send + Sync>;

pub(crate) struct Entry<K, E> {
    pub id: u64,
    key: K,
    handler: Handler<E>,
    /// Highest delivery sequence this entry has been invoked with.
    cursor: Arc<AtomicU64>,
}

impl<K: Clone, E> Clone for Entry<K, E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            key: self.key.clone(),
            handler: Arc::clone(&self.handler),
            cursor: Arc::clone(&self.cursor),
        }
    }
}

impl<K, E> Entry<K, E> {
    pub fn invoke(&self, value: &E) {
        (self.handler)(value)
    }

    /// Invoke only if `seq` is newer than anything already delivered to this
    /// entry.  Returns whether the handler ran.
    pub fn deliver(&self, seq: u64, value: &E) -> bool {
        if self.cursor.fetch_max(seq, Ordering::AcqRel) >= seq {
            return false;
        }
        (self.handler)(value);
        true
    }
}

pub(crate) struct Registry<K, E> {
    next_id: u64,
    entries: Vec<Entry<K, E>>,
}

impl<K: Clone + PartialEq, E> Registry<K, E> {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, key: K, handler: Handler<E>) -> Entry<K, E> {
        let entry = Entry {
            id: self.next_id,
            key,
            handler,
            cursor: Arc::new(AtomicU64::new(0)),
        };
        self.next_id += 1;
        self.entries.push(entry.clone());
        entry
    }

    /// Remove by id.  The caller should drop the returned entry only after
    /// releasing its lock: the handler may own a [`Subscription`] whose drop
    /// calls back into the owner.
    pub fn remove(&mut self, id: u64) -> Option<Entry<K, E>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    /// Entries registered under `key`, in subscription order.
    pub fn matching(&self, key: &K) -> Vec<Entry<K, E>> {
        self.entries
            .iter()
            .filter(|e| e.key == *key)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Implemented by whatever owns a [`Registry`] behind a lock.
pub(crate) trait Unsubscribe: Send + Sync {
    fn unsubscribe(&self, id: u64);
}

/// Handle to one handler registration.
///
/// `unsubscribe` is idempotent and safe to call after the owning channel or
/// bus is gone.  Dropping the handle unsubscribes as well.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
    id: u64,
    owner: Weak<dyn Unsubscribe>,
    active: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(id: u64, owner: Weak<dyn Unsubscribe>) -> Self {
        Self {
            id,
            owner,
            active: AtomicBool::new(true),
        }
    }

    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.unsubscribe(self.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire) && self.owner.strong_count() > 0
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn counter() -> (Arc<AtomicU64>, Handler<u32>) {
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        (hits, Arc::new(move |_: &u32| {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_matching_keeps_subscription_order() {
        let mut registry: Registry<&str, u32> = Registry::new();
        let (_, h) = counter();
        let a = registry.insert("x", Arc::clone(&h));
        registry.insert("y", Arc::clone(&h));
        let c = registry.insert("x", h);
        let ids: Vec<u64> = registry.matching(&"x").iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
        assert!(registry.remove(a.id).is_some());
        assert!(registry.remove(a.id).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_deliver_never_goes_backwards() {
        let mut registry: Registry<(), u32> = Registry::new();
        let (hits, h) = counter();
        let entry = registry.insert((), h);
        assert!(entry.deliver(5, &0));
        assert!(!entry.deliver(4, &0));
        assert!(!entry.deliver(5, &0));
        assert!(entry.deliver(6, &0));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    struct Owner {
        removed: Mutex<Vec<u64>>,
    }

    impl Unsubscribe for Owner {
        fn unsubscribe(&self, id: u64) {
            self.removed.lock().push(id);
        }
    }

    #[test]
    fn test_subscription_is_idempotent_and_outlives_owner() {
        let owner = Arc::new(Owner {
            removed: Mutex::new(Vec::new()),
        });
        let weak: Weak<dyn Unsubscribe> = Arc::downgrade(&owner) as Weak<dyn Unsubscribe>;
        let sub = Subscription::new(7, weak.clone());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);
        assert_eq!(*owner.removed.lock(), vec![7]);

        let orphan = Subscription::new(8, weak);
        drop(owner);
        assert!(!orphan.is_active());
        orphan.unsubscribe();
    }
}
