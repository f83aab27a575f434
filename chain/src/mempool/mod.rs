//! Bounded, insertion-ordered transaction pool with a drained "pending" view.

use std::sync::RwLock;

use indexmap::IndexMap;

use crate::types::{Hash, Transaction};

/// Default cap on the `all` set; chosen as a sane bound for a single node's
/// memory footprint, overridable via [`Mempool::with_max_length`].
pub const DEFAULT_MAX_LENGTH: usize = 5_000;

struct Inner {
    all: IndexMap<Hash, Transaction>,
    pending: IndexMap<Hash, Transaction>,
    max_length: usize,
}

/// Two ordered views over admitted transactions: `all` (capped,
/// oldest-evicted) and `pending` (transactions not yet sealed into a block).
/// Both preserve insertion order; all mutations are serialized behind a
/// single lock so readers never observe a torn list.
pub struct Mempool {
    inner: RwLock<Inner>,
}

impl Mempool {
    /// Creates an empty mempool capped at [`DEFAULT_MAX_LENGTH`].
    pub fn new() -> Self {
        Self::with_max_length(DEFAULT_MAX_LENGTH)
    }

    /// Creates an empty mempool capped at `max_length`.
    pub fn with_max_length(max_length: usize) -> Self {
        Mempool {
            inner: RwLock::new(Inner {
                all: IndexMap::new(),
                pending: IndexMap::new(),
                max_length,
            }),
        }
    }

    /// Admits `tx`. Ignored if its hash is already present. If `all` is at
    /// capacity, evicts the oldest entry from `all` only; `pending` is
    /// never touched by eviction.
    pub fn add(&self, tx: Transaction) {
        let hash = tx.hash();
        let mut inner = self.inner.write().expect("mempool lock poisoned");
        if inner.all.contains_key(&hash) {
            return;
        }
        if inner.all.len() == inner.max_length {
            inner.all.shift_remove_index(0);
        }
        inner.all.insert(hash, tx.clone());
        inner.pending.insert(hash, tx);
    }

    /// Returns whether `hash` is present in `all`.
    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .all
            .contains_key(hash)
    }

    /// Snapshot of pending transactions in insertion order.
    pub fn pending(&self) -> Vec<Transaction> {
        self.inner
            .read()
            .expect("mempool lock poisoned")
            .pending
            .values()
            .cloned()
            .collect()
    }

    /// Drops all pending entries; `all` retains its history.
    pub fn clear_pending(&self) {
        self.inner.write().expect("mempool lock poisoned").pending.clear();
    }

    /// Number of pending transactions.
    pub fn pending_count(&self) -> usize {
        self.inner.read().expect("mempool lock poisoned").pending.len()
    }

    /// Number of transactions in `all`.
    pub fn count(&self) -> usize {
        self.inner.read().expect("mempool lock poisoned").all.len()
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrivateKey, TxInner};

    fn tx(nonce: i64) -> Transaction {
        let key = PrivateKey::generate();
        let mut tx = Transaction::new(TxInner::None, vec![], key.public_key(), None, 0, nonce);
        tx.sign(&key);
        tx
    }

    #[test]
    fn add_is_idempotent_on_hash() {
        let pool = Mempool::new();
        let t = tx(1);
        pool.add(t.clone());
        pool.add(t.clone());
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.pending_count(), 1);
    }

    #[test]
    fn eviction_only_touches_all_not_pending() {
        let pool = Mempool::with_max_length(2);
        let t1 = tx(1);
        let t2 = tx(2);
        let t3 = tx(3);
        pool.add(t1.clone());
        pool.add(t2.clone());
        pool.add(t3.clone());

        assert_eq!(pool.count(), 2);
        assert!(!pool.contains(&t1.hash()));
        assert_eq!(pool.pending_count(), 3);
    }

    #[test]
    fn clear_pending_preserves_all() {
        let pool = Mempool::new();
        pool.add(tx(1));
        pool.add(tx(2));
        pool.clear_pending();
        assert_eq!(pool.pending_count(), 0);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn pending_preserves_insertion_order() {
        let pool = Mempool::new();
        let t1 = tx(1);
        let t2 = tx(2);
        pool.add(t1.clone());
        pool.add(t2.clone());
        let pending = pool.pending();
        assert_eq!(pending[0].hash(), t1.hash());
        assert_eq!(pending[1].hash(), t2.hash());
    }
}
