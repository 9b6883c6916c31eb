use std::collections::HashSet;
use std::sync::RwLock;

use shell_core::types::Hash256;

/// Thread-safe cache of signature triples already verified, keyed by a hash
/// of (signature, public key, sighash). Script validation may be invoked
/// while the mempool writer lock is held, so the cache carries its own lock.
#[derive(Debug, Default)]
pub struct SigCache {
    valid: RwLock<HashSet<Hash256>>,
}

impl SigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &Hash256) -> bool {
        self.valid.read().expect("sig cache poisoned").contains(key)
    }

    pub fn insert(&self, key: Hash256) {
        self.valid.write().expect("sig cache poisoned").insert(key);
    }

    pub fn len(&self) -> usize {
        self.valid.read().expect("sig cache poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe cache of sighash midstates per transaction. Entries are
/// dropped when the transaction leaves the pool.
#[derive(Debug, Default)]
pub struct HashCache {
    cached: RwLock<HashSet<Hash256>>,
}

impl HashCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, txid: &Hash256) -> bool {
        self.cached.read().expect("hash cache poisoned").contains(txid)
    }

    pub fn insert(&self, txid: Hash256) {
        self.cached.write().expect("hash cache poisoned").insert(txid);
    }

    pub fn remove(&self, txid: &Hash256) {
        self.cached.write().expect("hash cache poisoned").remove(txid);
    }
}
