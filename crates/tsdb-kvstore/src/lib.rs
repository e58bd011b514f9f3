//! An in-memory, ordered, transactional key/value store.
//!
//! The storage engine above this crate (`tsdb-catalog`, `tsdb-ring`) is
//! defined in terms of "an ordered, transactional key/value store" as an
//! external collaborator. This crate provides one: keys are held in a
//! single `BTreeMap` so that range scans iterate in byte-lexicographic
//! order (the Value and Meta key families rely on big-endian integer
//! encoding specifically so that ordered iteration matches `metric_id`
//! and `slot` ordering), and commits go through a single global lock that
//! serializes validate-then-apply, the same way the commit protocol
//! elsewhere in this codebase prevents a TOCTOU race between checking for
//! conflicts and making a transaction's writes visible. There is no WAL
//! stage here: this store is in-memory only, and durable logging outside
//! the KV store is explicitly out of scope for the layers built on it.

use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tsdb_core::{Error, Result};

#[derive(Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
    /// Commit version that last touched each key (insert, update, or delete).
    versions: BTreeMap<Vec<u8>, u64>,
}

/// A process-wide, thread-safe handle to the store. Cheap to clone.
#[derive(Clone)]
pub struct KvStore {
    inner: Arc<RwLock<Inner>>,
    version: Arc<AtomicU64>,
    commit_lock: Arc<Mutex<()>>,
}

impl KvStore {
    /// Create a fresh, empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            version: Arc::new(AtomicU64::new(0)),
            commit_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Begin a new transaction. Captures the store's current commit
    /// version as this transaction's read snapshot.
    pub fn begin(&self) -> Txn {
        Txn {
            store: self.clone(),
            snapshot_version: self.version.load(Ordering::SeqCst),
            reads: BTreeSet::new(),
            read_ranges: Vec::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Run `f` inside a transaction, retrying up to `max_attempts` times
    /// while it returns [`Error::ConflictRetryable`]. Intended for
    /// read-only operations (§5's retry policy): writers should see every
    /// conflict so they can decide whether retrying is still correct
    /// given what else changed.
    pub fn with_retry<T>(
        &self,
        max_attempts: u32,
        mut f: impl FnMut(&mut Txn) -> Result<T>,
    ) -> Result<T> {
        let mut attempt = 0;
        loop {
            let mut txn = self.begin();
            match f(&mut txn) {
                Ok(v) => return Ok(v),
                Err(Error::ConflictRetryable) if attempt + 1 < max_attempts => {
                    attempt += 1;
                    tracing::warn!(attempt, "read-only transaction conflicted, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for KvStore {
    fn default() -> Self {
        Self::new()
    }
}

enum Write {
    Put(Vec<u8>),
    Delete,
}

/// A single transaction against a [`KvStore`].
///
/// Reads are tracked (point reads and range scans) so that [`Txn::commit`]
/// can detect whether anything this transaction observed was changed by a
/// transaction that committed after this one's snapshot was taken.
pub struct Txn {
    store: KvStore,
    snapshot_version: u64,
    reads: BTreeSet<Vec<u8>>,
    read_ranges: Vec<(Vec<u8>, Vec<u8>)>,
    writes: BTreeMap<Vec<u8>, Write>,
}

impl Txn {
    /// Read a single key, applying this transaction's own uncommitted
    /// writes first (read-your-writes).
    pub fn get(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        if let Some(w) = self.writes.get(key) {
            return match w {
                Write::Put(v) => Some(v.clone()),
                Write::Delete => None,
            };
        }
        self.reads.insert(key.to_vec());
        self.store.inner.read().data.get(key).cloned()
    }

    /// Scan keys in `[start, end)`, applying this transaction's own
    /// uncommitted writes over the committed snapshot. Records the range
    /// so a concurrent insert/delete/update within it is detected as a
    /// conflict at commit time even though no individual key was read.
    pub fn scan(&mut self, start: &[u8], end: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.read_ranges.push((start.to_vec(), end.to_vec()));
        let inner = self.store.inner.read();
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> = inner
            .data
            .range((Bound::Included(start.to_vec()), Bound::Excluded(end.to_vec())))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        drop(inner);
        for (k, w) in self.writes.range((Bound::Included(start.to_vec()), Bound::Excluded(end.to_vec()))) {
            match w {
                Write::Put(v) => {
                    merged.insert(k.clone(), v.clone());
                }
                Write::Delete => {
                    merged.remove(k);
                }
            }
        }
        merged.into_iter().collect()
    }

    /// Buffer a write; visible to this transaction immediately, to
    /// everyone else only after a successful [`Txn::commit`].
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.writes.insert(key.into(), Write::Put(value.into()));
    }

    /// Buffer a delete.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.writes.insert(key.into(), Write::Delete);
    }

    /// Validate and apply this transaction's writes atomically.
    ///
    /// Acquires the store's single commit lock (serializing commit with
    /// every other commit, never with concurrent readers), checks that
    /// nothing this transaction read has a newer commit version than its
    /// snapshot, and if so applies all buffered writes under one write
    /// version. A read-only transaction (no buffered writes) never
    /// conflicts: it always observes a consistent snapshot and commits
    /// trivially.
    pub fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        let _guard = self.store.commit_lock.lock();
        let mut inner = self.store.inner.write();

        for key in &self.reads {
            if let Some(&v) = inner.versions.get(key) {
                if v > self.snapshot_version {
                    tracing::debug!(key = ?key, "commit conflict on point read");
                    return Err(Error::ConflictRetryable);
                }
            }
        }
        for (start, end) in &self.read_ranges {
            let conflict = inner
                .versions
                .range((Bound::Included(start.clone()), Bound::Excluded(end.clone())))
                .any(|(_, &v)| v > self.snapshot_version);
            if conflict {
                tracing::debug!(?start, ?end, "commit conflict on range read");
                return Err(Error::ConflictRetryable);
            }
        }

        let commit_version = self.store.version.fetch_add(1, Ordering::SeqCst) + 1;
        for (key, write) in self.writes {
            match write {
                Write::Put(value) => {
                    inner.data.insert(key.clone(), value);
                }
                Write::Delete => {
                    inner.data.remove(&key);
                }
            }
            inner.versions.insert(key, commit_version);
        }
        tracing::debug!(commit_version, "transaction committed");
        Ok(())
    }
}
