//! Locally queryable snapshot of the mirrored table
//!
//! The table is written by exactly one sync engine and read by any number
//! of queriers. Every operation takes the lock for its own duration only and
//! readers get owned rows back, so a query never observes a partially merged
//! row and never waits on a remote call.

mod row;

#[cfg(test)]
mod tests;

pub use row::{Generation, Row};

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use tracing::debug;

/// Result of merging one received entry into the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No row existed for the key
    Inserted,
    /// Attributes were unchanged, only the generation tag moved
    Confirmed,
    /// Attributes differed and the row was swapped for a new one
    Replaced,
}

/// Keyed container of current rows, ordered by key
pub struct SnapshotTable<K, A> {
    rows: RwLock<BTreeMap<K, Row<K, A>>>,
}

impl<K, A> Default for SnapshotTable<K, A>
where
    K: Ord + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, A> SnapshotTable<K, A>
where
    K: Ord + Clone,
{
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Look up the row stored under `key`
    pub fn get(&self, key: &K) -> Option<Row<K, A>> {
        self.rows.read().get(key).cloned()
    }

    /// Insert a row, returning the one it displaced
    pub fn put(&self, row: Row<K, A>) -> Option<Row<K, A>> {
        self.rows.write().insert(row.key().clone(), row)
    }

    /// Remove the row stored under `key`
    pub fn remove(&self, key: &K) -> Option<Row<K, A>> {
        self.rows.write().remove(key)
    }

    /// Lowest-keyed row
    pub fn first(&self) -> Option<Row<K, A>> {
        self.rows.read().values().next().cloned()
    }

    /// First row whose key sorts strictly after `key`
    pub fn next_after(&self, key: &K) -> Option<Row<K, A>> {
        self.rows
            .read()
            .range((Bound::Excluded(key), Bound::Unbounded))
            .next()
            .map(|(_, row)| row.clone())
    }

    /// Consistent copy of every row, in key order
    pub fn snapshot(&self) -> Snapshot<K, A> {
        Snapshot {
            rows: self.rows.read().values().cloned().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl<K, A> SnapshotTable<K, A>
where
    K: Ord + Clone + std::fmt::Debug,
    A: PartialEq,
{
    /// Reconcile one received entry against the stored row for its key.
    ///
    /// Attribute-equal rows keep their allocation and are only re-tagged;
    /// differing rows are replaced whole, never patched field by field.
    pub fn merge(&self, key: K, attrs: A, generation: Generation) -> MergeOutcome {
        let mut rows = self.rows.write();

        match rows.get_mut(&key) {
            Some(existing) if *existing.attributes() == attrs => {
                existing.set_generation(generation);
                MergeOutcome::Confirmed
            }
            Some(existing) => {
                debug!(key = ?key, "Replacing row with changed attributes");
                *existing = Row::new(key, attrs, generation);
                MergeOutcome::Replaced
            }
            None => {
                debug!(key = ?key, "Adding row to local table");
                rows.insert(key.clone(), Row::new(key, attrs, generation));
                MergeOutcome::Inserted
            }
        }
    }

    /// Keys of rows not confirmed by `generation`
    pub fn stale_keys(&self, generation: Generation) -> Vec<K> {
        self.rows
            .read()
            .values()
            .filter(|row| row.generation() != generation)
            .map(|row| row.key().clone())
            .collect()
    }

    /// Remove every row whose generation differs from `generation`.
    ///
    /// Victims are collected under a shared lock first and removed one at a
    /// time afterwards, re-checking the tag in case the row was confirmed in
    /// between. Returns the removed keys.
    pub fn sweep(&self, generation: Generation) -> Vec<K> {
        let victims = self.stale_keys(generation);
        let mut removed = Vec::with_capacity(victims.len());

        for key in victims {
            let mut rows = self.rows.write();
            if rows
                .get(&key)
                .is_some_and(|row| row.generation() != generation)
            {
                rows.remove(&key);
                debug!(key = ?key, "Removing stale row from local table");
                removed.push(key);
            }
        }

        removed
    }
}

/// Point-in-time copy of the table contents.
///
/// Iterating a snapshot is finite and can be repeated; later table
/// mutations are not reflected in it.
#[derive(Debug, Clone)]
pub struct Snapshot<K, A> {
    rows: Vec<Row<K, A>>,
}

impl<K, A> Snapshot<K, A> {
    pub fn iter(&self) -> std::slice::Iter<'_, Row<K, A>> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<K, A> IntoIterator for Snapshot<K, A> {
    type Item = Row<K, A>;
    type IntoIter = std::vec::IntoIter<Row<K, A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a, K, A> IntoIterator for &'a Snapshot<K, A> {
    type Item = &'a Row<K, A>;
    type IntoIter = std::slice::Iter<'a, Row<K, A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
