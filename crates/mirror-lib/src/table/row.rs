//! Rows of the snapshot table

use crate::source::ListToken;
use std::fmt;
use std::sync::Arc;

/// Marker recording which cycle last confirmed a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(u32);

impl Generation {
    pub fn value(self) -> u32 {
        self.0
    }
}

impl From<ListToken> for Generation {
    fn from(token: ListToken) -> Self {
        Self(token.value())
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A key, its attribute payload and the generation that last confirmed it.
///
/// Attributes sit behind an `Arc` so that re-tagging a row keeps the payload
/// allocation, while a replacement always brings a fresh one.
pub struct Row<K, A> {
    key: K,
    attributes: Arc<A>,
    generation: Generation,
}

impl<K, A> Row<K, A> {
    pub fn new(key: K, attributes: A, generation: Generation) -> Self {
        Self {
            key,
            attributes: Arc::new(attributes),
            generation,
        }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn attributes(&self) -> &A {
        &self.attributes
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// True when both rows share one attribute allocation, i.e. neither
    /// was replaced since the other was read
    pub fn same_allocation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.attributes, &other.attributes)
    }

    pub(crate) fn set_generation(&mut self, generation: Generation) {
        self.generation = generation;
    }
}

impl<K: Clone, A> Clone for Row<K, A> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            attributes: Arc::clone(&self.attributes),
            generation: self.generation,
        }
    }
}

impl<K: fmt::Debug, A: fmt::Debug> fmt::Debug for Row<K, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("key", &self.key)
            .field("attributes", &self.attributes)
            .field("generation", &self.generation)
            .finish()
    }
}
