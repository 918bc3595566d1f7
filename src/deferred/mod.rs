//! Lazily resolved, index-addressable sequences
//!
//! A `DeferredSequence` starts from cheap placeholder seeds (for example the raw
//! listing entries of a search page) and turns each one into its real value
//! the first time it is read. Resolved values are memoized.
//!
//! Seeds must already be in their final order. The sequence cannot be
//! re-sorted once values exist, since sorting would force every entry to be
//! resolved up front.

use std::cell::OnceCell;
use std::fmt;
use thiserror::Error;

/// Errors raised by [`DeferredSequence`] accessors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeferredError {
    #[error("Index {index} out of range for sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Cannot overwrite unresolved index {0}")]
    UnresolvedIndex(usize),
}

type Resolver<S, T> = Box<dyn Fn(&S) -> T + Send + Sync>;

/// A sequence of seeds resolved on first access
///
/// `resolved[i]` is the resolved-bitmap and value store in one: an empty cell
/// means seed `i` has not been resolved yet. Each index is resolved at most
/// once.
pub struct DeferredSequence<S, T> {
    seeds: Vec<S>,
    resolved: Vec<OnceCell<T>>,
    resolver: Resolver<S, T>,
}

impl<S, T> DeferredSequence<S, T> {
    /// Creates a sequence over `seeds`, resolving each with `resolver` on demand
    pub fn new<F>(seeds: Vec<S>, resolver: F) -> Self
    where
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let resolved = seeds.iter().map(|_| OnceCell::new()).collect();
        Self {
            seeds,
            resolved,
            resolver: Box::new(resolver),
        }
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    /// Returns true once index `i` has been resolved or explicitly set
    pub fn is_resolved(&self, index: usize) -> bool {
        self.resolved
            .get(index)
            .map(|cell| cell.get().is_some())
            .unwrap_or(false)
    }

    /// The raw seed at `index`
    pub fn seed(&self, index: usize) -> Option<&S> {
        self.seeds.get(index)
    }

    /// Returns the value at `index`, resolving it on first access
    pub fn get(&self, index: usize) -> Result<&T, DeferredError> {
        let len = self.len();
        let seed = self
            .seeds
            .get(index)
            .ok_or(DeferredError::IndexOutOfRange { index, len })?;
        Ok(self.resolved[index].get_or_init(|| (self.resolver)(seed)))
    }

    /// Replaces an already-resolved value
    pub fn set(&mut self, index: usize, value: T) -> Result<(), DeferredError> {
        let len = self.len();
        let cell = self
            .resolved
            .get_mut(index)
            .ok_or(DeferredError::IndexOutOfRange { index, len })?;
        match cell.get_mut() {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(DeferredError::UnresolvedIndex(index)),
        }
    }

    /// Removes the entry at `index`, shifting later entries down by one
    pub fn remove(&mut self, index: usize) -> Result<S, DeferredError> {
        let len = self.len();
        if index >= len {
            return Err(DeferredError::IndexOutOfRange { index, len });
        }
        self.resolved.remove(index);
        Ok(self.seeds.remove(index))
    }

    /// Walks the sequence from index 0, resolving entries as they are reached
    ///
    /// Each call starts a fresh walk; entries resolved by an earlier walk are
    /// reused.
    pub fn iter(&self) -> Iter<'_, S, T> {
        Iter {
            sequence: self,
            index: 0,
        }
    }
}

impl<S, T> fmt::Debug for DeferredSequence<S, T>
where
    S: fmt::Debug,
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSequence")
            .field("seeds", &self.seeds)
            .field("resolved", &self.resolved)
            .finish_non_exhaustive()
    }
}

/// Borrowing iterator returned by [`DeferredSequence::iter`]
pub struct Iter<'a, S, T> {
    sequence: &'a DeferredSequence<S, T>,
    index: usize,
}

impl<'a, S, T> Iterator for Iter<'a, S, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.sequence.get(self.index).ok()?;
        self.index += 1;
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.sequence.len().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl<'a, S, T> IntoIterator for &'a DeferredSequence<S, T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, S, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Owning iterator; resolves remaining entries as they are yielded
pub struct IntoIter<S, T> {
    seeds: std::vec::IntoIter<S>,
    resolved: std::vec::IntoIter<OnceCell<T>>,
    resolver: Resolver<S, T>,
}

impl<S, T> Iterator for IntoIter<S, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        let seed = self.seeds.next()?;
        let cell = self.resolved.next()?;
        Some(cell.into_inner().unwrap_or_else(|| (self.resolver)(&seed)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.seeds.size_hint()
    }
}

impl<S, T> IntoIterator for DeferredSequence<S, T> {
    type Item = T;
    type IntoIter = IntoIter<S, T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter {
            seeds: self.seeds.into_iter(),
            resolved: self.resolved.into_iter(),
            resolver: self.resolver,
        }
    }
}
