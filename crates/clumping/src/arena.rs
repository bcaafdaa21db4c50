//! Grow-only buffers reused across clumping calls.
//!
//! Each entity type (row headers, intervals, clumps, scratch grids) lives in
//! its own [`Arena`]. Resetting an arena drops its contents but keeps the
//! allocation, so repeated calls on similarly sized grids stop allocating
//! once the high-water mark is reached. Entries are addressed by index.

use std::ops::{Deref, DerefMut};

use crate::error::Result;

/// A contiguous, index-addressed buffer that never shrinks.
#[derive(Debug, Clone)]
pub struct Arena<T> {
    items: Vec<T>,
    high_water: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Arena<T> {
    /// Create an empty arena without allocating.
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            high_water: 0,
        }
    }

    /// Drop all entries, keeping the allocation.
    pub fn reset(&mut self) {
        self.items.clear();
    }

    /// Make room for `additional` more entries.
    ///
    /// Allocation failure is reported instead of aborting.
    pub fn reserve(&mut self, additional: usize) -> Result<()> {
        self.items.try_reserve(additional)?;
        Ok(())
    }

    /// Append an entry, returning its index.
    #[inline]
    pub fn push(&mut self, item: T) -> usize {
        let index = self.items.len();
        self.items.push(item);
        if self.items.len() > self.high_water {
            self.high_water = self.items.len();
        }
        index
    }

    /// Shorten the arena to `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len);
    }

    /// Largest number of entries held at once.
    pub fn high_water(&self) -> usize {
        self.high_water
    }

    /// Number of entries the current allocation can hold.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}

impl<T: Clone> Arena<T> {
    /// Reset the arena and fill it with `len` copies of `value`.
    pub fn fill(&mut self, len: usize, value: T) -> Result<()> {
        self.items.clear();
        self.items.try_reserve(len)?;
        self.items.resize(len, value);
        self.high_water = self.high_water.max(len);
        Ok(())
    }
}

impl<T> Deref for Arena<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for Arena<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}
