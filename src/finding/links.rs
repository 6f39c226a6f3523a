//! Link table and tip collector
//!
//! Every extension made during the search, measurement or hole, is one
//! [`CandidateLink`] appended to the [`LinkTable`]. Links point to their
//! parent by index, so the table is an arena holding a forest of partial
//! trajectories rooted at the seeds. Nothing is ever modified or removed,
//! which lets many workers append concurrently through a single atomic
//! fill pointer.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use crate::types::TrackScalar;
use crate::{CkfError, Result};

// ============================================================================
// Atomic Arena
// ============================================================================

/// Fixed-capacity append-only storage.
///
/// `push` claims a position with one `fetch_add` and then initializes it;
/// every position is written at most once.
#[derive(Debug)]
struct AtomicArena<V> {
    entries: Box<[OnceLock<V>]>,
    fill: AtomicUsize,
}

impl<V> AtomicArena<V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: (0..capacity).map(|_| OnceLock::new()).collect(),
            fill: AtomicUsize::new(0),
        }
    }

    /// Appends a value, returning its index, or `None` when full.
    fn push(&self, value: V) -> Option<usize> {
        let index = self.fill.fetch_add(1, Ordering::AcqRel);
        let entry = self.entries.get(index)?;
        if entry.set(value).is_err() {
            unreachable!("arena position {index} claimed twice");
        }
        Some(index)
    }

    fn capacity(&self) -> usize {
        self.entries.len()
    }

    fn len(&self) -> usize {
        self.fill.load(Ordering::Acquire).min(self.entries.len())
    }

    fn get(&self, index: usize) -> Option<&V> {
        self.entries.get(index)?.get()
    }

    fn iter(&self) -> impl Iterator<Item = &V> + '_ {
        self.entries[..self.len()].iter().filter_map(OnceLock::get)
    }
}

// ============================================================================
// Candidate Link
// ============================================================================

/// One extension of a candidate trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CandidateLink<T: TrackScalar> {
    /// Navigation step at which the link was created
    pub step: usize,
    /// Parent link index; `None` for links hanging directly off a seed
    pub previous: Option<usize>,
    /// Position of the matched measurement in the measurement index; `None` for a hole
    pub measurement: Option<usize>,
    /// Originating seed, inherited along the chain
    pub seed: usize,
    /// Holes along the chain up to and including this link
    pub skipped: usize,
    /// Chi-square of the extension (`Float::max_value()` for holes)
    pub chi2: T,
}

impl<T: TrackScalar> CandidateLink<T> {
    /// Returns true if this link is a hole.
    #[inline]
    pub fn is_hole(&self) -> bool {
        self.measurement.is_none()
    }

    /// Number of measurements along the chain ending here.
    ///
    /// Steps taken (`step + 1`) minus the holes among them.
    #[inline]
    pub fn chain_length(&self) -> usize {
        self.step + 1 - self.skipped
    }
}

// ============================================================================
// Link Table
// ============================================================================

/// Append-only table of candidate links.
#[derive(Debug)]
pub struct LinkTable<T: TrackScalar> {
    arena: AtomicArena<CandidateLink<T>>,
}

impl<T: TrackScalar> LinkTable<T> {
    /// Creates a table able to hold `capacity` links.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: AtomicArena::with_capacity(capacity),
        }
    }

    /// Appends a link and returns its index.
    ///
    /// Running out of capacity means the table was sized too small for the
    /// configured branching and aborts the search.
    pub fn push(&self, link: CandidateLink<T>) -> Result<usize> {
        debug_assert!(link.skipped <= link.step + 1, "more holes than steps: {link:?}");
        self.arena.push(link).ok_or_else(|| {
            tracing::warn!(capacity = self.capacity(), "link table overflow");
            CkfError::LinkTableOverflow {
                capacity: self.capacity(),
            }
        })
    }

    /// Returns the link at `index`, if written.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&CandidateLink<T>> {
        self.arena.get(index)
    }

    /// Returns the link at `index`.
    ///
    /// # Panics
    /// Panics if no link was written at `index`; the search only ever
    /// refers to links it appended, so a miss means corrupted bookkeeping.
    #[inline]
    pub fn link(&self, index: usize) -> &CandidateLink<T> {
        match self.arena.get(index) {
            Some(link) => link,
            None => panic!(
                "link index {index} outside the link table (len {})",
                self.len()
            ),
        }
    }

    /// Number of links written.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if no link was written.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of links.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Iterates over the links in index order.
    pub fn iter(&self) -> impl Iterator<Item = &CandidateLink<T>> + '_ {
        self.arena.iter()
    }

    /// Copies the links out, index order.
    pub fn to_vec(&self) -> Vec<CandidateLink<T>> {
        self.iter().copied().collect()
    }
}

// ============================================================================
// Tip Collector
// ============================================================================

/// Link table indices of terminated candidates.
#[derive(Debug)]
pub struct TipCollector {
    arena: AtomicArena<usize>,
}

impl TipCollector {
    /// Creates a collector able to hold `capacity` tips.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            arena: AtomicArena::with_capacity(capacity),
        }
    }

    /// Records a tip.
    pub fn push(&self, link: usize) -> Result<()> {
        self.arena.push(link).map(|_| ()).ok_or_else(|| {
            tracing::warn!(capacity = self.capacity(), "tip collector overflow");
            CkfError::TipOverflow {
                capacity: self.capacity(),
            }
        })
    }

    /// Number of tips recorded.
    #[inline]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// Returns true if no tip was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of tips.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Iterates over the tips in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.arena.iter().copied()
    }

    /// Copies the tips out, insertion order.
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}
