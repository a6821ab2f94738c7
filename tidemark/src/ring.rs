//! Fixed-capacity circular buffer of `(time, id)` samples.
//!
//! This is the single-resolution building block of the tiered store. Each ring
//! holds up to `C` samples in an inline array and evicts the oldest sample
//! when a new one arrives at full capacity.
//!
//! # Design
//!
//! ```text
//!   entries: [Sample; C]   physical slots
//!   head:   physical slot of the oldest retained sample (logical index 0)
//!   tail:   physical slot the next add() writes to
//!   length: number of valid samples, 0..=C
//!
//!   logical i  ->  physical (head + i) % C
//!   newest     ->  physical (tail + C - 1) % C
//! ```
//!
//! `tail == (head + length) % C` holds after every operation. Before the ring
//! fills, `add` only grows `length`; afterwards it advances `head` as well, so
//! eviction is strict FIFO.
//!
//! Samples are expected in non-decreasing time order. The ring does not check
//! this, but [`RingBuffer::floor`] and [`RingBuffer::ceiling`] rely on it for
//! their early exit.

use std::fmt;
use std::iter::FusedIterator;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SlabError};

/// Number of samples each tier retains unless a different capacity is chosen.
pub const DEFAULT_CAPACITY: usize = 512;

/// One recorded observation: a transaction id seen at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic timestamp in nanoseconds.
    pub time: i64,
    /// Transaction (generation) identifier.
    pub id: u64,
}

impl Sample {
    /// The zeroed sample used to fill unwritten slots.
    pub const ZERO: Self = Self { time: 0, id: 0 };

    /// Creates a sample.
    pub const fn new(time: i64, id: u64) -> Self {
        Self { time, id }
    }
}

/// A fixed-capacity ring of samples with overwrite-oldest eviction.
///
/// # Examples
///
/// ```rust
/// use tidemark::ring::RingBuffer;
///
/// let mut ring = RingBuffer::<3>::new();
/// for (time, id) in [(10, 1), (20, 2), (30, 3), (40, 4)] {
///     ring.add(time, id);
/// }
///
/// assert_eq!(ring.len(), 3);
/// assert_eq!(ring.entry(0).map(|s| s.id), Some(2));
/// assert_eq!(ring.tail_time(), 40);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct RingBuffer<const C: usize = DEFAULT_CAPACITY> {
    head: usize,
    tail: usize,
    length: usize,
    entries: [Sample; C],
}

impl<const C: usize> RingBuffer<C> {
    /// Creates an empty ring.
    pub fn new() -> Self {
        const { assert!(C > 0, "ring capacity must be non-zero") };

        Self {
            head: 0,
            tail: 0,
            length: 0,
            entries: [Sample::ZERO; C],
        }
    }

    /// Rebuilds a ring from its raw bookkeeping and physical slots.
    ///
    /// This is the inverse of reading [`head`](Self::head),
    /// [`tail`](Self::tail), [`len`](Self::len) and [`slots`](Self::slots).
    ///
    /// # Errors
    ///
    /// Returns [`SlabError::InvalidTier`] if `head` or `tail` is out of range,
    /// `length` exceeds the capacity, or `tail != (head + length) % C`.
    pub fn from_parts(head: usize, tail: usize, length: usize, entries: [Sample; C]) -> Result<Self> {
        if head >= C || tail >= C || length > C || tail != (head + length) % C {
            return Err(SlabError::InvalidTier {
                head: head as u64,
                tail: tail as u64,
                length: length as u64,
                capacity: C,
            }
            .into());
        }

        Ok(Self {
            head,
            tail,
            length,
            entries,
        })
    }

    /// Returns the fixed capacity `C`.
    pub const fn capacity(&self) -> usize {
        C
    }

    /// Returns the number of retained samples.
    pub fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns `true` once the ring holds `C` samples and starts evicting.
    pub fn is_full(&self) -> bool {
        self.length == C
    }

    /// Physical slot of the oldest retained sample.
    pub fn head(&self) -> usize {
        self.head
    }

    /// Physical slot the next [`add`](Self::add) writes to.
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Raw physical slots, including stale ones outside the valid range.
    pub fn slots(&self) -> &[Sample; C] {
        &self.entries
    }

    /// Returns the sample at logical index `i`, oldest first.
    ///
    /// Out-of-range indices yield `None`; this is not an error.
    pub fn entry(&self, i: usize) -> Option<&Sample> {
        if i >= self.length {
            return None;
        }

        Some(&self.entries[(self.head + i) % C])
    }

    /// Returns the id at logical index `i`, or `0` when `i` is out of range.
    pub fn id_at(&self, i: usize) -> u64 {
        self.entry(i).map_or(0, |sample| sample.id)
    }

    /// Returns the most recently added sample.
    pub fn tail_entry(&self) -> Option<&Sample> {
        if self.is_empty() {
            return None;
        }

        let slot = if self.tail == 0 { C - 1 } else { self.tail - 1 };
        Some(&self.entries[slot])
    }

    /// Returns the time of the most recently added sample, or `0` if empty.
    ///
    /// An empty ring and a ring whose newest sample was recorded at time `0`
    /// are indistinguishable here. Use [`tail_entry`](Self::tail_entry) when
    /// the difference matters.
    pub fn tail_time(&self) -> i64 {
        self.tail_entry().map_or(0, |sample| sample.time)
    }

    /// Appends a sample, evicting the oldest one when the ring is full.
    #[inline]
    pub fn add(&mut self, time: i64, id: u64) {
        self.entries[self.tail] = Sample { time, id };
        self.tail = (self.tail + 1) % C;

        if self.length < C {
            self.length += 1;
        } else {
            self.head = (self.head + 1) % C;
        }
    }

    /// Iterates retained samples from oldest to newest.
    pub fn iter(&self) -> RingIter<'_, C> {
        RingIter {
            ring: self,
            front: 0,
            back: self.length,
        }
    }

    /// Returns the newest sample with `time <= tv`.
    ///
    /// Scanning stops at the first sample past `tv`.
    pub fn floor(&self, tv: i64) -> Option<&Sample> {
        let mut found = None;
        for sample in self.iter() {
            if sample.time > tv {
                break;
            }
            found = Some(sample);
        }
        found
    }

    /// Returns the oldest sample with `time >= tv`.
    pub fn ceiling(&self, tv: i64) -> Option<&Sample> {
        self.iter().find(|sample| sample.time >= tv)
    }
}

impl<const C: usize> Default for RingBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const C: usize> fmt::Debug for RingBuffer<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &C)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("length", &self.length)
            .field("oldest", &self.entry(0))
            .field("newest", &self.tail_entry())
            .finish()
    }
}

impl<'a, const C: usize> IntoIterator for &'a RingBuffer<C> {
    type Item = &'a Sample;
    type IntoIter = RingIter<'a, C>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Oldest-to-newest iterator over a [`RingBuffer`].
#[derive(Debug, Clone)]
pub struct RingIter<'a, const C: usize> {
    ring: &'a RingBuffer<C>,
    front: usize,
    back: usize,
}

impl<'a, const C: usize> Iterator for RingIter<'a, C> {
    type Item = &'a Sample;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }

        let sample = self.ring.entry(self.front);
        self.front += 1;
        sample
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<const C: usize> DoubleEndedIterator for RingIter<'_, C> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }

        self.back -= 1;
        self.ring.entry(self.back)
    }
}

impl<const C: usize> ExactSizeIterator for RingIter<'_, C> {}

impl<const C: usize> FusedIterator for RingIter<'_, C> {}
