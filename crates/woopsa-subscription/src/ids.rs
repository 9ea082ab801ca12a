// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Wrapping identifier sequences.
//!
//! Subscription and notification ids run from a configured minimum to a
//! configured maximum and then wrap back to the minimum. The minimum is at
//! least `1`, so `0` stays free as the reset/acknowledge sentinel.
//!
//! Ages are measured modulo the range span so that an id allocated just
//! after a wrap still counts as newer than one allocated just before it.

use std::fmt;

use parking_lot::Mutex;
use rand::Rng;

use woopsa_core::types::ChannelId;

// =============================================================================
// IdRange
// =============================================================================

/// Inclusive `[min, max]` range that ids cycle through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdRange {
    min: u64,
    max: u64,
}

impl IdRange {
    /// Range used when none is configured.
    pub const DEFAULT: IdRange = IdRange {
        min: 1,
        max: 1_000_000_000,
    };

    /// Creates a range.
    ///
    /// Returns `None` if `min` is `0` or not below `max`.
    pub fn new(min: u64, max: u64) -> Option<Self> {
        (min >= 1 && min < max).then_some(Self { min, max })
    }

    /// The smallest id.
    pub fn min(&self) -> u64 {
        self.min
    }

    /// The largest id.
    pub fn max(&self) -> u64 {
        self.max
    }

    /// Number of distinct ids.
    pub fn span(&self) -> u64 {
        self.max - self.min + 1
    }

    /// The id following `id`. Values outside the range restart at `min`.
    pub fn successor(&self, id: u64) -> u64 {
        if id < self.min || id >= self.max {
            self.min
        } else {
            id + 1
        }
    }

    /// Wraparound-aware distance from `origin` to `id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use woopsa_subscription::IdRange;
    ///
    /// let range = IdRange::new(1, 10).unwrap();
    /// assert_eq!(range.age(5, 2), 3);
    /// // 2 comes after 9 once the sequence wrapped past 10
    /// assert_eq!(range.age(2, 9), 3);
    /// ```
    pub fn age(&self, id: u64, origin: u64) -> u64 {
        let span = i128::from(self.span());
        let diff = i128::from(id) - i128::from(origin);
        // rem_euclid of a value in [0, span) always fits back into u64
        u64::try_from(diff.rem_euclid(span)).unwrap_or(0)
    }
}

impl Default for IdRange {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

// =============================================================================
// WrappingIdSequence
// =============================================================================

/// A monotonic id counter that wraps within an [`IdRange`].
///
/// Not synchronized; owners guard it with their own lock.
#[derive(Debug, Clone)]
pub struct WrappingIdSequence {
    range: IdRange,
    last: u64,
}

impl WrappingIdSequence {
    /// Creates a sequence whose first id is `range.min()`.
    pub fn new(range: IdRange) -> Self {
        Self { range, last: 0 }
    }

    /// Creates a sequence that continues after `last`.
    pub fn starting_after(range: IdRange, last: u64) -> Self {
        Self { range, last }
    }

    /// Allocates the next id.
    pub fn next_id(&mut self) -> u64 {
        self.last = self.range.successor(self.last);
        self.last
    }

    /// The most recently allocated id, or `0` if none was allocated yet.
    pub fn last(&self) -> u64 {
        self.last
    }

    /// The range this sequence cycles through.
    pub fn range(&self) -> IdRange {
        self.range
    }
}

// =============================================================================
// ChannelIdGenerator
// =============================================================================

/// Hands out channel ids from a random starting point.
///
/// One generator is shared by every service in the process. Starting at a
/// random point makes it unlikely that a restarted server reissues an id a
/// client still holds, so stale calls fail as invalid rather than landing
/// on someone else's channel.
pub struct ChannelIdGenerator {
    sequence: Mutex<WrappingIdSequence>,
}

impl ChannelIdGenerator {
    /// Range channel ids are drawn from.
    pub const RANGE: IdRange = IdRange {
        min: 1,
        max: i32::MAX as u64,
    };

    /// Creates a generator seeded from the thread RNG.
    pub fn new() -> Self {
        let seed = rand::thread_rng().gen_range(Self::RANGE.min()..=Self::RANGE.max());
        Self::with_seed(seed)
    }

    /// Creates a generator whose first id follows `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            sequence: Mutex::new(WrappingIdSequence::starting_after(Self::RANGE, seed)),
        }
    }

    /// Allocates the next channel id.
    pub fn next_id(&self) -> ChannelId {
        ChannelId::new(self.sequence.lock().next_id())
    }
}

impl Default for ChannelIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelIdGenerator")
            .field("last", &self.sequence.lock().last())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_range_validation() {
        assert!(IdRange::new(0, 10).is_none());
        assert!(IdRange::new(5, 5).is_none());
        assert!(IdRange::new(1, 2).is_some());
    }

    #[test]
    fn test_sequence_wraps_and_skips_zero() {
        let mut seq = WrappingIdSequence::new(IdRange::new(1, 3).unwrap());
        let ids: Vec<_> = (0..7).map(|_| seq.next_id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn test_sequence_with_higher_min() {
        let mut seq = WrappingIdSequence::new(IdRange::new(10, 11).unwrap());
        assert_eq!(seq.next_id(), 10);
        assert_eq!(seq.next_id(), 11);
        assert_eq!(seq.next_id(), 10);
    }

    #[test]
    fn test_age_across_wrap() {
        let range = IdRange::new(1, 100).unwrap();
        assert_eq!(range.age(100, 99), 1);
        assert_eq!(range.age(1, 100), 1);
        assert_eq!(range.age(3, 99), 4);
        assert_eq!(range.age(7, 7), 0);
        assert_eq!(range.age(5, 0), 5);
    }

    #[test]
    fn test_channel_ids_unique_under_contention() {
        let generator = Arc::new(ChannelIdGenerator::with_seed(1_000));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                std::thread::spawn(move || (0..500).map(|_| generator.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
                assert_ne!(id.get(), 0);
            }
        }
        assert_eq!(seen.len(), 4_000);
    }

    #[test]
    fn test_channel_ids_wrap_at_range_end() {
        let generator = ChannelIdGenerator::with_seed(ChannelIdGenerator::RANGE.max());
        assert_eq!(generator.next_id(), ChannelId::new(1));
    }

    #[test]
    fn test_random_seed_in_range() {
        let id = ChannelIdGenerator::new().next_id().get();
        assert!(id >= 1 && id <= ChannelIdGenerator::RANGE.max());
    }
}
