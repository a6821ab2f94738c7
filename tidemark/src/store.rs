//! Three-tier store mapping timestamps to transaction ids.
//!
//! The store owns three [`RingBuffer`]s of equal capacity:
//!
//! ```text
//! record(t, id) ──► minute tier   every sample
//!               ├─► day tier      t - day.tail_time()   >= gating.day
//!               └─► month tier    t - month.tail_time() >= gating.month
//! ```
//!
//! Recent history stays at full resolution in the minute tier while the day
//! and month tiers keep sparser samples that survive much longer before ring
//! eviction reaches them. Nothing is ever deleted explicitly.
//!
//! # Queries
//!
//! [`TieredStore::query`] searches every tier on its own and merges the three
//! results by id: the largest id wins for [`Rounding::Floor`], the smallest for
//! [`Rounding::Ceiling`]. A tier with no match does not take part. This relies
//! on callers recording ids that never decrease as time advances; with that
//! precondition violated the merged answer is unspecified.
//!
//! # Example
//!
//! ```rust
//! use tidemark::store::{Rounding, TieredStore};
//!
//! let mut store: TieredStore = TieredStore::new();
//! for (time, id) in [(5, 1), (10, 2), (15, 3), (20, 4), (30, 5)] {
//!     store.record(time, id);
//! }
//!
//! assert_eq!(store.query(12, Rounding::Floor), 2);
//! assert_eq!(store.query(12, Rounding::Ceiling), 3);
//! assert_eq!(store.query(31, Rounding::Ceiling), 0); // nothing at or after 31
//! ```

use std::fmt;

use tracing::trace;

use crate::config::Gating;
use crate::ring::{DEFAULT_CAPACITY, RingBuffer, Sample};

/// Direction in which a query snaps to a recorded sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rounding {
    /// Nearest sample at or before the query time.
    Floor,
    /// Nearest sample at or after the query time.
    Ceiling,
}

/// One of the three retention tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Every recorded sample.
    Minute,
    /// Samples at least one day threshold apart.
    Day,
    /// Samples at least one month threshold apart.
    Month,
}

impl Tier {
    /// All tiers, finest first.
    pub const ALL: [Tier; 3] = [Tier::Minute, Tier::Day, Tier::Month];

    /// Lowercase tier name.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Minute => "minute",
            Tier::Day => "day",
            Tier::Month => "month",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-size, three-resolution map from time to transaction id.
///
/// The store is plain data with no interior synchronization. Hosts sharing it
/// between threads must serialize [`record`](Self::record) and
/// [`query`](Self::query) themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TieredStore<const C: usize = DEFAULT_CAPACITY> {
    minutes: RingBuffer<C>,
    days: RingBuffer<C>,
    months: RingBuffer<C>,
    gating: Gating,
}

impl<const C: usize> TieredStore<C> {
    /// Creates an empty store with the default thresholds.
    pub fn new() -> Self {
        Self::with_gating(Gating::DEFAULT)
    }

    /// Creates an empty store with custom thresholds.
    ///
    /// The thresholds are taken as given; call [`Gating::validate`] first when
    /// they come from user input.
    pub fn with_gating(gating: Gating) -> Self {
        Self {
            minutes: RingBuffer::new(),
            days: RingBuffer::new(),
            months: RingBuffer::new(),
            gating,
        }
    }

    /// Reassembles a store from previously saved tiers.
    pub fn from_tiers(
        minutes: RingBuffer<C>,
        days: RingBuffer<C>,
        months: RingBuffer<C>,
        gating: Gating,
    ) -> Self {
        Self {
            minutes,
            days,
            months,
            gating,
        }
    }

    /// Returns the gating thresholds.
    pub fn gating(&self) -> Gating {
        self.gating
    }

    /// Returns the ring backing `tier`.
    pub fn tier(&self, tier: Tier) -> &RingBuffer<C> {
        match tier {
            Tier::Minute => &self.minutes,
            Tier::Day => &self.days,
            Tier::Month => &self.months,
        }
    }

    /// Returns the minute tier.
    pub fn minutes(&self) -> &RingBuffer<C> {
        &self.minutes
    }

    /// Returns the day tier.
    pub fn days(&self) -> &RingBuffer<C> {
        &self.days
    }

    /// Returns the month tier.
    pub fn months(&self) -> &RingBuffer<C> {
        &self.months
    }

    /// Records that transaction `id` was current at `time`.
    ///
    /// The sample always lands in the minute tier. It is also copied into the
    /// day and month tiers when enough time has passed since their newest
    /// sample. A `time` at or before a tier's newest sample is never copied
    /// into that tier.
    ///
    /// An empty coarse tier reports a newest time of `0`, so the first sample
    /// only reaches it once `time` itself is at least the threshold.
    pub fn record(&mut self, time: i64, id: u64) {
        let day_gap = time.saturating_sub(self.days.tail_time());
        let month_gap = time.saturating_sub(self.months.tail_time());

        self.minutes.add(time, id);

        if day_gap >= 0 && day_gap >= self.gating.day {
            trace!(time, id, day_gap, "sample promoted to day tier");
            self.days.add(time, id);
        }

        if month_gap >= 0 && month_gap >= self.gating.month {
            trace!(time, id, month_gap, "sample promoted to month tier");
            self.months.add(time, id);
        }
    }

    /// Returns the id recorded nearest to `tv` in the given direction.
    ///
    /// Returns `0` when no tier holds a matching sample, which callers cannot
    /// tell apart from a genuinely recorded id `0`.
    pub fn query(&self, tv: i64, rounding: Rounding) -> u64 {
        self.query_sample(tv, rounding).map_or(0, |sample| sample.id)
    }

    /// Returns the winning sample for `tv`, or `None` if no tier matches.
    pub fn query_sample(&self, tv: i64, rounding: Rounding) -> Option<Sample> {
        let search = |ring: &RingBuffer<C>| match rounding {
            Rounding::Floor => ring.floor(tv).copied(),
            Rounding::Ceiling => ring.ceiling(tv).copied(),
        };

        let minute = search(&self.minutes);
        let day = search(&self.days);
        let month = search(&self.months);

        merge(merge(day, minute, rounding), month, rounding)
    }
}

/// Picks between two tier results by id. A missing result never wins.
fn merge(a: Option<Sample>, b: Option<Sample>, rounding: Rounding) -> Option<Sample> {
    match (a, b) {
        (Some(a), Some(b)) => Some(match rounding {
            Rounding::Floor if b.id > a.id => b,
            Rounding::Ceiling if b.id < a.id => b,
            _ => a,
        }),
        (a, None) => a,
        (None, b) => b,
    }
}

impl<const C: usize> Default for TieredStore<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Prints every tier oldest first as `time: id` lines.
impl<const C: usize> fmt::Display for TieredStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, ring) in [
            ("Minutes list:", &self.minutes),
            ("Days list:", &self.days),
            ("Months list:", &self.months),
        ] {
            writeln!(f, "{title}")?;
            for sample in ring {
                writeln!(f, "{}: {}", sample.time, sample.id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_gating() -> Gating {
        Gating { day: 100, month: 1_000 }
    }

    #[test]
    fn test_empty_store() {
        let store: TieredStore<8> = TieredStore::new();

        for tier in Tier::ALL {
            assert!(store.tier(tier).is_empty());
        }
        assert_eq!(store.query(0, Rounding::Floor), 0);
        assert_eq!(store.query(0, Rounding::Ceiling), 0);
        assert_eq!(store.query_sample(42, Rounding::Floor), None);
        assert_eq!(store.gating(), Gating::DEFAULT);
    }

    #[test]
    fn test_linear_scenario() {
        let mut store: TieredStore = TieredStore::new();
        for (time, id) in [(5, 1), (10, 2), (15, 3), (20, 4), (30, 5)] {
            store.record(time, id);
        }

        assert_eq!(store.query(10, Rounding::Floor), 2);
        assert_eq!(store.query(10, Rounding::Ceiling), 2);
        assert_eq!(store.query(12, Rounding::Floor), 2);
        assert_eq!(store.query(12, Rounding::Ceiling), 3);

        // Small times never clear the default thresholds.
        assert_eq!(store.minutes().len(), 5);
        assert!(store.days().is_empty());
        assert!(store.months().is_empty());
    }

    #[test]
    fn test_floor_of_latest_insert() {
        let mut store: TieredStore<16> = TieredStore::with_gating(small_gating());
        for i in 1..200i64 {
            let id = i as u64 * 3;
            store.record(i * 37, id);
            assert_eq!(store.query(i * 37, Rounding::Floor), id);
        }
    }

    #[test]
    fn test_day_gating_at_threshold() {
        let mut store: TieredStore<16> = TieredStore::with_gating(small_gating());
        for i in 1..=5i64 {
            store.record(i * 100, i as u64);
        }

        assert_eq!(store.minutes().len(), 5);
        assert_eq!(store.days().len(), 5);
        let day_times: Vec<_> = store.days().iter().map(|s| s.time).collect();
        assert_eq!(day_times, vec![100, 200, 300, 400, 500]);
    }

    #[test]
    fn test_day_gating_below_threshold() {
        let mut store: TieredStore<16> = TieredStore::with_gating(small_gating());
        // First sample clears the threshold against the empty tier, the rest
        // stay within 100 of it.
        for (i, time) in [100i64, 120, 140, 160, 199].into_iter().enumerate() {
            store.record(time, i as u64 + 1);
        }

        assert_eq!(store.minutes().len(), 5);
        assert_eq!(store.days().len(), 1);
        assert_eq!(store.days().tail_time(), 100);

        store.record(200, 6);
        assert_eq!(store.days().len(), 2);
        assert_eq!(store.days().tail_time(), 200);
    }

    #[test]
    fn test_first_sample_below_threshold_skips_coarse_tiers() {
        let mut store: TieredStore<16> = TieredStore::with_gating(small_gating());
        store.record(0, 1);
        store.record(99, 2);

        assert_eq!(store.minutes().len(), 2);
        assert!(store.days().is_empty());
        assert!(store.months().is_empty());
    }

    #[test]
    fn test_month_gating() {
        let mut store: TieredStore<64> = TieredStore::with_gating(small_gating());
        for i in 1..=30i64 {
            store.record(i * 100, i as u64);
        }

        assert_eq!(store.days().len(), 30);
        let month_times: Vec<_> = store.months().iter().map(|s| s.time).collect();
        assert_eq!(month_times, vec![1_000, 2_000, 3_000]);
    }

    #[test]
    fn test_non_monotonic_time_never_readds() {
        let mut store: TieredStore<16> = TieredStore::with_gating(small_gating());
        store.record(1_000, 1);
        assert_eq!(store.days().len(), 1);
        assert_eq!(store.months().len(), 1);

        // Going back in time: negative gap, not added to coarse tiers.
        store.record(500, 2);
        assert_eq!(store.minutes().len(), 2);
        assert_eq!(store.days().len(), 1);
        assert_eq!(store.months().len(), 1);
    }

    #[test]
    fn test_floor_falls_back_to_coarse_tier_after_eviction() {
        let mut store: TieredStore<4> = TieredStore::with_gating(small_gating());
        for i in 0..20i64 {
            store.record(1_000 + i * 10, i as u64 + 1);
        }

        // Minute tier only keeps the last four samples; the day tier still
        // holds every tenth sample.
        assert_eq!(store.minutes().entry(0).map(|s| s.time), Some(1_160));
        assert_eq!(store.query(1_005, Rounding::Floor), 1);
        assert_eq!(store.query(1_105, Rounding::Floor), 11);
        assert_eq!(store.query(1_175, Rounding::Floor), 18);
    }

    #[test]
    fn test_ceiling_prefers_smallest_id() {
        let mut store: TieredStore<4> = TieredStore::with_gating(small_gating());
        for i in 0..20i64 {
            store.record(1_000 + i * 10, i as u64 + 1);
        }

        // The minute tier's oldest retained sample (id 17) loses to the day
        // tier's sample at 1100 (id 11).
        assert_eq!(store.query(1_095, Rounding::Ceiling), 11);
        assert_eq!(store.query(1_170, Rounding::Ceiling), 18);
        assert_eq!(store.query(1_191, Rounding::Ceiling), 0);
    }

    #[test]
    fn test_before_and_after_all_samples() {
        let mut store: TieredStore = TieredStore::new();
        for i in 1..512i64 {
            store.record(5 * i, i as u64);
        }

        assert_eq!(store.query(1, Rounding::Floor), 0);
        assert_eq!(store.query(1, Rounding::Ceiling), 1);
        assert_eq!(store.query(5 * 600, Rounding::Floor), 511);
        assert_eq!(store.query(5 * 600, Rounding::Ceiling), 0);
    }

    #[test]
    fn test_query_sample_returns_time() {
        let mut store: TieredStore<8> = TieredStore::new();
        store.record(10, 1);
        store.record(20, 2);

        assert_eq!(store.query_sample(15, Rounding::Floor), Some(Sample::new(10, 1)));
        assert_eq!(store.query_sample(15, Rounding::Ceiling), Some(Sample::new(20, 2)));
    }

    #[test]
    fn test_merge_absent_is_identity() {
        let a = Some(Sample::new(1, 5));
        let b = Some(Sample::new(2, 9));

        assert_eq!(merge(None, None, Rounding::Floor), None);
        assert_eq!(merge(a, None, Rounding::Floor), a);
        assert_eq!(merge(None, b, Rounding::Ceiling), b);
        assert_eq!(merge(a, b, Rounding::Floor), b);
        assert_eq!(merge(b, a, Rounding::Floor), b);
        assert_eq!(merge(a, b, Rounding::Ceiling), a);
        assert_eq!(merge(b, a, Rounding::Ceiling), a);
    }

    #[test]
    fn test_display_lists_tiers() {
        let mut store: TieredStore<4> = TieredStore::with_gating(small_gating());
        store.record(100, 1);
        store.record(150, 2);

        let text = store.to_string();
        assert_eq!(
            text,
            "Minutes list:\n100: 1\n150: 2\nDays list:\n100: 1\nMonths list:\n"
        );
    }

    #[test]
    fn test_tier_names() {
        let names: Vec<_> = Tier::ALL.iter().map(|t| t.to_string()).collect();
        assert_eq!(names, vec!["minute", "day", "month"]);
    }
}
