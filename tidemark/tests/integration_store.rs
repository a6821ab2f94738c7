//! Integration tests for recording and querying a full-size store.
//!
//! Times are in nanoseconds and use the default gating thresholds, so the
//! day and month tiers only fill when samples are hours apart.

use tidemark::config::{DAY_THRESHOLD_NS, MONTH_THRESHOLD_NS, NANOS_PER_SEC};
use tidemark::{DEFAULT_CAPACITY, Rounding, Tier, TieredStore};

/// Seconds to nanoseconds.
fn secs(s: i64) -> i64 {
    s * NANOS_PER_SEC
}

#[test]
fn test_linear_samples() {
    let samples = [(5, 1), (10, 2), (15, 3), (20, 4), (30, 5)];
    let mut store: TieredStore = TieredStore::new();

    for &(time, id) in &samples {
        store.record(time, id);
        assert_eq!(store.query(time, Rounding::Floor), id);
    }

    for &(time, id) in &samples {
        assert_eq!(store.query(time, Rounding::Floor), id);
        assert_eq!(store.query(time, Rounding::Ceiling), id);
    }

    assert_eq!(store.query(12, Rounding::Floor), 2);
    assert_eq!(store.query(12, Rounding::Ceiling), 3);
    assert_eq!(store.query(4, Rounding::Floor), 0);
    assert_eq!(store.query(31, Rounding::Ceiling), 0);
}

#[test]
fn test_days_tier_outlives_minutes() {
    let mut store: TieredStore = TieredStore::new();

    // Five-minute spacing starting at one day threshold.
    let time_of = |i: i64| secs(5 * i * 60 + 60 * 3600);
    for i in 0..1024i64 {
        store.record(time_of(i), i as u64);
    }

    // Minute tier has evicted everything before sample 512.
    assert_eq!(store.minutes().len(), DEFAULT_CAPACITY);
    assert_eq!(store.minutes().entry(0).map(|s| s.time), Some(time_of(512)));

    // Day tier kept sample 0 and the first sample a full threshold later.
    let day_ids: Vec<_> = store.days().iter().map(|s| s.id).collect();
    assert_eq!(day_ids, vec![0, 720]);
    assert!(store.months().is_empty());

    // Sample 1 is gone from the minute tier; the day tier answers with id 0.
    assert_eq!(store.query(time_of(1), Rounding::Floor), 0);
    assert_eq!(store.query(time_of(1), Rounding::Ceiling), 512);
    assert_eq!(store.query(time_of(800), Rounding::Floor), 800);
}

#[test]
fn test_months_tier_outlives_days() {
    let mut store: TieredStore = TieredStore::new();

    // 61-hour spacing starting at one month threshold.
    let time_of = |i: i64| secs(i * 60 * 3660 + 60 * 3600 * 30);
    for i in 0..1024i64 {
        store.record(time_of(i), i as u64 + 1);
    }

    assert_eq!(store.days().len(), DEFAULT_CAPACITY);
    assert_eq!(store.months().entry(0).map(|s| s.id), Some(1));
    assert_eq!(store.months().entry(2).map(|s| s.id), Some(61));

    assert_eq!(store.query(secs(3600 * 30), Rounding::Floor), 0);
    assert_eq!(store.query(time_of(0), Rounding::Floor), 1);
    assert_eq!(store.query(time_of(0), Rounding::Ceiling), 1);
    assert_eq!(store.query(time_of(60), Rounding::Floor), 61);
    assert_eq!(store.query(time_of(60), Rounding::Ceiling), 61);
    assert_eq!(store.query(time_of(1023), Rounding::Floor), 1024);
    assert_eq!(store.query(time_of(1023), Rounding::Ceiling), 1024);
    assert_eq!(store.query(time_of(2000), Rounding::Floor), 1024);
    assert_eq!(store.query(time_of(2000), Rounding::Ceiling), 0);
}

#[test]
fn test_query_before_first_sample() {
    let mut store: TieredStore = TieredStore::new();
    for i in 1..512i64 {
        store.record(5 * i, i as u64);
    }

    assert_eq!(store.query(1, Rounding::Floor), 0);
    assert_eq!(store.query(1, Rounding::Ceiling), 1);
}

#[test]
fn test_query_after_last_sample() {
    let mut store: TieredStore = TieredStore::new();
    for i in 0..512i64 {
        store.record(5 * i, i as u64);
    }

    assert_eq!(store.query(5120, Rounding::Floor), 511);
    assert_eq!(store.query(5120, Rounding::Ceiling), 0);
}

#[test]
fn test_day_threshold_spacing_fills_day_tier() {
    let mut store: TieredStore = TieredStore::new();
    let n = 10i64;
    for i in 1..=n {
        store.record(i * DAY_THRESHOLD_NS, i as u64);
    }

    assert_eq!(store.minutes().len(), n as usize);
    assert_eq!(store.days().len(), n as usize);
    assert!(store.months().is_empty());

    store.record(MONTH_THRESHOLD_NS, 100);
    assert_eq!(store.months().len(), 1);
}

#[test]
fn test_sub_threshold_spacing_keeps_one_day_sample() {
    let mut store: TieredStore = TieredStore::new();
    let step = DAY_THRESHOLD_NS / 100;
    for i in 0..100i64 {
        store.record(DAY_THRESHOLD_NS + i * step, i as u64 + 1);
    }

    assert_eq!(store.minutes().len(), 100);
    assert_eq!(store.days().len(), 1);
}

#[test]
fn test_minute_tier_eviction_plateaus() {
    let mut store: TieredStore = TieredStore::new();
    for i in 0..1024i64 {
        store.record(1_000 + i, i as u64 + 1);
        let minutes = store.tier(Tier::Minute);
        assert_eq!(minutes.len(), (i as usize + 1).min(DEFAULT_CAPACITY));
        let oldest = (i - DEFAULT_CAPACITY as i64 + 1).max(0);
        assert_eq!(minutes.entry(0).map(|s| s.time), Some(1_000 + oldest));
    }

    assert_eq!(store.minutes().entry(0).map(|s| s.time), Some(1_000 + 512));
}

#[test]
fn test_floor_tracks_every_insert() {
    let mut store: TieredStore = TieredStore::new();
    let mut time = 0i64;
    for id in 1..=2_000u64 {
        // Irregular, strictly increasing gaps that occasionally clear the
        // day threshold.
        time += if id % 97 == 0 { DAY_THRESHOLD_NS } else { secs(7 + (id % 13) as i64) };
        store.record(time, id);
        assert_eq!(store.query(time, Rounding::Floor), id);
        assert_eq!(store.query(time, Rounding::Ceiling), id);
    }
    assert!(store.days().len() > 1);
}
