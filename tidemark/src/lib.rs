//! # tidemark
//!
//! Fixed-capacity, multi-resolution map from timestamps to transaction ids.
//!
//! tidemark records `(time, id)` samples where `id` is a monotonically
//! increasing generation counter, and answers "which id was current at or
//! around time `t`?" long after the fact. Recent samples are kept at full
//! resolution; older history survives in sparser day and month tiers. Memory
//! use is fixed at construction: three rings of `C` samples each.
//!
//! ## Key Properties
//!
//! - O(1) record, no allocation after construction
//! - Three tiers with threshold gating (minute, day, month)
//! - Floor and ceiling lookups merged across tiers
//! - Fixed binary layout that can be packed, persisted and restored bit-exact
//!
//! ## Quick Start
//!
//! ```rust
//! use tidemark::{Rounding, TieredStore};
//!
//! let mut store: TieredStore = TieredStore::new();
//! store.record(1_000, 41);
//! store.record(2_000, 42);
//!
//! assert_eq!(store.query(1_500, Rounding::Floor), 41);
//! assert_eq!(store.query(1_500, Rounding::Ceiling), 42);
//! ```
//!
//! ## Modules
//!
//! - [`ring`] — Single-resolution circular buffer of samples
//! - [`store`] — Three-tier store, record gating and query merge
//! - [`config`] — Gating thresholds
//! - [`slab`] — Binary layout and memory-mapped store file
//! - [`error`] — Error types

pub mod config;
pub mod error;
pub mod ring;
pub mod slab;
pub mod store;

// Re-export primary API types at crate root for convenience.
pub use config::Gating;
pub use error::{Result, TidemarkError};
pub use ring::{DEFAULT_CAPACITY, RingBuffer, Sample};
pub use slab::Slab;
pub use store::{Rounding, Tier, TieredStore};
