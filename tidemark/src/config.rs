//! Gating thresholds for the coarse tiers.
//!
//! A sample recorded into the minute tier is copied into the day tier when at
//! least `day` nanoseconds have passed since the day tier's newest sample, and
//! into the month tier likewise with `month`. The thresholds are plain
//! durations, not calendar boundaries.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Default day-tier threshold: 60 × 3600 seconds, in nanoseconds.
pub const DAY_THRESHOLD_NS: i64 = 60 * 3600 * NANOS_PER_SEC;

/// Default month-tier threshold: 30 day thresholds, in nanoseconds.
pub const MONTH_THRESHOLD_NS: i64 = 30 * DAY_THRESHOLD_NS;

/// Minimum elapsed time before a sample is also kept in a coarser tier.
///
/// # Example
///
/// ```rust
/// use tidemark::config::{Gating, NANOS_PER_SEC};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let gating = Gating::new(60 * NANOS_PER_SEC, 3600 * NANOS_PER_SEC)?;
/// assert_eq!(gating.day, 60 * NANOS_PER_SEC);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gating {
    /// Day-tier threshold in nanoseconds.
    pub day: i64,
    /// Month-tier threshold in nanoseconds.
    pub month: i64,
}

impl Gating {
    /// The thresholds used by [`TieredStore::new`](crate::store::TieredStore::new).
    pub const DEFAULT: Self = Self {
        day: DAY_THRESHOLD_NS,
        month: MONTH_THRESHOLD_NS,
    };

    /// Creates validated gating thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if either threshold is not positive or the month
    /// threshold is smaller than the day threshold.
    pub fn new(day: i64, month: i64) -> Result<Self> {
        let gating = Self { day, month };
        gating.validate()?;
        Ok(gating)
    }

    /// Creates gating thresholds from whole seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] under the same conditions as [`Gating::new`].
    pub fn from_secs(day_secs: i64, month_secs: i64) -> Result<Self> {
        Self::new(
            day_secs.saturating_mul(NANOS_PER_SEC),
            month_secs.saturating_mul(NANOS_PER_SEC),
        )
    }

    /// Validates the thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if validation fails.
    pub fn validate(&self) -> Result<()> {
        if self.day <= 0 {
            return Err(ConfigError::NonPositiveThreshold {
                tier: "day",
                value: self.day,
            }
            .into());
        }

        if self.month <= 0 {
            return Err(ConfigError::NonPositiveThreshold {
                tier: "month",
                value: self.month,
            }
            .into());
        }

        if self.month < self.day {
            return Err(ConfigError::ThresholdsNotOrdered {
                day: self.day,
                month: self.month,
            }
            .into());
        }

        Ok(())
    }
}

impl Default for Gating {
    fn default() -> Self {
        Self::DEFAULT
    }
}
