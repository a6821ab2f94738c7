//! Error types for the tidemark store.
//!
//! The in-memory core (`ring` and `store`) is total and never returns these.
//! They cover threshold configuration and the persisted binary layout.

use thiserror::Error;

/// The main error type for all fallible tidemark operations.
#[derive(Error, Debug)]
pub enum TidemarkError {
    /// Error validating gating configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Error packing, unpacking, or persisting the binary layout.
    #[error("slab error: {0}")]
    Slab(#[from] SlabError),
}

/// Errors that can occur when validating gating thresholds.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A threshold is zero or negative.
    #[error("{tier} threshold must be positive, got {value}ns")]
    NonPositiveThreshold {
        /// Which tier the threshold belongs to.
        tier: &'static str,
        /// The rejected value in nanoseconds.
        value: i64,
    },

    /// The month threshold is finer than the day threshold.
    #[error("month threshold {month}ns is smaller than day threshold {day}ns")]
    ThresholdsNotOrdered {
        /// Day threshold in nanoseconds.
        day: i64,
        /// Month threshold in nanoseconds.
        month: i64,
    },
}

/// Errors that can occur in the binary layout and the store file.
#[derive(Error, Debug)]
pub enum SlabError {
    /// The buffer handed to pack/unpack has the wrong size.
    #[error("buffer is {actual} bytes, layout needs {expected}")]
    BufferSize {
        /// Bytes required by the layout.
        expected: usize,
        /// Bytes actually provided.
        actual: usize,
    },

    /// A tier block carries bookkeeping that cannot describe a valid ring.
    #[error("invalid tier block (head {head}, tail {tail}, length {length}, capacity {capacity})")]
    InvalidTier {
        /// Stored head index.
        head: u64,
        /// Stored tail index.
        tail: u64,
        /// Stored length.
        length: u64,
        /// Capacity the block was decoded against.
        capacity: usize,
    },

    /// The file was written for a different ring capacity.
    #[error("capacity mismatch: file has {found}, expected {expected}")]
    CapacityMismatch {
        /// Capacity recorded in the file header.
        found: u32,
        /// Capacity of the store being loaded.
        expected: usize,
    },

    /// The file header or size is invalid.
    #[error("store file '{path}' is corrupted: {reason}")]
    Corrupted {
        /// The store file path.
        path: String,
        /// Description of the corruption.
        reason: String,
    },

    /// Failed to open, create, or map the store file.
    #[error("failed to access store file '{path}': {source}")]
    Io {
        /// The store file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush the mapping to disk.
    #[error("failed to sync store file '{path}' to disk: {source}")]
    SyncFailed {
        /// The store file path.
        path: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Type alias for `Result<T, TidemarkError>`.
pub type Result<T> = std::result::Result<T, TidemarkError>;
