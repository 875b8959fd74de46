//! Errors reported by sketches and the statistics registry.

use std::collections::BTreeSet;
use std::io;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong in this crate.
///
/// None of these are transient. A failing call leaves the receiver exactly as
/// it was, so there is nothing to retry.
#[derive(Error, Debug)]
pub enum Error {
    /// A quantile was requested from a sketch that has never seen a value.
    #[error("quantile query on an empty sketch")]
    EmptySketch,

    /// The requested quantile is not within `[0, 1]`.
    #[error("quantile {0} is outside [0, 1]")]
    InvalidQuantile(f64),

    /// `insert_range` was handed a window that does not fit the slice.
    #[error("range {offset}+{length} is out of bounds for a slice of {len} values")]
    RangeOutOfBounds {
        /// Start of the requested window.
        offset: usize,
        /// Length of the requested window.
        length: usize,
        /// Length of the slice.
        len: usize,
    },

    /// A deserialized `CircularBuffer` describes a state no sequence of
    /// inserts can reach.
    #[error("inconsistent circular buffer: capacity {capacity}, {len} slots, cursor {cursor}")]
    CorruptBuffer {
        /// Declared capacity.
        capacity: usize,
        /// Number of stored slots.
        len: usize,
        /// Next write position.
        cursor: usize,
    },

    /// One or more registration keys are already taken.
    #[error("found duplicate statistic(s) {0:?}")]
    DuplicateStatistics(Vec<String>),

    /// The host context yielded two statistics with the same full name.
    #[error("duplicate statistic found for '{0}'")]
    DuplicateDiscovery(String),

    /// No operation statistic matched a compound or ratio registration.
    #[error("required operation statistic '{observer}' with tags {tags:?} not found")]
    OperationNotFound {
        /// Observer name that was searched for.
        observer: String,
        /// Tags every match had to carry.
        tags: BTreeSet<String>,
    },

    /// The background driver thread could not be started.
    #[error("failed to spawn registry driver: {0}")]
    Spawn(#[from] io::Error),
}
