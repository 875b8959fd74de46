//! This crate keeps live statistics about a running program in a moderate
//! amount of memory.
//!
//! Two small engines do the real work. [`CircularBuffer`] retains the last few
//! samples of a value for history display, and [`CompressedQuantiles`]
//! summarizes an unbounded stream of integers so that quantiles can be asked
//! for at any time with a bounded rank error. Around them the [`registry`]
//! module registers counters, sizes, compound operation rates and ratios
//! found in a host context, samples them periodically and switches off the
//! ones nobody reads.
//!
//! # Examples
//!
//! ```
//! use statkeeper::{CircularBuffer, CompressedQuantiles, LowBiased};
//!
//! let mut history = CircularBuffer::new(2);
//! assert_eq!(history.insert("a"), None);
//! assert_eq!(history.insert("b"), None);
//! assert_eq!(history.insert("c"), Some("a"));
//! assert_eq!(history.to_vec(), vec!["b", "c"]);
//!
//! let mut latencies = CompressedQuantiles::new(LowBiased::new(0.01));
//! let mut batch: Vec<i64> = (1..=100).rev().collect();
//! latencies.insert(&mut batch);
//! assert_eq!(latencies.count(), 100);
//! assert_eq!(latencies.query(0.0).unwrap(), 1);
//! assert_eq!(latencies.query(1.0).unwrap(), 100);
//! ```
#![deny(missing_docs, missing_copy_implementations, missing_debug_implementations,
        unstable_features, unused_import_braces)]

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod circular_buffer;
pub mod compressed_quantiles;
pub mod error;
pub mod registry;
pub mod time;

pub use circular_buffer::CircularBuffer;
pub use compressed_quantiles::{CompressedQuantiles, ErrorPolicy, HighBiased, LowBiased, Sample,
                               SharedQuantiles, Uniform};
pub use error::{Error, Result};
pub use registry::{RegistryConfig, RegistryDriver, StatisticsRegistry};
pub use time::{Clock, ManualClock, SystemClock};
