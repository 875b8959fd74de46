//! This is an implementation of the algorithm presented in Cormode, Korn,
//! Muthukrishnan, Srivastava's paper "Effective Computation of Biased Quantiles
//! over Data Streams". The ambition here is to approximate quantiles on a
//! stream of integers without keeping the stream in memory.
//!
//! The shape of the error guarantee is not fixed. Each sketch is built with an
//! [`ErrorPolicy`], the paper's `f(r, n)`, which says how much rank error is
//! tolerable at rank `r` after `n` observations. [`LowBiased`] is the paper's
//! "full biased" invariant; [`HighBiased`] and [`Uniform`] are provided for
//! upper-tail and Greenwald-Khanna style guarantees, and any closure works as
//! well.
//!
//! Values arrive in batches. A batch is sorted, merged into the summary in one
//! pass and followed by a single COMPRESS pass.
use std::fmt;

use parking_lot::Mutex;

use crate::error::{Error, Result};

mod policy;
mod sample;
mod store;

pub use self::policy::{ErrorPolicy, HighBiased, LowBiased, Uniform};
pub use self::sample::Sample;

use self::store::Store;

/// A structure to provide approximate quantile queries in bounded memory and
/// with a bounded, policy defined error.
///
/// Mutation takes `&mut self`; wrap the sketch in a [`SharedQuantiles`] to
/// share it between threads.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressedQuantiles<T, P> {
    policy: P,
    samples: Store<T>,
}

impl<T, P> CompressedQuantiles<T, P>
where
    T: Copy + Ord + fmt::Debug,
    P: ErrorPolicy,
{
    /// Create an empty sketch governed by `policy`.
    ///
    /// # Examples
    /// ```
    /// use statkeeper::{CompressedQuantiles, LowBiased};
    ///
    /// let sketch = CompressedQuantiles::<i64, _>::new(LowBiased::new(0.001));
    /// assert_eq!(sketch.count(), 0);
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(policy: P) -> CompressedQuantiles<T, P> {
        CompressedQuantiles {
            policy,
            samples: Store::new(),
        }
    }

    /// Insert a batch of values.
    ///
    /// The slice is sorted in place before insertion; callers must not rely
    /// on its order afterwards. The summary is compressed once the whole batch
    /// is in.
    ///
    /// # Examples
    /// ```
    /// use statkeeper::{CompressedQuantiles, LowBiased};
    ///
    /// let mut sketch = CompressedQuantiles::new(LowBiased::new(0.01));
    /// let mut batch = vec![3, 1, 2];
    /// sketch.insert(&mut batch);
    /// assert_eq!(batch, vec![1, 2, 3]);
    /// assert_eq!(sketch.count(), 3);
    /// ```
    pub fn insert(&mut self, values: &mut [T]) {
        values.sort_unstable();
        self.samples.insert_sorted(values);
        self.compress();
    }

    /// Insert `length` values of `values` starting at `offset`.
    ///
    /// Only that window is sorted and inserted. A window that does not fit
    /// the slice is rejected and nothing is inserted.
    pub fn insert_range(&mut self, values: &mut [T], offset: usize, length: usize) -> Result<()> {
        let len = values.len();
        match offset.checked_add(length) {
            Some(end) if end <= len => {
                self.insert(&mut values[offset..end]);
                Ok(())
            }
            _ => Err(Error::RangeOutOfBounds {
                offset,
                length,
                len,
            }),
        }
    }

    /// Query the sketch for the value at quantile `phi`.
    ///
    /// The answer is always a value that was actually inserted. Its rank is
    /// within `f(⌈φn⌉, n) / 2` of `⌈φn⌉` where `f` is the sketch's policy.
    /// Querying an empty sketch is an error, as is a `phi` outside `[0, 1]`.
    ///
    /// # Examples
    /// ```
    /// use statkeeper::{CompressedQuantiles, Error, LowBiased};
    ///
    /// let mut sketch = CompressedQuantiles::new(LowBiased::new(0.0001));
    /// assert!(matches!(sketch.query(0.5), Err(Error::EmptySketch)));
    ///
    /// let mut batch: Vec<i64> = (1..1001).collect();
    /// sketch.insert(&mut batch);
    /// assert_eq!(sketch.query(0.0).unwrap(), 1);
    /// assert_eq!(sketch.query(0.5).unwrap(), 500);
    /// assert_eq!(sketch.query(1.0).unwrap(), 1000);
    /// ```
    pub fn query(&self, phi: f64) -> Result<T> {
        if !(0.0..=1.0).contains(&phi) {
            return Err(Error::InvalidQuantile(phi));
        }
        self.samples.query(phi, &self.policy).ok_or(Error::EmptySketch)
    }

    fn compress(&mut self) {
        self.samples.compress(&self.policy);
    }
}

impl<T, P> CompressedQuantiles<T, P> {
    /// Total number of values ever inserted.
    ///
    /// This is _not_ the number of samples retained, see `len`.
    pub fn count(&self) -> u64 {
        self.samples.count()
    }

    /// Number of samples currently retained. Fluctuates with compression.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True until the first value is inserted.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The retained samples, ascending by value.
    pub fn samples(&self) -> &[Sample<T>] {
        self.samples.samples()
    }

    /// The error policy this sketch was built with.
    pub fn policy(&self) -> &P {
        &self.policy
    }
}

impl<T, P> fmt::Display for CompressedQuantiles<T, P>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Total Values : {} Samples : {} -- [", self.count(), self.len())?;
        for (i, sample) in self.samples().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", sample)?;
        }
        f.write_str("]")
    }
}

/// A `CompressedQuantiles` behind a mutex.
///
/// Every method locks, so inserts, queries and compression never interleave.
/// Share it with an `Arc`.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use statkeeper::{SharedQuantiles, Uniform};
///
/// let sketch = Arc::new(SharedQuantiles::new(Uniform::new(0.01)));
/// let workers: Vec<_> = (0..4i64)
///     .map(|w| {
///         let sketch = Arc::clone(&sketch);
///         thread::spawn(move || {
///             let mut batch: Vec<i64> = (0..250).map(|i| w * 250 + i).collect();
///             sketch.insert(&mut batch);
///         })
///     })
///     .collect();
/// for worker in workers {
///     worker.join().unwrap();
/// }
/// assert_eq!(sketch.count(), 1000);
/// ```
#[derive(Debug)]
pub struct SharedQuantiles<T, P> {
    inner: Mutex<CompressedQuantiles<T, P>>,
}

impl<T, P> SharedQuantiles<T, P>
where
    T: Copy + Ord + fmt::Debug,
    P: ErrorPolicy,
{
    /// Create an empty shared sketch governed by `policy`.
    pub fn new(policy: P) -> SharedQuantiles<T, P> {
        SharedQuantiles {
            inner: Mutex::new(CompressedQuantiles::new(policy)),
        }
    }

    /// See `CompressedQuantiles::insert`.
    pub fn insert(&self, values: &mut [T]) {
        self.inner.lock().insert(values)
    }

    /// See `CompressedQuantiles::query`.
    pub fn query(&self, phi: f64) -> Result<T> {
        self.inner.lock().query(phi)
    }

    /// See `CompressedQuantiles::count`.
    pub fn count(&self) -> u64 {
        self.inner.lock().count()
    }

    /// A point in time copy of the underlying sketch.
    pub fn snapshot(&self) -> CompressedQuantiles<T, P>
    where
        P: Clone,
    {
        self.inner.lock().clone()
    }

    /// Unwrap the underlying sketch.
    pub fn into_inner(self) -> CompressedQuantiles<T, P> {
        self.inner.into_inner()
    }
}

impl<T, P> From<CompressedQuantiles<T, P>> for SharedQuantiles<T, P> {
    fn from(sketch: CompressedQuantiles<T, P>) -> SharedQuantiles<T, P> {
        SharedQuantiles {
            inner: Mutex::new(sketch),
        }
    }
}
