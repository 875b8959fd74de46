use std::fmt;

use tracing::trace;

use super::policy::ErrorPolicy;
use super::sample::Sample;

/// The sorted summary S(n) together with n.
///
/// A plain `Vec` holds the samples. Insertion is linear in the number of
/// retained samples but the summary stays small and cache friendly, which
/// beats a linked list in practice.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct Store<T> {
    samples: Vec<Sample<T>>,
    n: u64, // total values ever inserted
}

impl<T> Store<T>
where
    T: Copy + Ord + fmt::Debug,
{
    pub fn new() -> Store<T> {
        Store {
            samples: Vec::new(),
            n: 0,
        }
    }

    /// Insert an ascending run of values.
    ///
    /// The scan position carries over from one value to the next, so a batch
    /// costs a single pass over the summary.
    pub fn insert_sorted(&mut self, values: &[T]) {
        let mut cursor = 0;
        for &value in values {
            // Stop on the first sample that is not below the value. Equal
            // values go in front of the existing entry.
            while cursor < self.samples.len() && self.samples[cursor].value < value {
                cursor += 1;
            }

            let sample = if cursor > 0 && cursor < self.samples.len() {
                let succ = &self.samples[cursor];
                Sample::new(value, 1, succ.size + succ.delta - 1)
            } else {
                Sample::new(value, 1, 0)
            };
            self.samples.insert(cursor, sample);
            cursor += 1;
            self.n += 1;
        }
    }

    /// Merge adjacent samples whose combined error fits the policy.
    ///
    /// The minimum is never merged away. After a merge the scan stays on the
    /// merged sample so that runs of small entries collapse in one pass.
    pub fn compress<P>(&mut self, policy: &P)
    where
        P: ErrorPolicy,
    {
        if self.samples.len() < 2 {
            return;
        }
        let before = self.samples.len();

        let mut cur = 1;
        let mut rank = self.samples[cur].size;
        while cur + 1 < self.samples.len() {
            let nxt = self.samples[cur + 1];
            let allowable = policy.allowable_error(rank, self.n);
            if self.samples[cur].size + nxt.size + nxt.delta <= allowable {
                let merged = Sample::new(nxt.value, self.samples[cur].size + nxt.size, nxt.delta);
                self.samples[cur] = merged;
                self.samples.remove(cur + 1);
            } else {
                cur += 1;
            }
            rank += nxt.size;
        }

        trace!(
            total = self.n,
            before,
            after = self.samples.len(),
            "compressed quantile summary"
        );
    }

    /// Walk the summary for the value at quantile `q`.
    ///
    /// Returns `None` only when the summary is empty.
    pub fn query<P>(&self, q: f64, policy: &P) -> Option<T>
    where
        P: ErrorPolicy,
    {
        let first = self.samples.first()?;

        let target = (q * (self.n as f64)).ceil() as u64;
        let error = policy.allowable_error(target, self.n);
        let threshold = target + error / 2 + error % 2;

        let mut prev = first;
        let mut rank = prev.size;
        for cur in &self.samples[1..] {
            if rank + cur.size + cur.delta > threshold {
                return Some(prev.value);
            }
            prev = cur;
            rank += prev.size;
        }
        Some(prev.value)
    }
}

impl<T> Store<T> {
    pub fn samples(&self) -> &[Sample<T>] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total values ever inserted. Never decreases.
    pub fn count(&self) -> u64 {
        self.n
    }
}
