use std::cmp;
use std::fmt;

/// One entry of the sketch's summary.
///
/// A sample stands in for `size` observations whose largest member is
/// `value`. `delta` is the uncertainty on the rank of `value`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct Sample<T> {
    /// The observed value this entry represents.
    pub value: T,
    /// Observations folded into this entry ("g" in the paper).
    pub size: u64,
    /// Rank uncertainty of `value` ("Δ" in the paper).
    pub delta: u64,
}

impl<T> Sample<T> {
    pub(crate) fn new(value: T, size: u64, delta: u64) -> Sample<T> {
        Sample { value, size, delta }
    }
}

// Samples order by value alone. Two entries with equal values but different
// bookkeeping sit next to each other in the summary and compare equal.
impl<T> PartialEq for Sample<T>
where
    T: PartialEq,
{
    fn eq(&self, other: &Sample<T>) -> bool {
        self.value == other.value
    }
}

impl<T> PartialOrd for Sample<T>
where
    T: PartialOrd,
{
    fn partial_cmp(&self, other: &Sample<T>) -> Option<cmp::Ordering> {
        self.value.partial_cmp(&other.value)
    }
}

impl<T> fmt::Display for Sample<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "sample:{}(x{})(e={})", self.value, self.size, self.delta)
    }
}
