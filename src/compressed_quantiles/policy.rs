//! Error policies decide how much rank error each part of the summary may
//! carry.
//!
//! The sketch asks its policy for `f(r, n)`, the allowable error at rank `r`
//! after `n` observations. Merging happens only while the merged entry stays
//! within `f`, and queries widen their search window by `f / 2`. A policy that
//! is small at some rank keeps that part of the distribution accurate.
//!
//! Policies must be deterministic and return the same answer for the same
//! `(r, n)`. Nothing is validated; a policy returning zero everywhere simply
//! turns compression off.

/// The allowable-error function of a `CompressedQuantiles`.
///
/// Any `Fn(u64, u64) -> u64` closure is a policy, which is handy for tests and
/// one-off shapes:
///
/// ```
/// use statkeeper::CompressedQuantiles;
///
/// let mut exact = CompressedQuantiles::new(|_rank: u64, _total: u64| 0);
/// exact.insert(&mut [5, 1, 3, 2, 4]);
/// assert_eq!(exact.query(0.5).unwrap(), 3);
/// ```
pub trait ErrorPolicy {
    /// Allowable rank error at `rank` after `total` observations.
    fn allowable_error(&self, rank: u64, total: u64) -> u64;
}

impl<F> ErrorPolicy for F
where
    F: Fn(u64, u64) -> u64,
{
    fn allowable_error(&self, rank: u64, total: u64) -> u64 {
        self(rank, total)
    }
}

// floor(2 * error * x), with no floor of one: a zero bound forbids merging and
// keeps those ranks exact.
fn bound(error: f64, x: u64) -> u64 {
    (2.0 * error * (x as f64)).floor() as u64
}

/// Clamp a user supplied error into `(0, 1)`.
fn clamp(epsilon: f64) -> f64 {
    if !(epsilon > 0.000_000_000_1) {
        0.000_000_000_1
    } else if epsilon >= 1.0 {
        0.99
    } else {
        epsilon
    }
}

/// The "full biased" policy: `f(r, n) = 2εr`.
///
/// Error grows with rank, so low quantiles are the most precise. This is the
/// natural choice for latencies measured as time-to-first-byte and the like,
/// where the interesting tail is at the bottom.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct LowBiased {
    epsilon: f64,
}

impl LowBiased {
    /// Build the policy. `epsilon` is clamped into `(0, 1)`.
    pub fn new(epsilon: f64) -> LowBiased {
        LowBiased {
            epsilon: clamp(epsilon),
        }
    }

    /// The relative error in effect.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ErrorPolicy for LowBiased {
    fn allowable_error(&self, rank: u64, _total: u64) -> u64 {
        bound(self.epsilon, rank)
    }
}

/// The mirror of `LowBiased`: `f(r, n) = 2ε(n - r)`.
///
/// High quantiles (p99, p999) are the most precise.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct HighBiased {
    epsilon: f64,
}

impl HighBiased {
    /// Build the policy. `epsilon` is clamped into `(0, 1)`.
    pub fn new(epsilon: f64) -> HighBiased {
        HighBiased {
            epsilon: clamp(epsilon),
        }
    }

    /// The relative error in effect.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ErrorPolicy for HighBiased {
    fn allowable_error(&self, rank: u64, total: u64) -> u64 {
        bound(self.epsilon, total.saturating_sub(rank))
    }
}

/// Uniform error `f(r, n) = 2εn`, the Greenwald-Khanna guarantee.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct Uniform {
    epsilon: f64,
}

impl Uniform {
    /// Build the policy. `epsilon` is clamped into `(0, 1)`.
    pub fn new(epsilon: f64) -> Uniform {
        Uniform {
            epsilon: clamp(epsilon),
        }
    }

    /// The relative error in effect.
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl ErrorPolicy for Uniform {
    fn allowable_error(&self, _rank: u64, total: u64) -> u64 {
        bound(self.epsilon, total)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn small_ranks_are_exact() {
        assert_eq!(0, LowBiased::new(0.01).allowable_error(0, 0));
        assert_eq!(0, LowBiased::new(0.01).allowable_error(49, 1000));
        assert_eq!(0, HighBiased::new(0.01).allowable_error(100, 100));
        assert_eq!(0, Uniform::new(0.01).allowable_error(0, 10));
        assert_eq!(1, LowBiased::new(0.01).allowable_error(50, 1000));
    }

    #[test]
    fn shapes() {
        let low = LowBiased::new(0.1);
        assert_eq!(20, low.allowable_error(100, 1000));
        assert_eq!(200, low.allowable_error(1000, 1000));

        let high = HighBiased::new(0.1);
        assert_eq!(180, high.allowable_error(100, 1000));
        assert_eq!(0, high.allowable_error(1000, 1000));
        assert_eq!(0, high.allowable_error(1200, 1000));

        let uniform = Uniform::new(0.1);
        assert_eq!(200, uniform.allowable_error(1, 1000));
        assert_eq!(200, uniform.allowable_error(999, 1000));
    }

    #[test]
    fn epsilon_is_clamped() {
        assert_eq!(0.99, LowBiased::new(7.0).epsilon());
        assert_eq!(0.000_000_000_1, Uniform::new(-1.0).epsilon());
        assert_eq!(0.000_000_000_1, HighBiased::new(f64::NAN).epsilon());
        assert_eq!(0.25, LowBiased::new(0.25).epsilon());
    }

    quickcheck! {
        fn low_biased_grows_with_rank(a: u32, b: u32, total: u32) -> bool {
            let policy = LowBiased::new(0.01);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            policy.allowable_error(u64::from(lo), u64::from(total))
                <= policy.allowable_error(u64::from(hi), u64::from(total))
        }

        fn high_biased_mirrors_low_biased(rank: u32, extra: u32) -> bool {
            let total = u64::from(rank) + u64::from(extra);
            HighBiased::new(0.05).allowable_error(u64::from(rank), total)
                == LowBiased::new(0.05).allowable_error(u64::from(extra), total)
        }
    }

    #[test]
    fn closures_are_policies() {
        let policy = |rank: u64, total: u64| rank + total;
        assert_eq!(7, policy.allowable_error(3, 4));
    }
}
