//! Statistics that sample themselves into a bounded history while someone is
//! looking at them.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::circular_buffer::CircularBuffer;
use crate::registry::context::ValueStatistic;
use crate::time::Clock;

/// A value paired with the time it was read.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamped<T> {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// The sampled value.
    pub value: T,
}

#[derive(Debug)]
struct State<T> {
    history: CircularBuffer<Timestamped<T>>,
    touched: u64,
    active: bool,
    always_on: bool,
}

/// A statistic that records history only while it is in use.
///
/// Reading the value or the history "touches" the statistic, which activates
/// sampling. The registry periodically calls [`expire`](Self::expire) to switch
/// off statistics nobody has touched for a while, unless they are always-on.
/// History survives deactivation and picks up again on the next touch.
pub struct ExpiringSampledStatistic<T> {
    source: Arc<dyn ValueStatistic<T>>,
    clock: Arc<dyn Clock>,
    state: Mutex<State<T>>,
}

impl<T> ExpiringSampledStatistic<T>
where
    T: Copy,
{
    /// Wrap `source`, keeping up to `history_size` samples. The statistic
    /// starts inactive.
    pub fn new(
        source: Arc<dyn ValueStatistic<T>>,
        clock: Arc<dyn Clock>,
        history_size: usize,
    ) -> ExpiringSampledStatistic<T> {
        ExpiringSampledStatistic {
            source,
            clock,
            state: Mutex::new(State {
                history: CircularBuffer::new(history_size),
                touched: 0,
                active: false,
                always_on: false,
            }),
        }
    }

    /// Read the source directly. Touches the statistic.
    pub fn value(&self) -> T {
        self.touch();
        self.source.value()
    }

    /// The retained samples, oldest first. Touches the statistic.
    pub fn history(&self) -> Vec<Timestamped<T>> {
        self.touch();
        self.state.lock().history.to_vec()
    }

    /// Record one sample if the statistic is active.
    ///
    /// Returns the sampled value, or `None` when inactive.
    pub fn sample(&self) -> Option<T> {
        let mut state = self.state.lock();
        if !state.active {
            return None;
        }
        let value = self.source.value();
        state.history.insert(Timestamped {
            timestamp: self.clock.now_millis(),
            value,
        });
        Some(value)
    }

    /// Deactivate if untouched since `threshold` milliseconds.
    ///
    /// Returns true when the statistic is (now) expired. An always-on
    /// statistic never expires.
    pub fn expire(&self, threshold: u64) -> bool {
        let mut state = self.state.lock();
        if state.always_on {
            return false;
        }
        if state.touched < threshold {
            if state.active {
                state.active = false;
                debug!(touched = state.touched, threshold, "sampled statistic expired");
            }
            true
        } else {
            false
        }
    }

    /// Pin the statistic on, or release it to normal expiry.
    pub fn set_always_on(&self, enabled: bool) {
        let mut state = self.state.lock();
        state.always_on = enabled;
        if enabled {
            state.active = true;
        }
    }

    /// Whether samples are currently being recorded.
    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub(crate) fn touch(&self) {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        state.touched = now;
        if !state.active {
            state.active = true;
            debug!(now, "sampled statistic activated");
        }
    }
}

impl<T> fmt::Debug for ExpiringSampledStatistic<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ExpiringSampledStatistic")
            .field("active", &state.active)
            .field("always_on", &state.always_on)
            .field("touched", &state.touched)
            .field("history", &state.history.len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn fixture(history: usize) -> (Arc<AtomicI64>, Arc<ManualClock>, ExpiringSampledStatistic<i64>) {
        let value = Arc::new(AtomicI64::new(0));
        let clock = Arc::new(ManualClock::new(1_000));
        let source = {
            let value = Arc::clone(&value);
            move || value.load(Ordering::SeqCst)
        };
        let stat = ExpiringSampledStatistic::new(Arc::new(source), clock.clone(), history);
        (value, clock, stat)
    }

    #[test]
    fn inactive_until_touched() {
        let (_, _, stat) = fixture(4);
        assert!(!stat.is_active());
        assert_eq!(None, stat.sample());
        assert!(stat.history().is_empty());
        assert!(stat.is_active());
    }

    #[test]
    fn samples_are_timestamped() {
        let (value, clock, stat) = fixture(2);
        stat.value();
        for i in 1..4 {
            value.store(i * 10, Ordering::SeqCst);
            clock.set(1_000 * i as u64);
            assert_eq!(Some(i * 10), stat.sample());
        }
        assert_eq!(
            vec![
                Timestamped { timestamp: 2_000, value: 20 },
                Timestamped { timestamp: 3_000, value: 30 },
            ],
            stat.history()
        );
    }

    #[test]
    fn expiry() {
        let (_, clock, stat) = fixture(2);
        stat.value(); // touched at 1000
        assert!(!stat.expire(1_000));
        assert!(stat.is_active());

        assert!(stat.expire(1_001));
        assert!(!stat.is_active());
        assert_eq!(None, stat.sample());

        clock.set(5_000);
        stat.history();
        assert!(stat.is_active());
        assert!(!stat.expire(5_000));
    }

    #[test]
    fn always_on_never_expires() {
        let (_, _, stat) = fixture(2);
        stat.set_always_on(true);
        assert!(stat.is_active());
        assert!(!stat.expire(u64::max_value()));
        assert_eq!(Some(0), stat.sample());

        stat.set_always_on(false);
        assert!(stat.expire(u64::max_value()));
        assert!(!stat.is_active());
    }

    #[test]
    fn history_survives_expiry() {
        let (_, _, stat) = fixture(3);
        stat.value();
        stat.sample();
        stat.sample();
        stat.expire(u64::max_value());
        assert_eq!(2, stat.history().len());
    }
}
