//! The kinds of statistic the registry knows how to keep.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::compressed_quantiles::{LowBiased, SharedQuantiles};
use crate::error::Result;
use crate::registry::config::RegistryConfig;
use crate::registry::context::{OperationStatistic, Outcome, ValueStatistic};
use crate::registry::sampled::{ExpiringSampledStatistic, Timestamped};
use crate::time::{millis, Clock};

/// What a registration is tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticKind {
    /// A level, such as a number of entries.
    Size,
    /// A monotonically increasing count.
    Counter,
    /// Completions of an operation over a set of outcomes, and their rate.
    Compound,
    /// The ratio of two outcome sets over the averaging window.
    Ratio,
}

/// A statistic held by the registry.
#[derive(Debug)]
pub enum RegisteredStatistic {
    /// See `StatisticKind::Size`.
    Size(SampledValue),
    /// See `StatisticKind::Counter`.
    Counter(SampledValue),
    /// See `StatisticKind::Compound`.
    Compound(CompoundStatistic),
    /// See `StatisticKind::Ratio`.
    Ratio(RatioStatistic),
}

impl RegisteredStatistic {
    /// Which kind of statistic this is.
    pub fn kind(&self) -> StatisticKind {
        match *self {
            RegisteredStatistic::Size(_) => StatisticKind::Size,
            RegisteredStatistic::Counter(_) => StatisticKind::Counter,
            RegisteredStatistic::Compound(_) => StatisticKind::Compound,
            RegisteredStatistic::Ratio(_) => StatisticKind::Ratio,
        }
    }

    /// Whether the statistic is currently being sampled.
    pub fn is_active(&self) -> bool {
        match *self {
            RegisteredStatistic::Size(ref s) | RegisteredStatistic::Counter(ref s) => {
                s.sampled.is_active()
            }
            RegisteredStatistic::Compound(ref c) => c.count.is_active() || c.rate.is_active(),
            RegisteredStatistic::Ratio(ref r) => r.ratio.is_active(),
        }
    }

    pub(crate) fn sample(&self) {
        match *self {
            RegisteredStatistic::Size(ref s) | RegisteredStatistic::Counter(ref s) => s.sample(),
            RegisteredStatistic::Compound(ref c) => {
                c.count.sample();
                c.rate.sample();
            }
            RegisteredStatistic::Ratio(ref r) => {
                r.ratio.sample();
            }
        }
    }

    pub(crate) fn expire(&self, threshold: u64) -> bool {
        match *self {
            RegisteredStatistic::Size(ref s) | RegisteredStatistic::Counter(ref s) => {
                s.sampled.expire(threshold)
            }
            RegisteredStatistic::Compound(ref c) => {
                c.count.expire(threshold) & c.rate.expire(threshold)
            }
            RegisteredStatistic::Ratio(ref r) => r.ratio.expire(threshold),
        }
    }

    pub(crate) fn set_always_on(&self, enabled: bool) {
        match *self {
            RegisteredStatistic::Size(ref s) | RegisteredStatistic::Counter(ref s) => {
                s.sampled.set_always_on(enabled)
            }
            RegisteredStatistic::Compound(ref c) => {
                c.count.set_always_on(enabled);
                c.rate.set_always_on(enabled);
            }
            RegisteredStatistic::Ratio(ref r) => r.ratio.set_always_on(enabled),
        }
    }
}

/// A sampled size or counter, with a quantile summary of everything sampled.
#[derive(Debug)]
pub struct SampledValue {
    sampled: ExpiringSampledStatistic<i64>,
    distribution: SharedQuantiles<i64, LowBiased>,
}

impl SampledValue {
    pub(crate) fn new(
        source: Arc<dyn ValueStatistic<i64>>,
        clock: Arc<dyn Clock>,
        config: &RegistryConfig,
    ) -> SampledValue {
        SampledValue {
            sampled: ExpiringSampledStatistic::new(source, clock, config.history_size),
            distribution: SharedQuantiles::new(LowBiased::new(config.quantile_error)),
        }
    }

    /// The current value.
    pub fn value(&self) -> i64 {
        self.sampled.value()
    }

    /// Recent samples, oldest first.
    pub fn history(&self) -> Vec<Timestamped<i64>> {
        self.sampled.history()
    }

    /// The `phi` quantile of every value sampled so far.
    pub fn quantile(&self, phi: f64) -> Result<i64> {
        self.sampled.touch();
        self.distribution.query(phi)
    }

    /// Number of samples fed to the distribution.
    pub fn sample_count(&self) -> u64 {
        self.distribution.count()
    }

    fn sample(&self) {
        if let Some(value) = self.sampled.sample() {
            self.distribution.insert(&mut [value]);
        }
    }
}

/// Completion count and rate of an operation over a set of outcomes.
#[derive(Debug)]
pub struct CompoundStatistic {
    count: ExpiringSampledStatistic<i64>,
    rate: ExpiringSampledStatistic<f64>,
}

impl CompoundStatistic {
    pub(crate) fn new<K>(
        operation: Arc<dyn OperationStatistic<K>>,
        outcomes: BTreeSet<K>,
        clock: Arc<dyn Clock>,
        config: &RegistryConfig,
    ) -> CompoundStatistic
    where
        K: Outcome,
    {
        let total = Arc::new(move || operation.sum(&outcomes));
        let count = {
            let total = Arc::clone(&total);
            move || saturating_i64(total())
        };
        let window = Window::new(config.average_window, config.history_interval);
        let rate = {
            let clock = Arc::clone(&clock);
            move || {
                let now = clock.now_millis();
                let current = total();
                let (elapsed, oldest) = window.record(now, current);
                per_second(current.saturating_sub(oldest), elapsed)
            }
        };
        CompoundStatistic {
            count: ExpiringSampledStatistic::new(
                Arc::new(count),
                Arc::clone(&clock),
                config.history_size,
            ),
            rate: ExpiringSampledStatistic::new(Arc::new(rate), clock, config.history_size),
        }
    }

    /// Completions so far.
    pub fn count(&self) -> i64 {
        self.count.value()
    }

    /// Recent completion counts, oldest first.
    pub fn count_history(&self) -> Vec<Timestamped<i64>> {
        self.count.history()
    }

    /// Completions per second over the averaging window.
    pub fn rate(&self) -> f64 {
        self.rate.value()
    }

    /// Recent rates, oldest first.
    pub fn rate_history(&self) -> Vec<Timestamped<f64>> {
        self.rate.history()
    }
}

/// The ratio of two outcome sets of one operation over the averaging window,
/// for instance hits over all lookups.
#[derive(Debug)]
pub struct RatioStatistic {
    ratio: ExpiringSampledStatistic<f64>,
}

impl RatioStatistic {
    pub(crate) fn new<K>(
        operation: Arc<dyn OperationStatistic<K>>,
        numerator: BTreeSet<K>,
        denominator: BTreeSet<K>,
        clock: Arc<dyn Clock>,
        config: &RegistryConfig,
    ) -> RatioStatistic
    where
        K: Outcome,
    {
        let window = Window::new(config.average_window, config.history_interval);
        let ratio = {
            let clock = Arc::clone(&clock);
            move || {
                let current = (operation.sum(&numerator), operation.sum(&denominator));
                let (_, oldest) = window.record(clock.now_millis(), current);
                let over = current.0.saturating_sub(oldest.0);
                let under = current.1.saturating_sub(oldest.1);
                if under == 0 {
                    f64::NAN
                } else {
                    over as f64 / under as f64
                }
            }
        };
        RatioStatistic {
            ratio: ExpiringSampledStatistic::new(Arc::new(ratio), clock, config.history_size),
        }
    }

    /// The ratio over the averaging window, NaN when the denominator did not
    /// move.
    pub fn ratio(&self) -> f64 {
        self.ratio.value()
    }

    /// Recent ratios, oldest first.
    pub fn history(&self) -> Vec<Timestamped<f64>> {
        self.ratio.history()
    }
}

/// Readings of a cumulative source over a trailing time window.
///
/// At most one reading is kept per `gap`, so the window never holds more than
/// `width / gap + 1` points however often it is read.
struct Window<V> {
    width: u64,
    gap: u64,
    points: Mutex<VecDeque<(u64, V)>>,
}

impl<V> Window<V>
where
    V: Copy,
{
    fn new(width: Duration, gap: Duration) -> Window<V> {
        Window {
            width: millis(width),
            gap: millis(gap),
            points: Mutex::new(VecDeque::new()),
        }
    }

    /// Record `value` at `now`, returning the time elapsed since the oldest
    /// reading still in the window and that reading.
    ///
    /// A reading less than `gap` after the last kept one is compared against
    /// the window but not kept.
    fn record(&self, now: u64, value: V) -> (u64, V) {
        let mut points = self.points.lock();
        let due = points
            .back()
            .map_or(true, |&(then, _)| now >= then.saturating_add(self.gap));
        if due {
            points.push_back((now, value));
        }
        let horizon = now.saturating_sub(self.width);
        while points.len() > 1 && points.front().map_or(false, |p| p.0 < horizon) {
            points.pop_front();
        }
        match points.front() {
            Some(&(then, oldest)) => (now.saturating_sub(then), oldest),
            None => (0, value),
        }
    }
}

fn per_second(events: u64, elapsed_millis: u64) -> f64 {
    if elapsed_millis == 0 {
        0.0
    } else {
        events as f64 * 1000.0 / elapsed_millis as f64
    }
}

fn saturating_i64(x: u64) -> i64 {
    i64::try_from(x).unwrap_or(i64::max_value())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::time::ManualClock;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
    enum Lookup {
        Hit,
        Miss,
    }

    #[derive(Default)]
    struct Lookups {
        hits: AtomicU64,
        misses: AtomicU64,
    }

    impl OperationStatistic<Lookup> for Lookups {
        fn count(&self, outcome: Lookup) -> u64 {
            match outcome {
                Lookup::Hit => self.hits.load(Ordering::SeqCst),
                Lookup::Miss => self.misses.load(Ordering::SeqCst),
            }
        }
    }

    fn set(outcomes: &[Lookup]) -> BTreeSet<Lookup> {
        outcomes.iter().cloned().collect()
    }

    fn config() -> RegistryConfig {
        RegistryConfig::default()
            .with_average_window(Duration::from_secs(10))
            .with_history_size(4)
    }

    #[test]
    fn window_keeps_the_trailing_span() {
        let window = Window::new(Duration::from_millis(100), Duration::from_millis(10));
        assert_eq!((0, 5u64), window.record(1_000, 5));
        assert_eq!((50, 5), window.record(1_050, 8));
        assert_eq!((100, 5), window.record(1_100, 9));
        // 1000 falls out of the window, 1050 is the oldest left
        assert_eq!((60, 8), window.record(1_110, 12));
    }

    #[test]
    fn frequent_reads_do_not_grow_the_window() {
        let window = Window::new(Duration::from_secs(60), Duration::from_secs(1));
        window.record(0, 0u64);
        for i in 0..10_000u64 {
            // many reads inside one second
            assert_eq!((500, 0), window.record(500, i));
        }
        assert_eq!(1, window.points.lock().len());

        assert_eq!((1_000, 0), window.record(1_000, 7));
        assert_eq!((1_200, 0), window.record(1_200, 9));
        assert_eq!(2, window.points.lock().len());
    }

    #[test]
    fn polling_rate_stays_bounded() {
        let lookups = Arc::new(Lookups::default());
        let clock = Arc::new(ManualClock::new(0));
        let stat = CompoundStatistic::new(
            lookups.clone() as Arc<dyn OperationStatistic<Lookup>>,
            set(&[Lookup::Hit]),
            clock.clone(),
            &config(),
        );
        stat.rate();
        lookups.hits.store(50, Ordering::SeqCst);
        for step in 1..=1_000u64 {
            clock.set(step * 5);
            stat.rate();
        }
        // 5s of reads every 5ms, one kept per second
        assert_eq!(10.0, stat.rate());
    }

    #[test]
    fn compound_count_and_rate() {
        let lookups = Arc::new(Lookups::default());
        let clock = Arc::new(ManualClock::new(0));
        let stat = CompoundStatistic::new(
            lookups.clone() as Arc<dyn OperationStatistic<Lookup>>,
            set(&[Lookup::Hit, Lookup::Miss]),
            clock.clone(),
            &config(),
        );
        assert_eq!(0, stat.count());
        assert_eq!(0.0, stat.rate());

        lookups.hits.store(30, Ordering::SeqCst);
        lookups.misses.store(10, Ordering::SeqCst);
        clock.set(2_000);
        assert_eq!(40, stat.count());
        assert_eq!(20.0, stat.rate());
    }

    #[test]
    fn ratio_over_window() {
        let lookups = Arc::new(Lookups::default());
        let clock = Arc::new(ManualClock::new(0));
        let stat = RatioStatistic::new(
            lookups.clone() as Arc<dyn OperationStatistic<Lookup>>,
            set(&[Lookup::Hit]),
            set(&[Lookup::Hit, Lookup::Miss]),
            clock.clone(),
            &config(),
        );
        assert!(stat.ratio().is_nan());

        lookups.hits.store(3, Ordering::SeqCst);
        lookups.misses.store(1, Ordering::SeqCst);
        clock.set(1_000);
        assert_eq!(0.75, stat.ratio());
    }

    #[test]
    fn sampled_value_feeds_distribution() {
        let level = Arc::new(AtomicU64::new(0));
        let source = {
            let level = Arc::clone(&level);
            move || level.load(Ordering::SeqCst) as i64
        };
        let stat = RegisteredStatistic::Size(SampledValue::new(
            Arc::new(source),
            Arc::new(ManualClock::new(0)),
            &config(),
        ));
        assert_eq!(StatisticKind::Size, stat.kind());

        // inactive: nothing is recorded until the quantile read below
        stat.sample();
        if let RegisteredStatistic::Size(ref s) = stat {
            assert_eq!(0, s.sample_count());
            assert!(s.quantile(0.5).is_err());
        }

        for v in 1..6 {
            level.store(v, Ordering::SeqCst);
            stat.sample();
        }
        match stat {
            RegisteredStatistic::Size(ref s) => {
                assert_eq!(5, s.sample_count());
                assert_eq!(1, s.quantile(0.0).unwrap());
                assert_eq!(5, s.quantile(1.0).unwrap());
                assert_eq!(4, s.history().len());
            }
            _ => panic!("wrong kind"),
        }
    }

    #[test]
    fn compound_expires_as_a_unit() {
        let lookups = Arc::new(Lookups::default());
        let stat = RegisteredStatistic::Compound(CompoundStatistic::new(
            lookups as Arc<dyn OperationStatistic<Lookup>>,
            set(&[Lookup::Miss]),
            Arc::new(ManualClock::new(10)),
            &config(),
        ));
        assert!(!stat.is_active());
        stat.set_always_on(true);
        assert!(stat.is_active());
        assert!(!stat.expire(u64::max_value()));
        stat.set_always_on(false);
        assert!(stat.expire(u64::max_value()));
        assert!(!stat.is_active());
    }
}
