//! A registry of live statistics discovered in a host context.
//!
//! The host publishes values and operation counters through a
//! [`StatisticsContext`]. Registering a descriptor asks the context for every
//! match and wraps each one in a sampled statistic keyed by name (prefixed by
//! the match's discriminator, if any). Each [`tick`](StatisticsRegistry::tick)
//! samples the active statistics; statistics nobody has read for
//! `time_to_disable` are switched off until they are read again.
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use statkeeper::registry::{Discovered, OperationStatistic, Outcome, StatisticsContext,
//!                            ValueStatistic, ValueStatisticDescriptor};
//! use statkeeper::{RegistryConfig, StatisticsRegistry};
//!
//! struct Heap;
//!
//! impl StatisticsContext for Heap {
//!     fn value_statistics(&self, observer: &str, _tags: &BTreeSet<String>)
//!                         -> Vec<Discovered<Arc<dyn ValueStatistic<i64>>>> {
//!         if observer == "size" {
//!             vec![Discovered::discriminated("heap", Arc::new(|| 42i64) as Arc<dyn ValueStatistic<i64>>)]
//!         } else {
//!             vec![]
//!         }
//!     }
//!
//!     fn operation_statistics<K: Outcome>(&self, _observer: &str, _tags: &BTreeSet<String>)
//!                                         -> Vec<Discovered<Arc<dyn OperationStatistic<K>>>> {
//!         vec![]
//!     }
//! }
//!
//! let registry = StatisticsRegistry::new(Heap, RegistryConfig::default());
//! let tiers = ValueStatisticDescriptor::new("size", vec!["tier"]);
//! registry.register_size("entries", &tiers).unwrap();
//! assert!(registry.get("heap:entries").is_some());
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::time::{millis, Clock, SystemClock};

mod config;
mod context;
mod driver;
mod sampled;
mod statistic;

pub use self::config::RegistryConfig;
pub use self::context::{Discovered, OperationStatistic, OperationStatisticDescriptor, Outcome,
                        StatisticsContext, ValueStatistic, ValueStatisticDescriptor};
pub use self::driver::RegistryDriver;
pub use self::sampled::{ExpiringSampledStatistic, Timestamped};
pub use self::statistic::{CompoundStatistic, RatioStatistic, RegisteredStatistic, SampledValue,
                          StatisticKind};

#[derive(Debug)]
struct Schedule {
    time_to_disable: Duration,
    always_on: bool,
    /// Millisecond timestamp at which the next expiry pass is due.
    next_expiry: Option<u64>,
}

/// Statistics registered by name, sampled on every tick.
pub struct StatisticsRegistry<C> {
    context: C,
    config: RegistryConfig,
    clock: Arc<dyn Clock>,
    registrations: RwLock<BTreeMap<String, Arc<RegisteredStatistic>>>,
    schedule: Mutex<Schedule>,
}

impl<C> StatisticsRegistry<C>
where
    C: StatisticsContext,
{
    /// A registry reading the wall clock.
    pub fn new(context: C, config: RegistryConfig) -> StatisticsRegistry<C> {
        StatisticsRegistry::with_clock(context, config, Arc::new(SystemClock))
    }

    /// A registry reading `clock`. The first expiry pass is due
    /// `time_to_disable` from now.
    pub fn with_clock(
        context: C,
        config: RegistryConfig,
        clock: Arc<dyn Clock>,
    ) -> StatisticsRegistry<C> {
        let now = clock.now_millis();
        StatisticsRegistry {
            context,
            clock,
            registrations: RwLock::new(BTreeMap::new()),
            schedule: Mutex::new(Schedule {
                time_to_disable: config.time_to_disable,
                always_on: false,
                next_expiry: Some(now.saturating_add(millis(config.time_to_disable))),
            }),
            config,
        }
    }

    /// Register every size statistic matching `descriptor` as `name`.
    ///
    /// Matching nothing is not an error; nothing gets registered.
    pub fn register_size(&self, name: &str, descriptor: &ValueStatisticDescriptor) -> Result<()> {
        let entries = self.discover_values(name, descriptor, RegisteredStatistic::Size);
        self.insert_all(entries)
    }

    /// Register every counter matching `descriptor` as `name`.
    ///
    /// Matching nothing is not an error; nothing gets registered.
    pub fn register_counter(&self, name: &str, descriptor: &ValueStatisticDescriptor) -> Result<()> {
        let entries = self.discover_values(name, descriptor, RegisteredStatistic::Counter);
        self.insert_all(entries)
    }

    /// Register the count and rate of every operation matching `descriptor`,
    /// summed over `outcomes`.
    pub fn register_compound_operations<K, I>(
        &self,
        name: &str,
        descriptor: &OperationStatisticDescriptor,
        outcomes: I,
    ) -> Result<()>
    where
        K: Outcome,
        I: IntoIterator<Item = K>,
    {
        let outcomes: BTreeSet<K> = outcomes.into_iter().collect();
        let entries = self
            .discover_operations::<K>(descriptor)?
            .into_iter()
            .map(|found| {
                let stat = CompoundStatistic::new(
                    found.statistic.clone(),
                    outcomes.clone(),
                    Arc::clone(&self.clock),
                    &self.config,
                );
                (found.key(name), RegisteredStatistic::Compound(stat))
            })
            .collect();
        self.insert_all(entries)
    }

    /// Register the ratio of `numerator` to `denominator` outcomes of every
    /// operation matching `descriptor`.
    pub fn register_ratios<K, N, D>(
        &self,
        name: &str,
        descriptor: &OperationStatisticDescriptor,
        numerator: N,
        denominator: D,
    ) -> Result<()>
    where
        K: Outcome,
        N: IntoIterator<Item = K>,
        D: IntoIterator<Item = K>,
    {
        let numerator: BTreeSet<K> = numerator.into_iter().collect();
        let denominator: BTreeSet<K> = denominator.into_iter().collect();
        let entries = self
            .discover_operations::<K>(descriptor)?
            .into_iter()
            .map(|found| {
                let stat = RatioStatistic::new(
                    found.statistic.clone(),
                    numerator.clone(),
                    denominator.clone(),
                    Arc::clone(&self.clock),
                    &self.config,
                );
                (found.key(name), RegisteredStatistic::Ratio(stat))
            })
            .collect();
        self.insert_all(entries)
    }

    /// Sample every registration, then run an expiry pass if one is due.
    pub fn tick(&self) {
        let stats: Vec<Arc<RegisteredStatistic>> =
            self.registrations.read().values().cloned().collect();
        for stat in &stats {
            stat.sample();
        }

        let now = self.clock.now_millis();
        let mut schedule = self.schedule.lock();
        let due = schedule.next_expiry.map_or(false, |at| now >= at);
        if due {
            let ttd = millis(schedule.time_to_disable);
            let threshold = now.saturating_sub(ttd);
            let expired = stats.iter().filter(|s| s.expire(threshold)).count();
            schedule.next_expiry = Some(now.saturating_add(ttd));
            debug!(now, threshold, expired, total = stats.len(), "expiry pass");
        }
    }

    /// Change how long a statistic may sit unread before it is switched off.
    ///
    /// Unless the registry is always-on, the next expiry pass is rescheduled
    /// to `time_to_disable` from now.
    pub fn set_time_to_disable(&self, time_to_disable: Duration) {
        let now = self.clock.now_millis();
        let mut schedule = self.schedule.lock();
        schedule.time_to_disable = time_to_disable;
        if !schedule.always_on {
            schedule.next_expiry = Some(now.saturating_add(millis(time_to_disable)));
        }
    }

    /// Keep every statistic sampling regardless of reads, or go back to
    /// normal expiry. Leaving always-on makes an expiry pass due immediately;
    /// turning it off when it was not on leaves the schedule alone.
    pub fn set_always_on(&self, enabled: bool) {
        let now = self.clock.now_millis();
        let mut schedule = self.schedule.lock();
        let was = schedule.always_on;
        schedule.always_on = enabled;
        if enabled {
            schedule.next_expiry = None;
        } else if was {
            schedule.next_expiry = Some(now);
        }
        for stat in self.registrations.read().values() {
            stat.set_always_on(enabled);
        }
        debug!(enabled, "always-on changed");
    }

    /// A snapshot of every registration by key.
    pub fn registrations(&self) -> BTreeMap<String, Arc<RegisteredStatistic>> {
        self.registrations.read().clone()
    }

    /// The registration under `key`.
    pub fn get(&self, key: &str) -> Option<Arc<RegisteredStatistic>> {
        self.registrations.read().get(key).cloned()
    }

    /// Forget every registration.
    pub fn clear_registrations(&self) {
        self.registrations.write().clear();
    }

    /// Time between two ticks.
    pub fn history_interval(&self) -> Duration {
        self.config.history_interval
    }

    /// The configuration the registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// The host context.
    pub fn context(&self) -> &C {
        &self.context
    }

    fn discover_values<F>(
        &self,
        name: &str,
        descriptor: &ValueStatisticDescriptor,
        wrap: F,
    ) -> Vec<(String, RegisteredStatistic)>
    where
        F: Fn(SampledValue) -> RegisteredStatistic,
    {
        self.context
            .value_statistics(&descriptor.observer_name, &descriptor.tags)
            .into_iter()
            .map(|found| {
                let key = found.key(name);
                let value = SampledValue::new(found.statistic, Arc::clone(&self.clock), &self.config);
                (key, wrap(value))
            })
            .collect()
    }

    fn discover_operations<K>(
        &self,
        descriptor: &OperationStatisticDescriptor,
    ) -> Result<Vec<Discovered<Arc<dyn OperationStatistic<K>>>>>
    where
        K: Outcome,
    {
        let found = self
            .context
            .operation_statistics::<K>(&descriptor.observer_name, &descriptor.tags);
        if found.is_empty() {
            return Err(Error::OperationNotFound {
                observer: descriptor.observer_name.clone(),
                tags: descriptor.tags.clone(),
            });
        }
        Ok(found)
    }

    /// Add all of `entries` or none of them.
    fn insert_all(&self, entries: Vec<(String, RegisteredStatistic)>) -> Result<()> {
        let mut seen = BTreeSet::new();
        for &(ref key, _) in &entries {
            if !seen.insert(key.as_str()) {
                warn!(key = key.as_str(), "context yielded the same statistic twice");
                return Err(Error::DuplicateDiscovery(key.clone()));
            }
        }

        let schedule = self.schedule.lock();
        let mut registrations = self.registrations.write();
        let clashes: Vec<String> = entries
            .iter()
            .filter(|&&(ref key, _)| registrations.contains_key(key))
            .map(|&(ref key, _)| key.clone())
            .collect();
        if !clashes.is_empty() {
            warn!(keys = ?clashes, "rejected duplicate registration");
            return Err(Error::DuplicateStatistics(clashes));
        }

        for (key, stat) in entries {
            if schedule.always_on {
                stat.set_always_on(true);
            }
            debug!(key = key.as_str(), kind = ?stat.kind(), "registered statistic");
            registrations.insert(key, Arc::new(stat));
        }
        Ok(())
    }
}

impl<C> fmt::Debug for StatisticsRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("StatisticsRegistry")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .field("registrations", &self.registrations.read().len())
            .field("schedule", &*self.schedule.lock())
            .finish()
    }
}
