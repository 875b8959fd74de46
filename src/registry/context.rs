//! The seam between the registry and the host application.
//!
//! The host owns its statistics and knows how to find them. The registry only
//! needs to read values and counts, and to ask the host which statistics carry
//! a given observer name and tag set.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A live value the host exposes, such as a cache size or a hit counter.
///
/// Closures returning the value are statistics too.
pub trait ValueStatistic<T>: Send + Sync {
    /// The current value.
    fn value(&self) -> T;
}

impl<T, F> ValueStatistic<T> for F
where
    F: Fn() -> T + Send + Sync,
{
    fn value(&self) -> T {
        self()
    }
}

/// The outcome type of an operation, typically a fieldless enum like
/// `Hit`/`Miss`.
pub trait Outcome: Copy + Ord + Hash + fmt::Debug + Send + Sync + 'static {}

impl<K> Outcome for K where K: Copy + Ord + Hash + fmt::Debug + Send + Sync + 'static {}

/// Completion counts of an operation, broken down by outcome.
pub trait OperationStatistic<K>: Send + Sync
where
    K: Outcome,
{
    /// How many operations have completed with `outcome`.
    fn count(&self, outcome: K) -> u64;

    /// Total completions over a set of outcomes.
    fn sum(&self, outcomes: &BTreeSet<K>) -> u64 {
        outcomes.iter().map(|o| self.count(*o)).sum()
    }
}

/// A statistic the host context matched, with its optional discriminator.
///
/// The discriminator tells apart several statistics that would otherwise be
/// registered under the same name, for example one per cache tier. It becomes
/// the `discriminator:` prefix of the registration key.
#[derive(Clone)]
pub struct Discovered<S> {
    /// Prefix for the registration key, if any.
    pub discriminator: Option<String>,
    /// The statistic itself.
    pub statistic: S,
}

impl<S> Discovered<S> {
    /// A statistic without a discriminator.
    pub fn new(statistic: S) -> Discovered<S> {
        Discovered {
            discriminator: None,
            statistic,
        }
    }

    /// A statistic registered as `discriminator:name`.
    pub fn discriminated<D: Into<String>>(discriminator: D, statistic: S) -> Discovered<S> {
        Discovered {
            discriminator: Some(discriminator.into()),
            statistic,
        }
    }

    /// The registration key for a statistic registered as `name`.
    pub fn key(&self, name: &str) -> String {
        match self.discriminator {
            Some(ref d) => format!("{}:{}", d, name),
            None => name.to_string(),
        }
    }
}

impl<S> fmt::Debug for Discovered<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Discovered")
            .field("discriminator", &self.discriminator)
            .finish()
    }
}

/// Where the registry looks for statistics.
///
/// Implementations decide what matching means. The usual rule is that a
/// statistic matches when it was published under `observer` and its tags are a
/// superset of `tags`.
pub trait StatisticsContext: Send + Sync {
    /// Value statistics published under `observer` carrying all of `tags`.
    fn value_statistics(
        &self,
        observer: &str,
        tags: &BTreeSet<String>,
    ) -> Vec<Discovered<Arc<dyn ValueStatistic<i64>>>>;

    /// Operation statistics with outcome type `K` published under `observer`
    /// carrying all of `tags`.
    fn operation_statistics<K>(
        &self,
        observer: &str,
        tags: &BTreeSet<String>,
    ) -> Vec<Discovered<Arc<dyn OperationStatistic<K>>>>
    where
        K: Outcome;
}

/// Selects value statistics by observer name and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueStatisticDescriptor {
    /// Name the statistic was published under.
    pub observer_name: String,
    /// Tags the statistic must carry.
    pub tags: BTreeSet<String>,
}

impl ValueStatisticDescriptor {
    /// Describe statistics named `observer_name` carrying every tag in `tags`.
    pub fn new<N, I, S>(observer_name: N, tags: I) -> ValueStatisticDescriptor
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ValueStatisticDescriptor {
            observer_name: observer_name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}

/// Selects operation statistics by observer name and tags.
///
/// The outcome type is chosen at registration time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationStatisticDescriptor {
    /// Name the statistic was published under.
    pub observer_name: String,
    /// Tags the statistic must carry.
    pub tags: BTreeSet<String>,
}

impl OperationStatisticDescriptor {
    /// Describe operations named `observer_name` carrying every tag in `tags`.
    pub fn new<N, I, S>(observer_name: N, tags: I) -> OperationStatisticDescriptor
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OperationStatisticDescriptor {
            observer_name: observer_name.into(),
            tags: tags.into_iter().map(Into::into).collect(),
        }
    }
}
