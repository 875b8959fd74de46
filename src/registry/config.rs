use std::time::Duration;

/// Tuning for a `StatisticsRegistry`.
///
/// ```
/// use std::time::Duration;
/// use statkeeper::RegistryConfig;
///
/// let config = RegistryConfig::default()
///     .with_history_size(60)
///     .with_history_interval(Duration::from_millis(500));
/// assert_eq!(config.history_size, 60);
/// assert_eq!(config.time_to_disable, Duration::from_secs(300));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde_support", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryConfig {
    /// Window over which rates and ratios are averaged.
    pub average_window: Duration,
    /// Samples of history retained per statistic.
    pub history_size: usize,
    /// Time between two samples.
    pub history_interval: Duration,
    /// Idle time after which a statistic stops being sampled.
    pub time_to_disable: Duration,
    /// Relative error of the quantile summary kept for sizes and counters.
    pub quantile_error: f64,
}

impl Default for RegistryConfig {
    fn default() -> RegistryConfig {
        RegistryConfig {
            average_window: Duration::from_secs(60),
            history_size: 30,
            history_interval: Duration::from_secs(1),
            time_to_disable: Duration::from_secs(300),
            quantile_error: 0.01,
        }
    }
}

impl RegistryConfig {
    /// Set `average_window`.
    pub fn with_average_window(mut self, window: Duration) -> RegistryConfig {
        self.average_window = window;
        self
    }

    /// Set `history_size`.
    pub fn with_history_size(mut self, size: usize) -> RegistryConfig {
        self.history_size = size;
        self
    }

    /// Set `history_interval`.
    pub fn with_history_interval(mut self, interval: Duration) -> RegistryConfig {
        self.history_interval = interval;
        self
    }

    /// Set `time_to_disable`.
    pub fn with_time_to_disable(mut self, ttd: Duration) -> RegistryConfig {
        self.time_to_disable = ttd;
        self
    }

    /// Set `quantile_error`.
    pub fn with_quantile_error(mut self, error: f64) -> RegistryConfig {
        self.quantile_error = error;
        self
    }
}
