use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::context::StatisticsContext;
use crate::registry::StatisticsRegistry;

/// A background thread ticking a registry every `history_interval`.
///
/// The thread stops when the driver is shut down or dropped.
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
/// use statkeeper::registry::{Discovered, OperationStatistic, Outcome, StatisticsContext,
///                            ValueStatistic};
/// use statkeeper::{RegistryConfig, RegistryDriver, StatisticsRegistry};
///
/// struct Nothing;
///
/// impl StatisticsContext for Nothing {
///     fn value_statistics(&self, _: &str, _: &BTreeSet<String>)
///                         -> Vec<Discovered<Arc<dyn ValueStatistic<i64>>>> {
///         vec![]
///     }
///
///     fn operation_statistics<K: Outcome>(&self, _: &str, _: &BTreeSet<String>)
///                                         -> Vec<Discovered<Arc<dyn OperationStatistic<K>>>> {
///         vec![]
///     }
/// }
///
/// let registry = Arc::new(StatisticsRegistry::new(Nothing, RegistryConfig::default()));
/// let driver = RegistryDriver::spawn(Arc::clone(&registry)).unwrap();
/// driver.shutdown();
/// ```
#[derive(Debug)]
pub struct RegistryDriver {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RegistryDriver {
    /// Start ticking `registry` on a new thread.
    pub fn spawn<C>(registry: Arc<StatisticsRegistry<C>>) -> Result<RegistryDriver>
    where
        C: StatisticsContext + 'static,
    {
        let (stop, stopped) = bounded::<()>(1);
        let interval = registry.history_interval();
        let handle = thread::Builder::new()
            .name("statkeeper-registry".to_string())
            .spawn(move || {
                info!(?interval, "registry driver started");
                loop {
                    match stopped.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            registry.tick();
                            debug!("registry tick");
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                info!("registry driver stopped");
            })?;
        Ok(RegistryDriver {
            stop: Some(stop),
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to finish.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            // the thread may already be gone
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("registry driver panicked");
            }
        }
    }
}

impl Drop for RegistryDriver {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
