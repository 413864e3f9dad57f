//! Whole-second elapsed counter for the active run.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Default)]
struct Counter {
    seconds: u64,
    // Bumped on every start and stop; a ticker only counts for its own epoch.
    epoch: u64,
}

/// Counts seconds while a stage is active and reads 0 otherwise.
#[derive(Debug, Default)]
pub struct ElapsedCounter {
    counter: Arc<Mutex<Counter>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ElapsedCounter {
    /// Creates a stopped counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to 0 and starts counting. Must be called within a tokio runtime.
    pub fn start(&self) {
        let epoch = {
            let mut counter = self.counter.lock();
            counter.epoch += 1;
            counter.seconds = 0;
            counter.epoch
        };

        let counter = Arc::clone(&self.counter);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + TICK, TICK);
            loop {
                ticker.tick().await;
                let mut counter = counter.lock();
                if counter.epoch != epoch {
                    break;
                }
                counter.seconds += 1;
            }
        });

        if let Some(previous) = self.ticker.lock().replace(task) {
            previous.abort();
        }
    }

    /// Stops counting and resets to 0.
    pub fn stop(&self) {
        {
            let mut counter = self.counter.lock();
            counter.epoch += 1;
            counter.seconds = 0;
        }
        if let Some(task) = self.ticker.lock().take() {
            task.abort();
        }
    }

    /// Seconds since the last start, or 0 when stopped.
    #[must_use]
    pub fn seconds(&self) -> u64 {
        self.counter.lock().seconds
    }

    /// Returns true while counting.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.ticker.lock().is_some()
    }
}

impl Drop for ElapsedCounter {
    fn drop(&mut self) {
        if let Some(task) = self.ticker.get_mut().take() {
            task.abort();
        }
    }
}
