//! Bounded executor for heavy model fits
//!
//! A fit cannot be interrupted once started, so the timeout applies to the
//! wait, not the work: a timed-out task keeps running on its detached thread
//! and its result is dropped when it finishes. Abandoned tasks still hold
//! their slot, which caps how many runaway fits can pile up under repeated
//! timeouts.

use crate::forecasting::{ModelError, ModelResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed-capacity pool of detached fit workers
pub struct BoundedExecutor {
    capacity: usize,
    in_flight: Arc<AtomicUsize>,
}

/// Holds one executor slot until the task finishes
struct Slot {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for Slot {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl BoundedExecutor {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks currently running, abandoned ones included
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `task` on a worker thread and wait at most `timeout` for its result
    pub fn run_with_timeout<T, F>(&self, name: &str, timeout: Duration, task: F) -> ModelResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> ModelResult<T> + Send + 'static,
    {
        let slot = self.reserve()?;
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name(format!("fit-{}", name))
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone once the caller has given up.
                let _ = tx.send(task());
            })
            .map_err(|e| ModelError::WorkerFailed(format!("failed to spawn worker: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Heavy fit '{}' exceeded {:?}; abandoning result ({} in flight)",
                    name,
                    timeout,
                    self.in_flight()
                );
                Err(ModelError::Timeout(timeout))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ModelError::WorkerFailed(format!(
                "worker for '{}' exited without a result",
                name
            ))),
        }
    }

    fn reserve(&self) -> ModelResult<Slot> {
        let capacity = self.capacity;
        match self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            }) {
            Ok(previous) => {
                debug!("Reserved fit worker ({}/{})", previous + 1, capacity);
                Ok(Slot {
                    in_flight: self.in_flight.clone(),
                })
            }
            Err(current) => Err(ModelError::WorkerSaturated(current)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn wait_until_idle(executor: &BoundedExecutor) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while executor.in_flight() > 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_returns_task_result() {
        let executor = BoundedExecutor::new(2);
        let result = executor.run_with_timeout("quick", Duration::from_secs(5), || Ok(42));
        assert_eq!(result, Ok(42));
        wait_until_idle(&executor);
        assert_eq!(executor.in_flight(), 0);
    }

    #[test]
    fn test_task_error_is_returned() {
        let executor = BoundedExecutor::new(1);
        let result: ModelResult<()> = executor.run_with_timeout("failing", Duration::from_secs(5), || {
            Err(ModelError::InvalidData("bad".into()))
        });
        assert_eq!(result, Err(ModelError::InvalidData("bad".into())));
    }

    #[test]
    fn test_timeout_abandons_but_keeps_slot() {
        let executor = BoundedExecutor::new(1);
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let started = Instant::now();
        let result: ModelResult<()> =
            executor.run_with_timeout("slow", Duration::from_millis(50), move || {
                let _ = release_rx.recv();
                Ok(())
            });
        assert_eq!(result, Err(ModelError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_secs(5));

        // The abandoned task still occupies the only worker.
        assert_eq!(executor.in_flight(), 1);
        let saturated = executor.run_with_timeout("next", Duration::from_secs(1), || Ok(()));
        assert_eq!(saturated, Err(ModelError::WorkerSaturated(1)));

        release_tx.send(()).unwrap();
        wait_until_idle(&executor);
        assert_eq!(executor.in_flight(), 0);
        assert_eq!(
            executor.run_with_timeout("after", Duration::from_secs(5), || Ok(7)),
            Ok(7)
        );
    }

    #[test]
    fn test_panicking_task_is_worker_failure() {
        let executor = BoundedExecutor::new(1);
        let result: ModelResult<()> =
            executor.run_with_timeout("panics", Duration::from_secs(5), || panic!("fit blew up"));
        assert!(matches!(result, Err(ModelError::WorkerFailed(_))));
        wait_until_idle(&executor);
        assert_eq!(executor.in_flight(), 0);
    }
}
