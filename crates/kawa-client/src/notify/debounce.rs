use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

use super::NOTIFY_TARGET;

/// Bounded wait for the worker thread during shutdown.
const WORKER_JOIN_WAIT: Duration = Duration::from_secs(1);

/// Collapses bursts of observations into one delayed action.
///
/// The debouncer owns a single worker thread. Each observation updates the
/// tracked value immediately (so queries reflect the latest truth before
/// any send fires), discards a pending fire, and restarts the quiet
/// period. When the quiet period elapses the action runs once with the
/// last observed value. Observing a value equal to the tracked one is a
/// no-op.
pub struct Debouncer<T> {
    tracked: Arc<Mutex<Option<T>>>,
    wakeups: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Creates a debouncer firing `action` after `delay` of quiet.
    pub fn new(delay: Duration, action: impl Fn(T) + Send + 'static) -> Self {
        let tracked = Arc::new(Mutex::new(None));
        let (wakeups, observations) = channel();
        let worker_tracked = Arc::clone(&tracked);
        let worker = thread::spawn(move || run_worker(&observations, delay, &worker_tracked, action));
        Self {
            tracked,
            wakeups: Some(wakeups),
            worker: Some(worker),
        }
    }

    /// Records an observation, scheduling a send after the quiet period.
    ///
    /// Returns whether the observation changed the tracked value; an
    /// unchanged value schedules nothing.
    pub fn observe(&self, value: T) -> bool {
        {
            let mut tracked = self.lock_tracked();
            if tracked.as_ref() == Some(&value) {
                return false;
            }
            *tracked = Some(value);
        }
        if let Some(wakeups) = &self.wakeups {
            wakeups.send(()).ok();
        }
        true
    }

    /// Latest observed value, reflecting observations that have not fired.
    #[must_use]
    pub fn current(&self) -> Option<T> {
        self.lock_tracked().clone()
    }

    /// Stops the worker, discarding any pending fire. Idempotent.
    pub fn shutdown(&mut self) {
        self.wakeups.take();
        if let Some(worker) = self.worker.take() {
            let deadline = Instant::now() + WORKER_JOIN_WAIT;
            while !worker.is_finished() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(10));
            }
            if worker.is_finished() {
                worker.join().ok();
            } else {
                debug!(target: NOTIFY_TARGET, "debounce worker did not stop in time; leaking it");
            }
        }
    }

    fn lock_tracked(&self) -> std::sync::MutexGuard<'_, Option<T>> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.wakeups.take();
        self.worker.take();
    }
}

/// Worker loop: wait for an observation, then keep absorbing further
/// observations until a full quiet period passes, then fire once.
fn run_worker<T: Clone>(
    observations: &Receiver<()>,
    delay: Duration,
    tracked: &Mutex<Option<T>>,
    action: impl Fn(T),
) {
    while observations.recv().is_ok() {
        loop {
            match observations.recv_timeout(delay) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => {
                    let value = tracked
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .clone();
                    if let Some(value) = value {
                        action(value);
                    }
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;

    #[test]
    fn burst_collapses_to_one_fire_with_the_last_value() {
        let (tx, rx) = channel();
        let debouncer = Debouncer::new(Duration::from_millis(50), move |value: u32| {
            tx.send(value).ok();
        });

        for value in 1..=5 {
            assert!(debouncer.observe(value));
            thread::sleep(Duration::from_millis(5));
        }

        let fired = rx.recv_timeout(Duration::from_secs(2)).expect("fire");
        assert_eq!(fired, 5);
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
    }

    #[test]
    fn unchanged_observation_is_a_no_op() {
        let (tx, rx) = channel();
        let debouncer = Debouncer::new(Duration::from_millis(30), move |value: u32| {
            tx.send(value).ok();
        });

        assert!(debouncer.observe(7));
        rx.recv_timeout(Duration::from_secs(2)).expect("first fire");
        assert!(!debouncer.observe(7));
        assert!(rx.recv_timeout(Duration::from_millis(120)).is_err());
    }

    #[test]
    fn tracked_value_updates_before_the_fire() {
        let (tx, rx) = channel();
        let debouncer = Debouncer::new(Duration::from_millis(200), move |value: u32| {
            tx.send(value).ok();
        });

        debouncer.observe(41);
        assert_eq!(debouncer.current(), Some(41));
        rx.recv_timeout(Duration::from_secs(2)).expect("fire");
    }

    #[test]
    fn separate_quiet_periods_fire_separately() {
        let (tx, rx) = channel();
        let debouncer = Debouncer::new(Duration::from_millis(30), move |value: u32| {
            tx.send(value).ok();
        });

        debouncer.observe(1);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).expect("first"), 1);
        debouncer.observe(2);
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).expect("second"), 2);
    }

    #[test]
    fn shutdown_stops_the_worker() {
        let (tx, rx) = channel();
        let mut debouncer = Debouncer::new(Duration::from_millis(500), move |value: u32| {
            tx.send(value).ok();
        });
        debouncer.observe(9);
        debouncer.shutdown();
        // The pending fire is discarded with the worker.
        assert!(rx.recv_timeout(Duration::from_millis(700)).is_err());
    }
}
