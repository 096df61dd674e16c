//! Fixed-period synchronization thread
//!
//! Keeps the mapper ticking at a constant rate even when the controller is
//! idle, while real input takes priority within a period.

use crate::lock;
use crate::session::SessionShared;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Running flag of a sync loop
///
/// Once cleared it stays cleared. Clearing wakes a loop waiting out its
/// period, so shutdown never waits a full period.
#[derive(Debug)]
pub(crate) struct Liveness {
    running: Mutex<bool>,
    wake: Condvar,
}

impl Liveness {
    pub(crate) fn new() -> Self {
        Self {
            running: Mutex::new(true),
            wake: Condvar::new(),
        }
    }

    pub(crate) fn is_set(&self) -> bool {
        *lock(&self.running)
    }

    pub(crate) fn clear(&self) {
        *lock(&self.running) = false;
        self.wake.notify_all();
    }

    /// Sleep for `period` unless cleared first; returns whether still running
    pub(crate) fn wait_period(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut running = lock(&self.running);
        while *running {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            running = match self.wake.wait_timeout(running, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *running
    }
}

pub(crate) fn run(shared: Arc<SessionShared>) {
    debug!("Sync loop started, period {:?}", shared.period);

    while shared.liveness.is_set() {
        if !shared.liveness.wait_period(shared.period) {
            break;
        }
        if let Err(e) = shared.sync_step(Instant::now()) {
            error!("Sync loop failed, closing session: {}", e);
            shared.close();
            break;
        }
    }

    debug!("Sync loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_period_elapses() {
        let liveness = Liveness::new();
        let start = Instant::now();
        assert!(liveness.wait_period(Duration::from_millis(5)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_clear_wakes_waiter() {
        let liveness = Arc::new(Liveness::new());
        let waiter = {
            let liveness = Arc::clone(&liveness);
            thread::spawn(move || liveness.wait_period(Duration::from_secs(60)))
        };

        thread::sleep(Duration::from_millis(10));
        liveness.clear();

        assert!(!waiter.join().unwrap());
        assert!(!liveness.is_set());
    }

    #[test]
    fn test_cleared_flag_stays_cleared() {
        let liveness = Liveness::new();
        liveness.clear();
        assert!(!liveness.wait_period(Duration::from_millis(1)));
        assert!(!liveness.is_set());
    }
}
