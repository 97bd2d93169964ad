//! # Wall-Clock Abstraction for Test Determinism
//!
//! Timestamps flow through a `WallClock` trait so that time-dependent code
//! (record timestamps, cycle alignment, the bootstrap plausibility poll) can
//! run against a scripted clock in tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Clock trait for epoch-second reads.
pub trait WallClock: Send + Sync {
    /// Current wall-clock time, in whole seconds since the Unix epoch.
    fn epoch_secs(&self) -> i64;
}

/// Real clock backed by the host's system time.
#[derive(Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl WallClock for SystemClock {
    fn epoch_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Scripted clock for deterministic testing.
///
/// Reads consume a queue of scripted epochs; once the queue is empty the last
/// value is sticky. `advance` shifts the sticky value forward.
pub struct TestClock {
    scripted: Mutex<VecDeque<i64>>,
    current: Mutex<i64>,
}

impl TestClock {
    pub fn new(start_epoch: i64) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            current: Mutex::new(start_epoch),
        }
    }

    /// Queue epochs to be returned by successive `epoch_secs` calls.
    pub fn with_script(epochs: impl IntoIterator<Item = i64>) -> Self {
        let scripted: VecDeque<i64> = epochs.into_iter().collect();
        let start = scripted.front().copied().unwrap_or(0);
        Self {
            scripted: Mutex::new(scripted),
            current: Mutex::new(start),
        }
    }

    pub fn advance(&self, secs: i64) {
        *self.current.lock() += secs;
    }

    pub fn set(&self, epoch: i64) {
        *self.current.lock() = epoch;
    }
}

impl WallClock for TestClock {
    fn epoch_secs(&self) -> i64 {
        if let Some(next) = self.scripted.lock().pop_front() {
            *self.current.lock() = next;
        }
        *self.current.lock()
    }
}

/// Thread-safe clock handle shared across tasks.
pub type SharedClock = Arc<dyn WallClock>;

pub fn system_clock() -> SharedClock {
    Arc::new(SystemClock::new())
}
