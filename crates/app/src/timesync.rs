//! One-shot clock bootstrap, run before the capture and uplink tasks start.
//!
//! Kicks off a network-time query, then polls the local clock until it reads
//! a plausible date. Exhausting the retry budget is fatal only on the very
//! first boot of the process; afterwards capture is allowed to proceed with
//! possibly-wrong timestamps. The asymmetry is inherited behavior, kept
//! deliberately.

use std::sync::Arc;
use std::time::Duration;

use probenode_foundation::{AppError, SharedClock};

pub const SYNC_ATTEMPTS: usize = 15;
pub const SYNC_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// 2016-01-01T00:00:00Z; anything earlier means the clock was never set.
const PLAUSIBLE_MIN_EPOCH: i64 = 1_451_606_400;

/// Seam for the network-time transport. The host implementation relies on
/// the system's NTP daemon already steering the clock, so its kick is a
/// no-op; hardware builds fire an SNTP query here.
pub trait TimeSync: Send + Sync {
    fn kick(&self);
}

#[derive(Default)]
pub struct SystemTimeSync;

impl TimeSync for SystemTimeSync {
    fn kick(&self) {}
}

pub struct ClockBootstrap {
    clock: SharedClock,
    sync: Arc<dyn TimeSync>,
}

impl ClockBootstrap {
    pub fn new(clock: SharedClock, sync: Arc<dyn TimeSync>) -> Self {
        Self { clock, sync }
    }

    pub async fn run(&self, first_boot: bool) -> Result<(), AppError> {
        self.sync.kick();

        for attempt in 1..=SYNC_ATTEMPTS {
            let epoch = self.clock.epoch_secs();
            if epoch >= PLAUSIBLE_MIN_EPOCH {
                tracing::info!(epoch, "System time is set");
                return Ok(());
            }
            tracing::info!("Waiting for system time to be set... ({attempt}/{SYNC_ATTEMPTS})");
            if attempt < SYNC_ATTEMPTS {
                tokio::time::sleep(SYNC_POLL_INTERVAL).await;
            }
        }

        if first_boot {
            // No reason to capture with a wrong clock before it was ever right.
            return Err(AppError::ClockUnset);
        }
        tracing::warn!(
            "Clock still implausible after {SYNC_ATTEMPTS} attempts, continuing with unsynced time"
        );
        Ok(())
    }
}
