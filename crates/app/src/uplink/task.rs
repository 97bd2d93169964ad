//! Uplink task: on every cycle boundary, rotate the journal, drain the
//! frozen slot, and stream it to the broker as framed batches.
//!
//! Each batch is a marker line `F <cycleStart>` (`T` on the final batch)
//! followed by up to `BATCH_CAPACITY` record lines. A cycle with no records
//! still publishes a single `T` batch so consumers see the boundary.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use probenode_foundation::{AppError, ConnectivityState, Liveness, SharedClock};
use tokio::task::JoinHandle;

use crate::store::LogStore;

/// Record lines per published message, keeping each message inside the
/// 1024-byte legacy budget with the marker line.
pub const BATCH_CAPACITY: usize = 10;

#[async_trait]
pub trait BatchPublisher: Send + Sync {
    async fn publish(&self, payload: String) -> Result<(), AppError>;
}

/// Split a drained slot into publishable batches: `ceil(R / capacity)` of
/// them, at least one, with exactly the last carrying the `T` marker and the
/// same cycle start on every batch.
pub fn frame_batches(cycle_start: i64, records: &[String], capacity: usize) -> Vec<String> {
    let chunks: Vec<&[String]> = if records.is_empty() {
        vec![&[]]
    } else {
        records.chunks(capacity).collect()
    };

    let last = chunks.len() - 1;
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let marker = if i == last { 'T' } else { 'F' };
            let mut payload = format!("{marker} {cycle_start}\n");
            for line in *chunk {
                payload.push_str(line);
                payload.push('\n');
            }
            payload
        })
        .collect()
}

pub struct UplinkTask {
    store: Arc<LogStore>,
    publisher: Arc<dyn BatchPublisher>,
    connectivity: ConnectivityState,
    clock: SharedClock,
    liveness: Liveness,
    cycle_secs: u64,
}

impl UplinkTask {
    pub fn new(
        store: Arc<LogStore>,
        publisher: Arc<dyn BatchPublisher>,
        connectivity: ConnectivityState,
        clock: SharedClock,
        liveness: Liveness,
        cycle_secs: u64,
    ) -> Self {
        Self {
            store,
            publisher,
            connectivity,
            clock,
            liveness,
            cycle_secs,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        tracing::info!("Uplink task started");

        while self.liveness.is_running() {
            let wait = self.secs_to_boundary();
            tokio::time::sleep(Duration::from_secs(wait)).await;

            if !self.liveness.is_running() {
                break;
            }
            if let Err(e) = self.run_cycle().await {
                self.liveness.report_fatal(&format!("Uplink cycle failed: {e}"));
                break;
            }
        }

        tracing::info!("Uplink task stopped");
    }

    /// Seconds until the next multiple of the cycle period, so wakes stay
    /// aligned to wall-clock boundaries across restarts.
    fn secs_to_boundary(&self) -> u64 {
        let now = self.clock.epoch_secs();
        let cycle = self.cycle_secs as i64;
        (cycle - now.rem_euclid(cycle)) as u64
    }

    /// One cycle boundary. Skips entirely when the broker is down: no
    /// rotation, the active slot keeps accumulating for the next cycle.
    /// Store failures bubble up as fatal; publish failures are logged and
    /// the cycle's data is discarded regardless (the transport owns retry).
    pub async fn run_cycle(&self) -> Result<(), AppError> {
        if !self.connectivity.broker_linked() {
            tracing::warn!("Not connected to the broker, skipping uplink cycle");
            return Ok(());
        }

        let frozen = self.store.rotate();
        let now = self.clock.epoch_secs();
        let (cycle_start, records) = self.store.drain(frozen, now)?;

        tracing::info!(
            records = records.len(),
            cycle_start,
            "Publishing sniffed-packet journal"
        );
        for payload in frame_batches(cycle_start, &records, BATCH_CAPACITY) {
            if let Err(e) = self.publisher.publish(payload).await {
                tracing::warn!("Batch publish failed: {e}");
            }
        }

        self.store.reinit(frozen)?;
        Ok(())
    }
}
