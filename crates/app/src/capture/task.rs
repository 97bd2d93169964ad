//! Capture task: drains the source channel, parses probe requests, and
//! journals the records. The parse-and-journal work runs here, in the task's
//! own scheduled context — never inside the driver callback that produced the
//! frame.

use std::sync::Arc;
use std::time::Duration;

use probenode_foundation::{ConnectivityState, Liveness, SharedClock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{frame, SourceEvent};
use crate::store::LogStore;

pub struct CaptureTask {
    events: mpsc::Receiver<SourceEvent>,
    store: Arc<LogStore>,
    connectivity: ConnectivityState,
    clock: SharedClock,
    liveness: Liveness,
    cycle: Duration,
    verbose: bool,
}

impl CaptureTask {
    /// Channel capacity between the driver callback context and this task.
    pub const CHANNEL_CAPACITY: usize = 256;

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        events: mpsc::Receiver<SourceEvent>,
        store: Arc<LogStore>,
        connectivity: ConnectivityState,
        clock: SharedClock,
        liveness: Liveness,
        cycle: Duration,
        verbose: bool,
    ) -> Self {
        Self {
            events,
            store,
            connectivity,
            clock,
            liveness,
            cycle,
            verbose,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        tracing::info!("Capture task started");

        let mut reset_timer = tokio::time::interval(self.cycle);
        reset_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        reset_timer.tick().await; // the first tick fires immediately

        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(SourceEvent::Frame { bytes, rssi }) => {
                        if let Err(e) = self.handle_frame(&bytes, rssi) {
                            self.liveness
                                .report_fatal(&format!("Journal write failed: {e}"));
                            break;
                        }
                    }
                    Some(SourceEvent::RadioUp) => self.connectivity.set_radio(true),
                    Some(SourceEvent::RadioDown) => self.connectivity.set_radio(false),
                    None => {
                        tracing::warn!("Frame source channel closed");
                        break;
                    }
                },
                _ = reset_timer.tick() => self.bound_storage(),
            }
        }

        tracing::info!("Capture task stopped");
    }

    fn handle_frame(&self, bytes: &[u8], rssi: i8) -> Result<(), probenode_foundation::StoreError> {
        let now = self.clock.epoch_secs();
        let Some(record) = frame::parse(bytes, rssi, now) else {
            return Ok(());
        };

        if self.verbose {
            tracing::debug!("Frame dump:\n{}", frame::hex_dump(bytes));
        }
        tracing::info!(
            mac = %record.mac_string(),
            ssid = %record.ssid,
            rssi = record.rssi,
            sn = record.sequence,
            "Probe request captured"
        );

        self.store.write(&record, now)
    }

    /// Once per cycle: if the broker has been unreachable, drop the active
    /// slot's contents so storage stays bounded while the uplink cannot run.
    fn bound_storage(&self) {
        if self.connectivity.broker_linked() {
            return;
        }
        tracing::warn!("Broker offline for a full cycle, resetting active slot");
        if let Err(e) = self.store.reset_active() {
            self.liveness
                .report_fatal(&format!("Slot reset failed: {e}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use probenode_foundation::TestClock;
    use tempfile::tempdir;

    fn test_store(dir: &tempfile::TempDir) -> Arc<LogStore> {
        Arc::new(
            LogStore::open(
                dir.path().join("slot_a.log"),
                dir.path().join("slot_b.log"),
                60,
            )
            .unwrap(),
        )
    }

    fn probe_frame() -> Vec<u8> {
        let mut frame = vec![0u8; 60];
        frame[0] = 0x40;
        frame[10..16].copy_from_slice(&[0x02, 0x11, 0x22, 0x33, 0x44, 0x55]);
        frame[25] = 3;
        frame[26..29].copy_from_slice(b"abc");
        frame
    }

    #[tokio::test]
    async fn frames_flow_into_the_journal() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let clock: SharedClock = Arc::new(TestClock::new(1_700_000_042));
        let (tx, rx) = mpsc::channel(CaptureTask::CHANNEL_CAPACITY);

        let task = CaptureTask::new(
            rx,
            Arc::clone(&store),
            ConnectivityState::new(),
            clock,
            Liveness::new(),
            Duration::from_secs(60),
            false,
        );
        let handle = task.spawn();

        tx.send(SourceEvent::RadioUp).await.unwrap();
        tx.send(SourceEvent::Frame {
            bytes: probe_frame(),
            rssi: -55,
        })
        .await
        .unwrap();
        // Not a probe request; must be ignored without error.
        tx.send(SourceEvent::Frame {
            bytes: vec![0x80; 60],
            rssi: -55,
        })
        .await
        .unwrap();
        drop(tx);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("slot_a.log")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "1700000040");
        assert!(lines[1].starts_with("02:11:22:33:44:55 abc 1700000042"));
    }

    #[tokio::test(start_paused = true)]
    async fn no_broker_cycle_resets_the_active_slot() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let clock: SharedClock = Arc::new(TestClock::new(1_700_000_000));
        let connectivity = ConnectivityState::new();
        let (tx, rx) = mpsc::channel(CaptureTask::CHANNEL_CAPACITY);

        let task = CaptureTask::new(
            rx,
            Arc::clone(&store),
            connectivity.clone(),
            clock,
            Liveness::new(),
            Duration::from_secs(60),
            false,
        );
        let handle = task.spawn();

        tx.send(SourceEvent::Frame {
            bytes: probe_frame(),
            rssi: -55,
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!std::fs::read_to_string(dir.path().join("slot_a.log"))
            .unwrap()
            .is_empty());

        // A full cycle elapses with the broker flag down.
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(std::fs::read_to_string(dir.path().join("slot_a.log"))
            .unwrap()
            .is_empty());

        drop(tx);
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn broker_linked_cycle_keeps_the_active_slot() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let clock: SharedClock = Arc::new(TestClock::new(1_700_000_000));
        let connectivity = ConnectivityState::new();
        connectivity.set_broker(true);
        let (tx, rx) = mpsc::channel(CaptureTask::CHANNEL_CAPACITY);

        let task = CaptureTask::new(
            rx,
            Arc::clone(&store),
            connectivity.clone(),
            clock,
            Liveness::new(),
            Duration::from_secs(60),
            false,
        );
        let handle = task.spawn();

        tx.send(SourceEvent::Frame {
            bytes: probe_frame(),
            rssi: -55,
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(!std::fs::read_to_string(dir.path().join("slot_a.log"))
            .unwrap()
            .is_empty());

        drop(tx);
        handle.await.unwrap();
    }
}
