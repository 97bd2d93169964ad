//! End-to-end smoke test: replay source → capture task → journal → uplink
//! batches, with a recording publisher standing in for the broker.

use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use probenode_app::capture::{CaptureTask, FrameSource, ReplaySource};
use probenode_app::store::LogStore;
use probenode_app::uplink::{BatchPublisher, UplinkTask};
use probenode_foundation::{system_clock, AppError, ConnectivityState, Liveness};
use tokio::sync::mpsc;

struct RecordingPublisher {
    batches: Mutex<Vec<String>>,
}

#[async_trait]
impl BatchPublisher for RecordingPublisher {
    async fn publish(&self, payload: String) -> Result<(), AppError> {
        self.batches.lock().push(payload);
        Ok(())
    }
}

/// A minimal probe request with SSID "lab" and an FCS trailer, as a replay
/// line at -58 dBm.
fn replay_line() -> String {
    let mut frame = vec![0u8; 60];
    frame[0] = 0x40;
    frame[10..16].copy_from_slice(&[0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee]);
    frame[25] = 3;
    frame[26..29].copy_from_slice(b"lab");
    let hex: String = frame.iter().map(|b| format!("{b:02x}")).collect();
    format!("-58 {hex}")
}

#[tokio::test]
async fn captured_frames_end_up_in_published_batches() {
    let dir = tempfile::tempdir().unwrap();
    let mut replay = tempfile::NamedTempFile::new().unwrap();
    writeln!(replay, "{}", replay_line()).unwrap();
    replay.flush().unwrap();

    let store = Arc::new(
        LogStore::open(
            dir.path().join("slot_a.log"),
            dir.path().join("slot_b.log"),
            60,
        )
        .unwrap(),
    );
    let connectivity = ConnectivityState::new();
    let liveness = Liveness::new();
    let clock = system_clock();

    let mut source = ReplaySource::new(replay.path(), Duration::from_millis(5));
    let (event_tx, event_rx) = mpsc::channel(CaptureTask::CHANNEL_CAPACITY);
    source.start(event_tx).unwrap();

    let capture = CaptureTask::new(
        event_rx,
        Arc::clone(&store),
        connectivity.clone(),
        Arc::clone(&clock),
        liveness.clone(),
        Duration::from_secs(60),
        false,
    )
    .spawn();

    // Let the replay loop deliver a handful of frames.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(connectivity.radio_linked());

    connectivity.set_broker(true);
    let publisher = Arc::new(RecordingPublisher {
        batches: Mutex::new(Vec::new()),
    });
    let uplink = UplinkTask::new(
        Arc::clone(&store),
        publisher.clone(),
        connectivity,
        clock,
        liveness,
        60,
    );
    uplink.run_cycle().await.unwrap();

    let batches = publisher.batches.lock();
    assert!(!batches.is_empty());
    let last = batches.last().unwrap();
    assert!(last.starts_with("T "));
    assert!(
        batches
            .iter()
            .any(|b| b.contains("02:aa:bb:cc:dd:ee lab ")),
        "expected a record line in {batches:?}"
    );

    source.stop();
    capture.abort();
    let _ = capture.await;
}
