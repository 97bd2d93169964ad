//! Radio driver seam.
//!
//! The real promiscuous-mode driver lives outside this crate; it hands us
//! frames and link transitions through a bounded channel. Delivery happens in
//! the driver's own callback context, so implementations must only ever
//! `try_send` — a full channel drops the frame, it never blocks the driver.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use probenode_foundation::AppError;
use tokio::sync::mpsc;

/// Events a frame source delivers to the capture task.
#[derive(Debug, Clone)]
pub enum SourceEvent {
    /// One captured frame, radio header stripped, FCS trailer included.
    Frame { bytes: Vec<u8>, rssi: i8 },
    RadioUp,
    RadioDown,
}

pub trait FrameSource: Send {
    /// Begin delivering events into `events`. Must not block the caller.
    fn start(&mut self, events: mpsc::Sender<SourceEvent>) -> Result<(), AppError>;

    /// Stop delivery. Idempotent.
    fn stop(&mut self);
}

/// Replays hex-dumped frames from a file, in a loop, as if the radio were
/// observing them live. Line format: `<rssi> <hex-bytes>`; blank lines and
/// `#` comments are skipped. Used for bench and demo runs where no capture
/// hardware is attached.
pub struct ReplaySource {
    path: PathBuf,
    interval: Duration,
    running: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl ReplaySource {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            running: Arc::new(AtomicBool::new(false)),
            dropped: Arc::new(AtomicU64::new(0)),
            handle: None,
        }
    }

    pub fn frames_dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn load_frames(&self) -> Result<Vec<(i8, Vec<u8>)>, AppError> {
        let file = File::open(&self.path).map_err(|e| {
            AppError::Config(format!(
                "cannot open replay file {}: {e}",
                self.path.display()
            ))
        })?;

        let mut frames = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|e| {
                AppError::Config(format!("cannot read replay file {}: {e}", self.path.display()))
            })?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_replay_line(line) {
                Some(frame) => frames.push(frame),
                None => tracing::warn!(line, "Skipping malformed replay line"),
            }
        }
        Ok(frames)
    }
}

impl FrameSource for ReplaySource {
    fn start(&mut self, events: mpsc::Sender<SourceEvent>) -> Result<(), AppError> {
        let frames = self.load_frames()?;
        if frames.is_empty() {
            return Err(AppError::Config(format!(
                "replay file {} holds no frames",
                self.path.display()
            )));
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let dropped = Arc::clone(&self.dropped);
        let interval = self.interval;

        let handle = std::thread::spawn(move || {
            let _ = events.try_send(SourceEvent::RadioUp);
            tracing::info!(frames = frames.len(), "Replay source started");

            while running.load(Ordering::SeqCst) {
                for (rssi, bytes) in &frames {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let event = SourceEvent::Frame {
                        bytes: bytes.clone(),
                        rssi: *rssi,
                    };
                    if events.try_send(event).is_err() {
                        let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        tracing::warn!(total, "Capture channel full, frame dropped");
                    }
                    std::thread::sleep(interval);
                }
            }

            let _ = events.try_send(SourceEvent::RadioDown);
            tracing::info!("Replay source stopped");
        });

        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        let dropped = self.frames_dropped();
        if dropped > 0 {
            tracing::warn!(dropped, "Frames were dropped while the capture channel was full");
        }
    }
}

fn parse_replay_line(line: &str) -> Option<(i8, Vec<u8>)> {
    let (rssi, hex) = line.split_once(' ')?;
    let rssi = rssi.parse::<i8>().ok()?;
    let bytes = decode_hex(hex.trim())?;
    Some((rssi, bytes))
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn replay_lines_decode() {
        let (rssi, bytes) = parse_replay_line("-71 40000102").unwrap();
        assert_eq!(rssi, -71);
        assert_eq!(bytes, vec![0x40, 0x00, 0x01, 0x02]);

        assert!(parse_replay_line("not-a-frame").is_none());
        assert!(parse_replay_line("-71 abc").is_none());
    }

    #[tokio::test]
    async fn replay_source_delivers_radio_up_then_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "-60 400001").unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::new(file.path(), Duration::from_millis(1));
        let (tx, mut rx) = mpsc::channel(16);
        source.start(tx).unwrap();

        assert!(matches!(rx.recv().await, Some(SourceEvent::RadioUp)));
        match rx.recv().await {
            Some(SourceEvent::Frame { bytes, rssi }) => {
                assert_eq!(bytes, vec![0x40, 0x00, 0x01]);
                assert_eq!(rssi, -60);
            }
            other => panic!("expected frame, got {other:?}"),
        }
        source.stop();
    }

    #[test]
    fn full_channel_drops_frames_and_counts_them() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "-60 400001").unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::new(file.path(), Duration::ZERO);
        // Capacity 1 is consumed by the RadioUp event and never drained.
        let (tx, rx) = mpsc::channel(1);
        source.start(tx).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        source.stop();
        drop(rx);

        assert!(source.frames_dropped() > 0);
    }

    #[test]
    fn missing_replay_file_is_a_config_error() {
        let mut source = ReplaySource::new("/nonexistent/frames.hex", Duration::from_millis(1));
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(source.start(tx), Err(AppError::Config(_))));
    }
}
