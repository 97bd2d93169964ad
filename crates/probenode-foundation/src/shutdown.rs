use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// The supervisor's liveness flag: true from startup until the first fatal
/// report. Every task holds a clone; the supervisor loop polls it and tears
/// the process down once it goes false.
#[derive(Clone)]
pub struct Liveness {
    running: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

impl Liveness {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Log a fatal condition and flip the flag. Only the first report flips;
    /// later ones are still logged but change nothing.
    pub fn report_fatal(&self, msg: &str) {
        tracing::error!("{msg}");
        if self.running.swap(false, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    /// Resolves once the flag has gone false.
    pub async fn stopped(&self) {
        loop {
            let notified = self.notify.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}
