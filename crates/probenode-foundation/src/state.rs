use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Point-in-time view of both links, taken under the connectivity lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkSnapshot {
    pub radio: bool,
    pub broker: bool,
}

/// Radio-link and broker-link flags, flipped only by the corresponding
/// driver/transport event handlers and snapshot-read by everyone else.
///
/// The two flags are independent: a broker link can only logically exist on
/// top of a radio link, but nothing here asserts that — the state simply
/// mirrors the two event streams.
#[derive(Clone, Default)]
pub struct ConnectivityState {
    inner: Arc<RwLock<LinkSnapshot>>,
    /// Latched once the driver reports any radio outcome, up or down. A
    /// failed first connection attempt counts as an outcome.
    radio_reported: Arc<AtomicBool>,
}

impl ConnectivityState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_radio(&self, linked: bool) {
        self.radio_reported.store(true, Ordering::SeqCst);
        let mut state = self.inner.write();
        if state.radio != linked {
            tracing::info!(linked, "Radio link changed");
            state.radio = linked;
        }
    }

    pub fn set_broker(&self, linked: bool) {
        let mut state = self.inner.write();
        if state.broker != linked {
            tracing::info!(linked, "Broker link changed");
            state.broker = linked;
        }
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        *self.inner.read()
    }

    pub fn radio_linked(&self) -> bool {
        self.inner.read().radio
    }

    pub fn broker_linked(&self) -> bool {
        self.inner.read().broker
    }

    pub fn radio_reported(&self) -> bool {
        self.radio_reported.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_reported_latches_on_any_radio_event() {
        let state = ConnectivityState::new();
        assert!(!state.radio_reported());

        // A down event (a failed connect attempt) latches it too.
        state.set_radio(false);
        assert!(state.radio_reported());
        assert!(!state.radio_linked());
    }

    #[test]
    fn flags_start_down_and_flip_independently() {
        let state = ConnectivityState::new();
        assert_eq!(state.snapshot(), LinkSnapshot::default());

        state.set_broker(true);
        assert!(!state.radio_linked());
        assert!(state.broker_linked());

        state.set_radio(true);
        state.set_broker(false);
        let snap = state.snapshot();
        assert!(snap.radio);
        assert!(!snap.broker);
    }
}
