//! Link indicator: one binary output driven by a four-state blink table.
//!
//! The pattern is re-read from connectivity state at every on/off period, so
//! a link change shows up within one period rather than instantaneously.

use std::time::Duration;

use probenode_foundation::{ConnectivityState, LinkSnapshot, Liveness};
use tokio::task::JoinHandle;

/// The binary output itself. The production build on capture hardware drives
/// a GPIO pin; the default here just traces transitions.
pub trait Indicator: Send {
    fn set(&mut self, on: bool);
}

#[derive(Default)]
pub struct LogIndicator {
    on: bool,
}

impl Indicator for LogIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            self.on = on;
            tracing::trace!(on, "Indicator");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// Before the driver has reported any radio outcome.
    Startup,
    /// Radio up, broker down.
    RadioOnly,
    /// Radio down after a reported outcome, a failed first connection
    /// attempt included.
    Disconnected,
    /// Both links up.
    BrokerLinked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlinkPattern {
    pub on_ms: u64,
    pub off_ms: u64,
}

impl LinkPhase {
    pub fn from_links(snapshot: LinkSnapshot, attempted: bool) -> Self {
        match (snapshot.radio, snapshot.broker) {
            (true, true) => LinkPhase::BrokerLinked,
            (true, false) => LinkPhase::RadioOnly,
            (false, _) if attempted => LinkPhase::Disconnected,
            (false, _) => LinkPhase::Startup,
        }
    }

    pub fn pattern(self) -> BlinkPattern {
        match self {
            LinkPhase::Startup => BlinkPattern {
                on_ms: 100,
                off_ms: 100,
            },
            LinkPhase::RadioOnly => BlinkPattern {
                on_ms: 2000,
                off_ms: 5,
            },
            LinkPhase::Disconnected => BlinkPattern {
                on_ms: 5,
                off_ms: 2000,
            },
            LinkPhase::BrokerLinked => BlinkPattern {
                on_ms: 1000,
                off_ms: 1000,
            },
        }
    }
}

pub struct IndicatorTask {
    output: Box<dyn Indicator>,
    connectivity: ConnectivityState,
    liveness: Liveness,
}

impl IndicatorTask {
    pub fn new(
        output: Box<dyn Indicator>,
        connectivity: ConnectivityState,
        liveness: Liveness,
    ) -> Self {
        Self {
            output,
            connectivity,
            liveness,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Current phase. `attempted` latches once the driver reports the first
    /// radio outcome and stays set for the task's lifetime.
    fn phase(&self, attempted: &mut bool) -> LinkPhase {
        *attempted |= self.connectivity.radio_reported();
        LinkPhase::from_links(self.connectivity.snapshot(), *attempted)
    }

    async fn run(mut self) {
        tracing::info!("Indicator task started");
        let mut attempted = false;

        while self.liveness.is_running() {
            let pattern = self.phase(&mut attempted).pattern();

            self.output.set(true);
            tokio::time::sleep(Duration::from_millis(pattern.on_ms)).await;
            self.output.set(false);
            tokio::time::sleep(Duration::from_millis(pattern.off_ms)).await;
        }

        self.output.set(false);
        tracing::info!("Indicator task stopped");
    }
}
