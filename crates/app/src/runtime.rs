//! Pipeline wiring: builds every task from the loaded configuration, hands
//! each one a clone of the shared context (connectivity, clock, liveness),
//! and owns the fixed teardown order.

use std::sync::Arc;
use std::time::Duration;

use probenode_foundation::{system_clock, AppError, ConnectivityState, Liveness, SharedClock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::capture::{CaptureTask, FrameSource, ReplaySource};
use crate::config::Config;
use crate::indicator::{IndicatorTask, LogIndicator};
use crate::store::LogStore;
use crate::timesync::{ClockBootstrap, SystemTimeSync};
use crate::uplink::{MqttUplink, UplinkTask};

pub struct Runtime {
    liveness: Liveness,
    source: Box<dyn FrameSource>,
    uplink: Arc<MqttUplink>,
    indicator_handle: JoinHandle<()>,
    capture_handle: JoinHandle<()>,
    uplink_handle: JoinHandle<()>,
}

impl Runtime {
    /// Bring the node up: journal, clock bootstrap, indicator, broker
    /// connection, capture, uplink — in that order. `first_boot` governs
    /// whether a failed clock bootstrap is fatal.
    pub async fn start(cfg: &Config, first_boot: &mut bool) -> Result<Self, AppError> {
        let liveness = Liveness::new();
        let connectivity = ConnectivityState::new();
        let clock: SharedClock = system_clock();

        let store = Arc::new(LogStore::open(cfg.slot_a(), cfg.slot_b(), cfg.cycle_secs)?);

        ClockBootstrap::new(Arc::clone(&clock), Arc::new(SystemTimeSync))
            .run(*first_boot)
            .await?;
        *first_boot = false;

        tracing::info!("Starting indicator task...");
        let indicator_handle = IndicatorTask::new(
            Box::<LogIndicator>::default(),
            connectivity.clone(),
            liveness.clone(),
        )
        .spawn();

        let uplink = Arc::new(MqttUplink::connect(cfg, connectivity.clone()));

        tracing::info!("Starting capture task...");
        let mut source = Self::frame_source(cfg)?;
        let (event_tx, event_rx) = mpsc::channel(CaptureTask::CHANNEL_CAPACITY);
        source.start(event_tx)?;
        let capture_handle = CaptureTask::new(
            event_rx,
            Arc::clone(&store),
            connectivity.clone(),
            Arc::clone(&clock),
            liveness.clone(),
            Duration::from_secs(cfg.cycle_secs),
            cfg.verbose,
        )
        .spawn();

        tracing::info!("Starting uplink task...");
        let uplink_handle = UplinkTask::new(
            store,
            uplink.clone(),
            connectivity,
            clock,
            liveness.clone(),
            cfg.cycle_secs,
        )
        .spawn();

        Ok(Self {
            liveness,
            source,
            uplink,
            indicator_handle,
            capture_handle,
            uplink_handle,
        })
    }

    fn frame_source(cfg: &Config) -> Result<Box<dyn FrameSource>, AppError> {
        match &cfg.replay {
            Some(path) => Ok(Box::new(ReplaySource::new(
                path,
                Duration::from_millis(250),
            ))),
            None => Err(AppError::Config(
                "no frame source configured; attach a radio driver or set `replay`".into(),
            )),
        }
    }

    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Ordered teardown: indicator, capture, uplink tasks; then the frame
    /// source; then the broker connection. Mirrors the startup order in
    /// reverse of ownership, and never blocks on a task that is already gone.
    pub async fn shutdown(mut self) {
        tracing::warn!("Stopping indicator task...");
        self.indicator_handle.abort();
        let _ = self.indicator_handle.await;

        tracing::warn!("Stopping capture task...");
        self.capture_handle.abort();
        let _ = self.capture_handle.await;

        tracing::warn!("Stopping uplink task...");
        self.uplink_handle.abort();
        let _ = self.uplink_handle.await;

        tracing::warn!("Stopping frame source...");
        self.source.stop();

        tracing::warn!("Disconnecting from broker...");
        self.uplink.shutdown().await;
    }
}
