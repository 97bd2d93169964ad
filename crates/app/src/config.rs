//! Node configuration: a TOML file plus a few CLI/env overrides.

use std::path::{Path, PathBuf};

use clap::Parser;
use probenode_foundation::AppError;
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "probenode", about = "802.11 probe-request capture node")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "PROBENODE_CONFIG", default_value = "probenode.toml")]
    pub config: PathBuf,

    /// Enable verbose logging and frame hex dumps.
    #[arg(long)]
    pub verbose: bool,

    /// Replay frames from this hex-dump file instead of the configured source.
    #[arg(long)]
    pub replay: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Unique node identifier; also the MQTT client id.
    pub device_id: String,
    /// Deployment site label, first topic segment.
    pub site: String,
    /// Room label, second topic segment.
    pub room: String,
    /// Cycle length in seconds: the uplink period and rotation window.
    #[serde(default = "default_cycle_secs")]
    pub cycle_secs: u64,
    /// Radio channel to capture on, 1..=13.
    #[serde(default = "default_channel")]
    pub channel: u8,
    #[serde(default)]
    pub verbose: bool,
    pub broker: BrokerConfig,
    pub slots: SlotConfig,
    /// Credentials handed to the radio driver for the station link.
    pub wifi: Option<WifiConfig>,
    /// Hex-dump file for the replay frame source.
    pub replay: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    pub host: String,
    #[serde(default = "default_broker_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlotConfig {
    pub slot_a: PathBuf,
    pub slot_b: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
}

fn default_cycle_secs() -> u64 {
    60
}

fn default_channel() -> u8 {
    1
}

fn default_broker_port() -> u16 {
    1883
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(&cli.config).map_err(|e| {
            AppError::Config(format!(
                "cannot read config file {}: {e}",
                cli.config.display()
            ))
        })?;
        let mut cfg = Self::parse(&raw)?;
        if cli.verbose {
            cfg.verbose = true;
        }
        if let Some(replay) = &cli.replay {
            cfg.replay = Some(replay.clone());
        }
        Ok(cfg)
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let cfg: Config =
            toml::from_str(raw).map_err(|e| AppError::Config(format!("invalid config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !(1..=13).contains(&self.channel) {
            return Err(AppError::Config(format!(
                "radio channel must be 1..=13, got {}",
                self.channel
            )));
        }
        if self.cycle_secs == 0 {
            return Err(AppError::Config("cycle_secs must be nonzero".into()));
        }
        if self.slots.slot_a == self.slots.slot_b {
            return Err(AppError::Config("slot files must be distinct".into()));
        }
        Ok(())
    }

    /// Publish topic: `<site>/<room>/<deviceId>`.
    pub fn topic(&self) -> String {
        format!("{}/{}/{}", self.site, self.room, self.device_id)
    }

    pub fn slot_a(&self) -> &Path {
        &self.slots.slot_a
    }

    pub fn slot_b(&self) -> &Path {
        &self.slots.slot_b
    }
}
