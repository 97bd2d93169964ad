use std::time::Duration;

use clap::Parser;
use probenode_app::config::{Cli, Config};
use probenode_app::runtime::Runtime;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    std::fs::create_dir_all("logs")?;
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "probenode.log");
    let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);
    let default_level = if verbose { "debug" } else { "info" };
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout.and(non_blocking_file))
        .with_env_filter(log_level)
        .init();
    std::mem::forget(guard);
    Ok(())
}

/// Log the countdown and hand the process back to the service manager, which
/// restarts it with fresh state.
fn reboot(msg: &str) -> ! {
    tracing::error!("{msg}");
    for i in (1..=3).rev() {
        tracing::warn!("Restarting in {i} seconds...");
        std::thread::sleep(Duration::from_secs(1));
    }
    tracing::warn!("Restarting now");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = match Config::load(&cli) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("probenode: {e}");
            std::process::exit(2);
        }
    };
    init_logging(cfg.verbose)?;

    tracing::info!("Starting probenode");
    if cfg.verbose {
        tracing::info!(
            device_id = %cfg.device_id,
            topic = %cfg.topic(),
            channel = cfg.channel,
            cycle_secs = cfg.cycle_secs,
            "Node identity"
        );
    }

    let mut first_boot = true;
    let runtime = match Runtime::start(&cfg, &mut first_boot).await {
        Ok(runtime) => runtime,
        Err(e) => reboot(&format!("Startup failed: {e}")),
    };
    tracing::info!("All tasks running");

    // Supervisor: block until a task reports fatal or the user asks to stop;
    // Ctrl-C is the only clean exit.
    let fatal = tokio::select! {
        _ = runtime.liveness().stopped() => true,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested via Ctrl-C");
            false
        }
    };

    runtime.shutdown().await;

    if fatal {
        reboot("Rebooting: fatal error occurred in a task");
    }
    tracing::info!("Shutdown complete");
    Ok(())
}
