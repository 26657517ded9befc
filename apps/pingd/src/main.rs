use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, level_filters::LevelFilter};

use uppe_pingd::cli::Cli;
use uppe_pingd::daemon::Daemon;
use uppe_pingd::lifecycle::{Shutdown, signals};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init_with_level(if cli.verbose { LevelFilter::DEBUG } else { LevelFilter::INFO });

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("pingdaemon: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config()?;

    if cli.show_config {
        print!("{config}");
        return Ok(());
    }
    debug!("{}", config);

    let daemon = Daemon::open(config).await?;

    let shutdown = Arc::new(Shutdown::new());
    signals::spawn_signal_listener(Arc::clone(&shutdown));

    info!(
        host = %daemon.config().probe.target,
        method = %daemon.config().probe.method,
        "Starting ping daemon"
    );
    let report = daemon.run(shutdown.subscribe()).await;

    let (persisted, dropped) = report.writer.map(|w| (w.persisted, w.dropped)).unwrap_or_default();
    info!(
        ticks = report.ticks,
        launched = report.launched,
        skipped = report.skipped,
        discarded = report.discarded,
        persisted,
        dropped,
        "Ping daemon stopped"
    );
    Ok(())
}
