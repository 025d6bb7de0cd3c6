mod adapter;
mod logging;
mod poller;
mod shutdown;

use std::{panic, process::ExitCode};

use anyhow::Result;
use jirareport_config::{default_config_path, ReportConfig};
use tracing::{error, info};

fn main() -> ExitCode {
    let config = match ReportConfig::load_default() {
        Ok(config) => config,
        Err(error) => {
            eprintln!("Fatal error: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = match logging::init(&config.log) {
        Ok(guard) => guard,
        Err(error) => {
            eprintln!("Fatal error: {error:#}");
            return ExitCode::FAILURE;
        }
    };

    // Panics still abort the process; make sure they land in the log first.
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        error!("Fatal error: {panic_info}");
        original_hook(panic_info);
    }));

    match run(&config) {
        Ok(()) => {
            info!("Stopped by user. Exiting.");
            ExitCode::SUCCESS
        }
        Err(error) => {
            error!("Fatal error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &ReportConfig) -> Result<()> {
    let poller = adapter::build_poller(config)?;
    let shutdown = shutdown::listen_for_interrupt();

    info!(
        "Starting Jira report for {} (config {}), writing {} every {} seconds.",
        config.jira.project,
        default_config_path().display(),
        config.report.output.display(),
        config.schedule.refresh_interval.as_secs()
    );
    if let Some(publisher) = poller.publisher() {
        info!(
            "Publishing to {}/{} from {}.",
            config.publish.remote,
            config.publish.branch,
            publisher.repo_dir().display()
        );
    }

    poller.run(&shutdown);
    Ok(())
}
