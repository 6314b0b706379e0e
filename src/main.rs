mod cli;

use clap::Parser;
use cli::Cli;
use scpr_core::{CancelToken, ProgressBar};
use scpr_scp::ScpCopier;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    // Also installs the `log` bridge used by the library crates.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("scpr: config failed: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_logging(config.verbose);
    debug!("Effective config: {:?}", config);

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted");
                cancel.cancel();
            }
        });
    }

    let quiet = config.quiet;
    let mut copier = ScpCopier::from_process(config);
    if !quiet {
        copier = copier.with_progress(Box::new(ProgressBar::stderr()));
    }

    match copier.copy(&cli.source, &cli.destination, &cancel).await {
        Ok(report) => {
            debug!(
                "{} files, {} directories, {} bytes",
                report.stats.files, report.stats.directories, report.stats.bytes
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("scpr: {}", e.diagnostic());
            ExitCode::FAILURE
        }
    }
}
