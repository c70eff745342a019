mod background;
mod cli;
mod progress;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use engine_logging::{engine_error, LogDestination, LOG_FILENAME};
use log::LevelFilter;
use mirror_core::is_background;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if cli.background && !is_background() {
        return match background::relaunch(&working_dir) {
            Ok(pid) => {
                println!("Continuing in background, pid {pid}.");
                println!("Output will be written to \"{LOG_FILENAME}\".");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("wget-mirror: {err:#}");
                ExitCode::FAILURE
            }
        };
    }

    let background = is_background();
    let destination = if background {
        LogDestination::background_in(&working_dir)
    } else {
        LogDestination::Terminal
    };
    engine_logging::initialize(destination, log_level(background, cli.verbose));

    match run::execute(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if background {
                engine_error!("{err:#}");
            } else {
                eprintln!("wget-mirror: {err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

/// Per-URL results are logged at info. In the foreground they are printed
/// by the progress sink instead, so the terminal only shows warnings.
fn log_level(background: bool, verbose: bool) -> LevelFilter {
    match (verbose, background) {
        (true, _) => LevelFilter::Debug,
        (false, true) => LevelFilter::Info,
        (false, false) => LevelFilter::Warn,
    }
}
