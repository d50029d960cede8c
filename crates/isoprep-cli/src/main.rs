use clap::Parser;
use isoprep_core::logging;

mod cli;

use crate::cli::Cli;

fn main() {
    let cli = Cli::parse();

    // Log file first; stderr if the state dir is unusable.
    if let Err(e) = logging::init_logging(cli.verbose) {
        logging::init_logging_stderr();
        tracing::warn!("file logging unavailable, using stderr: {:#}", e);
    }

    if let Err(err) = cli.run() {
        eprintln!("isoprep error: {:#}", err);
        std::process::exit(1);
    }
}
