use std::process::exit;

use cdefer::driver::{self, Cli};
use cdefer::logger;
use clap::Parser as ClapParser;
use log::error;

/// The main entry point for the application.
///
/// Parses command-line arguments and transpiles every input.
fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);
    if let Err(e) = driver::run(cli) {
        error!("{e}");
        exit(1);
    }
}
