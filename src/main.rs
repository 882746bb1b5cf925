//! devloop - restart a local web app on source changes and live-reload the browser.

mod cli;
mod config;
mod embed;
mod error;
mod logger;
mod probe;
mod process;
mod reload;
mod serve;
mod shutdown;
mod utils;
mod watch;

use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::DevConfig;

fn main() {
    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    if let Err(e) = run(&cli) {
        log!("error"; "{:#}", e);
        std::process::exit(2);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    // before anything binds or spawns
    let cancel = shutdown::setup_shutdown_handler()?;
    let config = DevConfig::load(cli)?;

    match &cli.command {
        Commands::Runserver { .. } => cli::runserver::run(&config, cancel),
        Commands::Serve { .. } => cli::serve::run(&config, cancel),
    }
}
