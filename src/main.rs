//! Main entry point for orpheus CLI

use clap::Parser;
use orpheus::cli::Cli;
use orpheus::commands::execute_command;

fn main() {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let cli = Cli::parse();

    if cli.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }

    if let Err(e) = execute_command(cli.command, cli.workspace.as_deref(), cli.user.as_deref()) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
