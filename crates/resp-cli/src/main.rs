mod cli;
mod commands;
mod error;
mod logging;
mod utils;

use crate::cli::{Cli, Commands};
use crate::error::Result;
use clap::Parser;
use tracing::{debug, error, info};

fn main() {
    let code = match run_app() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("\n❌ Error: {}", e);
            1
        }
    };
    std::process::exit(code);
}

fn run_app() -> Result<i32> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.clone())?;

    info!("respfit CLI v{} starting up.", env!("CARGO_PKG_VERSION"));
    debug!("Full CLI arguments parsed: {:?}", &cli);

    let result = match cli.command {
        Commands::Run(args) => {
            info!("Dispatching to 'run' command.");
            commands::run::run(args)
        }
        Commands::Status(args) => {
            info!("Dispatching to 'status' command.");
            commands::status::run(args)
        }
        Commands::Clean(args) => {
            info!("Dispatching to 'clean' command.");
            commands::clean::run(args)
        }
    };

    match &result {
        Ok(code) => info!("Command finished with exit code {}.", code),
        Err(e) => error!("❌ Command failed: {}", e),
    }

    result
}
