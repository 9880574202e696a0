//! idxlint CLI - find queried columns without a usable index.

use clap::Parser;

use idxlint_cli::cli::{Cli, Command};
use idxlint_cli::commands;
use idxlint_cli::error::CliResult;
use idxlint_cli::{logging, output};

#[tokio::main]
async fn main() {
    // Run the CLI and handle errors
    if let Err(e) = run().await {
        output::newline();
        output::error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run() -> CliResult<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    logging::init(cli.verbose);

    // Run the appropriate command
    match cli.command {
        Command::Check(args) => commands::check::run(args).await,
        Command::Baseline(args) => commands::baseline::run(args).await,
        Command::Version => commands::version::run().await,
    }
}
