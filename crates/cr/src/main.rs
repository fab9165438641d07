//! cr CLI - live CSS reload.
//!
//! Provides commands for:
//! - `serve`: Watch stylesheets and push changes to connected pages

mod commands;
mod error;
mod output;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::ServeArgs;
use error::CliError;
use output::Output;

/// cr - push stylesheet changes to the browser without reloading.
#[derive(Parser)]
#[command(name = "cr", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the reload server.
    Serve(ServeArgs),
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --debug enables DEBUG, --verbose enables INFO, otherwise RUST_LOG
    let filter = match &cli.command {
        Commands::Serve(args) if args.debug => EnvFilter::new("debug"),
        Commands::Serve(args) if args.verbose => EnvFilter::new("info"),
        Commands::Serve(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Commands::Serve(args) => tokio::runtime::Runtime::new()
            .map_err(CliError::from)
            .and_then(|rt| rt.block_on(args.execute())),
    };

    if let Err(err) = result {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}
