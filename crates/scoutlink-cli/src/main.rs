//! Scoutlink operator CLI entrypoint.
//!
//! Offline transfer of scouting data between devices over a QR channel:
//! - `scoutlink generate` - emit a store category as armored fountain frames
//! - `scoutlink scan` - rebuild a transfer from frames and merge it into a store

#![forbid(unsafe_code)]

mod generate;
mod scan;

use clap::{Parser, Subcommand};

/// Offline QR transfer for scouting data.
#[derive(Parser)]
#[command(name = "scoutlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit a store category as armored fountain frames on stdout.
    ///
    /// Each line is one self-describing frame for the QR layer to display.
    /// The default batch is the systematic pass plus coded overhead; --loop
    /// streams forever the way a cycling display does.
    Generate(generate::GenerateArgs),

    /// Rebuild a transfer from armored frames and merge it into the store.
    ///
    /// Reads frames from stdin (or --input), in any order and with any amount
    /// of loss or duplication, until the payload verifies. Prints a JSON merge
    /// report on stdout.
    Scan(scan::ScanArgs),
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber for structured logging.
    // Write logs to stderr so stdout is clean for frames and JSON reports.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => generate::run(&args),
        Commands::Scan(args) => scan::run(&args),
    }
}
