//! feacat - convert, select and filter segmented feature files.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod pipeline;

use commands::{ConvertCommand, InfoCommand};

/// feacat - convert, select and filter segmented feature files.
///
/// Reads pre, LNA8, online-feature, ASCII and ILab streams, optionally picks
/// segments and columns, appends deltas, normalizes, and writes the result in
/// any of those formats.
///
/// A pipeline file (YAML or JSON) can describe the whole conversion; flags
/// override it.
#[derive(Parser)]
#[command(name = "feacat")]
#[command(about = "Segmented feature file conversion tool")]
#[command(version)]
pub struct Cli {
    /// Pipeline file (YAML or JSON)
    #[arg(short = 'f', long = "file", global = true)]
    pub pipeline: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output reports as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert and filter feature files
    Convert(ConvertCommand),
    /// Print segment and frame counts
    Info(InfoCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Output streams go to stdout, so logs go to stderr.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Convert(cmd) => cmd.run(&cli),
        Commands::Info(cmd) => cmd.run(&cli),
    }
}
