//! CLI application extracting chess diagrams from scanned PDFs as FEN.

mod output;
mod process;

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// pdf2fen - Find chess diagrams in a scanned PDF and write their FEN
#[derive(Parser)]
#[command(name = "pdf2fen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(flatten)]
    process: process::ProcessArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let (Some(first), Some(last)) = (cli.process.start_page, cli.process.last_page) {
        if first > last {
            Cli::command()
                .error(
                    ErrorKind::ArgumentConflict,
                    format!("--start_page ({first}) must not exceed --last_page ({last})"),
                )
                .exit();
        }
    }

    // Set up logging based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    process::run(cli.process, cli.config.as_deref()).await
}
