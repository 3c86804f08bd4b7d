//! Tugboat CLI
//!
//! Command-line entry point for building, tagging and deploying releases.

mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, OutputFormat, handle_command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tugboat")]
#[command(about = "Tugboat build, tag and deploy pipeline", long_about = None)]
struct Cli {
    /// Output format for command results
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Human)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so command results on stdout stay machine readable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tugboat_runner=info,tugboat_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    handle_command(cli.command, cli.output).await
}
