//! Lithos CLI
//!
//! Entry point for the lithos command-line application.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lithos::cli::output::{display_error, OutputConfig};
use lithos::cli::Cli;
use lithos::core::settings::Settings;
use lithos::infra::dirs::LithosDirs;

/// Log filter for a `-v` count; `RUST_LOG` takes precedence
fn env_filter(verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .init();

    // Settings errors are reported by the command itself
    let settings = Settings::load(&LithosDirs::new()).unwrap_or_default();
    let output_config = OutputConfig::new(
        cli.quiet || settings.output.quiet.unwrap_or(false),
        cli.json || settings.output.json.unwrap_or(false),
        cli.verbose,
    );
    output_config.apply_global();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
