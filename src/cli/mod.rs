//! The `lithos` command line
//!
//! Parses arguments into [`Cli`] and dispatches to [`commands`]. Layout
//! resolution, planning and provisioning live in [`crate::core`]; this
//! module only turns their results into terminal or JSON output.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::{CommandFactory, Parser};

use commands::Commands;

/// Lithos - declarative disk provisioning and system formulas
///
/// Resolve disk layouts and formulas, then partition devices and create
/// filesystems from them.
#[derive(Parser, Debug)]
#[command(name = "lithos")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Log progress to stderr (-v info, -vv debug; RUST_LOG overrides)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print only errors (the provision confirmation prompt still appears)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Print plans, formulas and provisioning outcomes as one JSON document
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Dispatch to the selected subcommand
    pub async fn run(self) -> Result<()> {
        match self.command {
            Some(command) => command.run().await,
            // Bare `lithos` prints usage instead of touching any disk
            None => {
                Self::command().print_help()?;
                Ok(())
            }
        }
    }
}
