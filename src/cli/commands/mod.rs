//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod check;
pub mod doctor;
pub mod formula;
pub mod provision;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

/// Parse a `name=/dev/path` alias mapping
pub fn parse_alias(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((alias, device)) if !alias.is_empty() && !device.is_empty() => {
            Ok((alias.to_string(), device.to_string()))
        }
        _ => Err(format!("expected NAME=DEVICE, got '{value}'")),
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve a disk configuration and print its partition plan
    Check {
        /// Disk configuration file
        config: PathBuf,

        /// Map a disk alias to a device (repeatable)
        #[arg(long = "alias", value_name = "NAME=DEVICE", value_parser = parse_alias)]
        aliases: Vec<(String, String)>,

        /// Sector size to plan with
        #[arg(long)]
        sector_size: Option<u32>,

        /// Require the boot and root partitions a system installation needs
        #[arg(long)]
        system: bool,
    },

    /// Partition devices and create filesystems (destroys existing data)
    Provision {
        /// Disk configuration file
        #[arg(conflicts_with = "device")]
        config: Option<PathBuf>,

        /// Provision a single device with the built-in layout
        #[arg(long, requires = "root_size")]
        device: Option<String>,

        /// Root partition size for the built-in layout
        #[arg(long, requires = "device")]
        root_size: Option<String>,

        /// Home partition size for the built-in layout (default: rest of disk)
        #[arg(long, requires = "device")]
        home_size: Option<String>,

        /// Map a disk alias to a device (repeatable)
        #[arg(long = "alias", value_name = "NAME=DEVICE", value_parser = parse_alias)]
        aliases: Vec<(String, String)>,

        /// Plan with this sector size instead of querying each device
        #[arg(long)]
        sector_size: Option<u32>,

        /// Only write partition tables
        #[arg(long)]
        skip_filesystems: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Resolve a formula with its inherited formulas and print the result
    Formula {
        /// Formula file
        file: PathBuf,
    },

    /// Check host tools and settings
    Doctor,
}

impl Commands {
    /// Execute the command
    pub async fn run(self) -> Result<()> {
        match self {
            Self::Check {
                config,
                aliases,
                sector_size,
                system,
            } => check::execute(&config, &aliases, sector_size, system).await,
            Self::Provision {
                config,
                device,
                root_size,
                home_size,
                aliases,
                sector_size,
                skip_filesystems,
                yes,
            } => {
                let args = provision::ProvisionArgs {
                    config,
                    device,
                    root_size,
                    home_size,
                    aliases,
                    sector_size,
                    skip_filesystems,
                    yes,
                };
                provision::execute(args).await
            }
            Self::Formula { file } => formula::execute(&file).await,
            Self::Doctor => doctor::execute().await,
        }
    }
}
