//! Provision command implementation
//!
//! Implements `lithos provision`: resolve the layout (from a file or the
//! built-in single-device layout), confirm, then write partition tables and
//! create filesystems on every disk. Ctrl-C stops before the next step.

use std::collections::HashSet;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;

use crate::cli::output::{
    create_spinner, is_json, print_detail, print_json, print_success, print_warning, status,
};
use crate::core::disk::DiskLayout;
use crate::core::layout::default_layout;
use crate::core::provision::{DiskOutcome, ProvisionOptions, Provisioner};
use crate::core::settings::Settings;
use crate::infra::dirs::LithosDirs;
use crate::infra::process::SystemRunner;

/// Arguments of `lithos provision`
#[derive(Debug, Clone, Default)]
pub struct ProvisionArgs {
    pub config: Option<PathBuf>,
    pub device: Option<String>,
    pub root_size: Option<String>,
    pub home_size: Option<String>,
    pub aliases: Vec<(String, String)>,
    pub sector_size: Option<u32>,
    pub skip_filesystems: bool,
    pub yes: bool,
}

fn load_layout(args: &ProvisionArgs) -> Result<DiskLayout> {
    match (&args.config, &args.device) {
        (Some(path), _) => DiskLayout::load(path)
            .with_context(|| format!("Failed to resolve {}", path.display())),
        (None, Some(device)) => {
            let root_size = args
                .root_size
                .as_deref()
                .context("--root-size is required with --device")?;
            Ok(default_layout(device, root_size, args.home_size.as_deref())?)
        }
        (None, None) => bail!(
            "Nothing to provision. Pass a disk configuration file, or --device with --root-size."
        ),
    }
}

/// Device paths that appear more than once
fn duplicate_devices(layout: &DiskLayout) -> Vec<&str> {
    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for disk in layout.disks() {
        if !seen.insert(disk.name.as_str()) && !duplicates.contains(&disk.name.as_str()) {
            duplicates.push(disk.name.as_str());
        }
    }
    duplicates
}

/// Require user confirmation before destroying data
fn require_confirmation(layout: &DiskLayout) -> Result<()> {
    eprintln!();
    eprintln!("⚠️  WARNING: This will erase every partition on:");
    for disk in layout.disks() {
        eprintln!("   {} ({} partition(s), {})", disk.name, disk.partitions.len(), disk.scheme);
    }
    eprintln!();
    eprint!("   Are you sure you want to continue? [y/N] ");
    io::stderr().flush()?;

    // In non-interactive mode (no TTY), fail
    if !io::stdin().is_terminal() {
        bail!(
            "Cannot prompt for confirmation in non-interactive mode.\n\
             Use --yes to skip confirmation."
        );
    }

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    if input != "y" && input != "yes" {
        bail!("Provisioning cancelled by user.");
    }

    Ok(())
}

fn print_outcome(outcome: &DiskOutcome) {
    match &outcome.error {
        None => {
            print_success(&format!("{} provisioned", outcome.disk));
            if let Some(table) = &outcome.table {
                for partition in &table.partitions {
                    print_detail(&format!(
                        "{} -> {}",
                        partition.name,
                        partition.path.display()
                    ));
                }
            }
        }
        Some(error) => {
            eprintln!(
                "{} {} failed after '{}': {error}",
                status::ERROR,
                outcome.disk,
                outcome.last_completed
            );
        }
    }
}

/// Execute the provision command
pub async fn execute(args: ProvisionArgs) -> Result<()> {
    let dirs = LithosDirs::new();
    let settings = Settings::load(&dirs)?;

    let mut layout = load_layout(&args)?;
    layout.validate_for_system()?;

    layout.apply_aliases(&settings.merged_aliases(&args.aliases));
    let unresolved = layout.unresolved_aliases();
    if !unresolved.is_empty() {
        bail!(
            "Unresolved disk aliases: {}. Map them with --alias NAME=DEVICE or in the [aliases] settings section.",
            unresolved.join(", ")
        );
    }

    let duplicates = duplicate_devices(&layout);
    if !duplicates.is_empty() {
        bail!(
            "Devices listed more than once: {}",
            duplicates.join(", ")
        );
    }

    if !args.yes {
        require_confirmation(&layout)?;
    }

    let options = ProvisionOptions {
        mount_root: settings.mount_root(&dirs),
        sector_size: args.sector_size.or(settings.provision.sector_size),
        create_filesystems: !args.skip_filesystems,
    };

    let token = CancellationToken::new();
    let signal_token = token.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            print_warning("Interrupted, stopping before the next step...");
            signal_token.cancel();
        }
    });

    let spinner = create_spinner("Provisioning disks...");
    let outcomes = tokio::task::spawn_blocking(move || {
        let runner = SystemRunner;
        Provisioner::new(&runner, options)
            .with_cancellation(token)
            .provision_all(&layout)
    })
    .await
    .context("Provisioning worker failed")?;
    spinner.finish_and_clear();
    watcher.abort();

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();

    if is_json() {
        print_json(&serde_json::json!({
            "status": if failed == 0 { "success" } else { "error" },
            "disks": outcomes,
        }));
        if failed > 0 {
            std::process::exit(1);
        }
    } else {
        for outcome in &outcomes {
            print_outcome(outcome);
        }
    }

    if failed > 0 {
        bail!("{failed} of {} disk(s) failed to provision", outcomes.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_devices() {
        let yaml = r"
disks:
  - path: /dev/sda
    partitioning:
      partitions:
        data: {}
  - path: /dev/sdb
    partitioning:
      partitions:
        data: {}
  - path: /dev/sda
    partitioning:
      partitions:
        data: {}
";
        let layout = DiskLayout::from_yaml(yaml).unwrap();
        assert_eq!(duplicate_devices(&layout), vec!["/dev/sda"]);
    }

    #[test]
    fn test_layout_source_is_required() {
        let err = load_layout(&ProvisionArgs::default()).unwrap_err();
        assert!(err.to_string().contains("Nothing to provision"));
    }

    #[test]
    fn test_builtin_layout_from_device() {
        let args = ProvisionArgs {
            device: Some("/dev/vda".to_string()),
            root_size: Some("20GiB".to_string()),
            ..ProvisionArgs::default()
        };
        let layout = load_layout(&args).unwrap();
        assert_eq!(layout.disks()[0].partitions.len(), 3);
    }
}
