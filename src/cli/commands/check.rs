//! Check command implementation
//!
//! Implements `lithos check`: resolve a disk configuration, substitute
//! aliases and print the partition plan of every disk without touching any
//! device.

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::cli::output::{is_json, print_detail, print_info, print_json, print_success};
use crate::config::defaults::DEFAULT_SECTOR_SIZE;
use crate::core::disk::DiskLayout;
use crate::core::parttypes;
use crate::core::planner::{self, PartitionPlan};
use crate::core::settings::Settings;
use crate::infra::dirs::LithosDirs;

/// Render a sector count as a binary size
fn format_sectors(sectors: u64, sector_size: u32) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    #[allow(clippy::cast_precision_loss)]
    let mut value = sectors as f64 * f64::from(sector_size);
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

fn print_plan(plan: &PartitionPlan) {
    print_success(&format!(
        "{} ({}, {} partition(s))",
        plan.device,
        plan.scheme,
        plan.partitions.len()
    ));
    for partition in &plan.partitions {
        let size = partition.size_sectors.map_or_else(
            || "rest of disk".to_string(),
            |s| format!("{s} sectors, {}", format_sectors(s, plan.sector_size)),
        );
        let type_code = partition.type_code.to_string();
        let type_name = parttypes::describe(&type_code).unwrap_or("unknown");
        print_detail(&format!(
            "{}. {} [{}] {} ({size}) type {type_code} ({type_name}){}",
            partition.order,
            partition.name,
            partition.label,
            partition.filesystem,
            if partition.bootable { " bootable" } else { "" }
        ));
    }
}

/// Execute the check command
pub async fn execute(
    config: &Path,
    aliases: &[(String, String)],
    sector_size: Option<u32>,
    system: bool,
) -> Result<()> {
    let settings = Settings::load(&LithosDirs::new())?;

    let mut layout = DiskLayout::load(config)
        .with_context(|| format!("Failed to resolve {}", config.display()))?;
    tracing::info!("Resolved {} disk(s) from {}", layout.disks().len(), config.display());

    if system {
        layout.validate_for_system()?;
    }

    layout.apply_aliases(&settings.merged_aliases(aliases));
    let unresolved = layout.unresolved_aliases();
    if !unresolved.is_empty() {
        bail!(
            "Unresolved disk aliases: {}. Map them with --alias NAME=DEVICE or in the [aliases] settings section.",
            unresolved.join(", ")
        );
    }

    let sector_size = sector_size
        .or(settings.provision.sector_size)
        .unwrap_or(DEFAULT_SECTOR_SIZE);
    let plans = layout
        .disks()
        .iter()
        .map(|disk| planner::plan(disk, sector_size))
        .collect::<Result<Vec<_>, _>>()?;

    if is_json() {
        print_json(&serde_json::json!({
            "status": "success",
            "sector_size": sector_size,
            "plans": plans,
        }));
        return Ok(());
    }

    print_info(&format!(
        "Planning {} with {sector_size}-byte sectors",
        config.display()
    ));
    for plan in &plans {
        print_plan(plan);
    }
    Ok(())
}
