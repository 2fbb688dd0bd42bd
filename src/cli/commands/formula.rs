//! Formula command implementation
//!
//! Implements `lithos formula`: resolve a formula and everything it
//! inherits, then print the merged packages, services, files and system
//! settings.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::{is_json, print_detail, print_info, print_json, print_success};
use crate::core::formula::{FileMode, Formula, InsertAnchor};

fn describe_mode(mode: &FileMode) -> String {
    match mode {
        FileMode::Replace { what } => format!("replace '{what}'"),
        FileMode::Create {
            replace_existing,
            permissions,
        } => format!(
            "create with mode {permissions}{}",
            if *replace_existing { ", replacing" } else { "" }
        ),
        FileMode::Insert {
            anchor: InsertAnchor::After(line),
        } => format!("insert after '{line}'"),
        FileMode::Insert {
            anchor: InsertAnchor::Before(line),
        } => format!("insert before '{line}'"),
    }
}

/// Execute the formula command
pub async fn execute(file: &Path) -> Result<()> {
    let formula = Formula::load(file)
        .with_context(|| format!("Failed to resolve formula {}", file.display()))?;
    let packages = formula.packages();
    let services = formula.services();
    let files = formula.files();
    let system = formula.system_config()?;

    tracing::info!(
        "Formula {} inherits {} formula(s) directly",
        file.display(),
        formula.inherits().len()
    );

    if is_json() {
        print_json(&serde_json::json!({
            "status": "success",
            "packages": packages,
            "services": services,
            "files": files,
            "system": system,
        }));
        return Ok(());
    }

    print_success(&format!("Resolved {}", file.display()));

    print_info(&format!("Packages ({})", packages.len()));
    for package in &packages {
        print_detail(&format!("{} [{}]", package.name, package.category));
    }

    print_info(&format!("Services ({})", services.len()));
    for service in &services {
        print_detail(&format!("{} [{}]", service.name, service.category));
    }

    print_info(&format!("Files ({})", files.len()));
    for entry in &files {
        print_detail(&format!("{}: {}", entry.path.display(), describe_mode(&entry.mode)));
    }

    match system {
        Some(system) => {
            print_info("System");
            print_detail(&format!("hostname: {}", system.hostname));
            print_detail(&format!("timezone: {}", system.timezone));
            print_detail(&format!("locale:   {}", system.locale));
            print_detail(&format!("keymap:   {}", system.keymap));
            for user in &system.users {
                print_detail(&format!(
                    "user {} ({}) shell {} groups [{}]",
                    user.username,
                    user.fullname,
                    user.shell,
                    user.groups.join(", ")
                ));
            }
        }
        None => print_info("No system section"),
    }

    Ok(())
}
