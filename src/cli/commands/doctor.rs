//! CLI command for `lithos doctor`
//!
//! Checks host tools and settings and reports issues with suggestions.

use anyhow::Result;

use crate::cli::output::{
    is_json, is_quiet, print_detail, print_info, print_json, print_success, print_warning, status,
};
use crate::core::doctor::run_doctor;
use crate::infra::dirs::LithosDirs;

/// Execute the doctor command
pub async fn execute() -> Result<()> {
    let report = run_doctor(&LithosDirs::new());

    if is_json() {
        print_json(&serde_json::json!({
            "status": if report.all_passed() { "success" } else { "error" },
            "checks": report.checks,
            "config_issues": report.config_issues,
            "passed_count": report.passed_count(),
            "total_count": report.checks.len()
        }));
        // The report already carries the error status; one document only
        if !report.all_passed() {
            std::process::exit(1);
        }
        return Ok(());
    }

    // Quiet mode - only show errors
    if is_quiet() {
        for check in report.failed() {
            eprintln!("{} Missing required: {}", status::ERROR, check.name);
        }
        for issue in &report.config_issues {
            eprintln!("{} {issue}", status::ERROR);
        }
        if !report.all_passed() {
            return Err(anyhow::anyhow!("Host is not ready for provisioning"));
        }
        return Ok(());
    }

    print_info("Checking host tools...");
    println!();

    for check in &report.checks {
        let version_str = check
            .version
            .as_ref()
            .map(|v| format!(" (v{v})"))
            .unwrap_or_default();

        if check.passed {
            println!("  {} {}{version_str}", status::SUCCESS, check.name);
        } else {
            println!("  {} {}", status::ERROR, check.name);
            if let Some(suggestion) = &check.suggestion {
                print_detail(&format!("Suggestion: {suggestion}"));
            }
        }
    }

    if !report.config_issues.is_empty() {
        println!();
        print_warning("Configuration issues:");
        for issue in &report.config_issues {
            print_detail(&format!("• {issue}"));
        }
    }

    println!();
    let passed = report.passed_count();
    let total = report.checks.len();

    if report.all_passed() {
        print_success(&format!("All checks passed ({passed}/{total})"));
        print_detail("Host is ready for provisioning.");
        Ok(())
    } else {
        println!("{} {passed}/{total} checks passed", status::ERROR);
        Err(anyhow::anyhow!(
            "Host is not ready for provisioning. Run 'lithos doctor' for details."
        ))
    }
}
