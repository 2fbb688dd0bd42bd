//! Doctor command logic
//!
//! Checks that the host tools provisioning shells out to are installed, and
//! that the settings file parses.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::settings::Settings;
use crate::infra::dirs::LithosDirs;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"v?(\d+\.\d+(?:\.\d+)?(?:-\w+)?)").expect("version regex is valid")
});

/// Host tools provisioning depends on, with the package providing each
pub const REQUIRED_TOOLS: &[(&str, &str)] = &[
    ("sfdisk", "util-linux"),
    ("blockdev", "util-linux"),
    ("mkfs", "util-linux"),
    ("mount", "util-linux"),
    ("umount", "util-linux"),
    ("mkfs.fat", "dosfstools"),
    ("mkfs.vfat", "dosfstools"),
    ("mkfs.btrfs", "btrfs-progs"),
    ("btrfs", "btrfs-progs"),
];

/// Result of a single tool check
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Tool name
    pub name: String,
    /// Whether the check passed
    pub passed: bool,
    /// Resolved path on success
    pub path: Option<PathBuf>,
    /// Version if available
    pub version: Option<String>,
    /// Suggestion for fixing the issue
    pub suggestion: Option<String>,
}

impl CheckResult {
    /// Create a passing check result
    pub fn pass(name: &str, path: PathBuf, version: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            path: Some(path),
            version,
            suggestion: None,
        }
    }

    /// Create a failing check result
    pub fn fail(name: &str, suggestion: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            path: None,
            version: None,
            suggestion: Some(suggestion.to_string()),
        }
    }
}

/// Overall doctor report
#[derive(Debug, Default, Serialize)]
pub struct DoctorReport {
    /// Individual check results
    pub checks: Vec<CheckResult>,
    /// Configuration issues found
    pub config_issues: Vec<String>,
}

impl DoctorReport {
    /// Check if all checks passed and the settings are valid
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed) && self.config_issues.is_empty()
    }

    /// Count passed checks
    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    /// Failed checks
    pub fn failed(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }
}

/// Check one tool on `PATH`
pub fn check_tool(tool: &str, package: &str) -> CheckResult {
    match which::which(tool) {
        Ok(path) => {
            let version = tool_version(tool);
            CheckResult::pass(tool, path, version)
        }
        Err(_) => CheckResult::fail(
            tool,
            &format!("Install the '{package}' package with your distribution's package manager"),
        ),
    }
}

/// Ask a tool for its version
fn tool_version(tool: &str) -> Option<String> {
    let output = std::process::Command::new(tool)
        .arg("--version")
        .output()
        .ok()?;
    let combined = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    extract_version(&combined)
}

/// Extract version string from command output
fn extract_version(output: &str) -> Option<String> {
    VERSION_RE
        .captures(output)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Run all doctor checks
pub fn run_doctor(dirs: &LithosDirs) -> DoctorReport {
    let mut report = DoctorReport::default();

    for (tool, package) in REQUIRED_TOOLS {
        report.checks.push(check_tool(tool, package));
    }

    if let Err(e) = Settings::load(dirs) {
        report.config_issues.push(e.to_string());
    }

    report
}
