//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::Mutex;

use lithos::infra::process::{CommandOutput, CommandRunner, Invocation};
use tempfile::TempDir;

/// Test project context
///
/// A temporary directory holding configuration files, also used as the
/// settings directory so tests never read the user's settings.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project, returning its path
    pub fn create_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&path, content).expect("Failed to write file");
        path
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(&path).expect("Failed to create directory");
        path
    }

    /// Run the lithos binary in this project
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_lithos"))
            .current_dir(self.dir.path())
            .env("LITHOS_CONFIG_DIR", self.dir.path())
            .env("LITHOS_MOUNT_ROOT", self.dir.path())
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute lithos")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Records every invocation and fails the ones matching a rule
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    failures: Vec<(String, i32)>,
    sector_size: u32,
}

impl RecordingRunner {
    /// A runner on which every command succeeds
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failures: Vec::new(),
            sector_size: 512,
        }
    }

    /// Fail commands whose rendered command line starts with `prefix`
    pub fn fail(mut self, prefix: &str, exit_code: i32) -> Self {
        self.failures.push((prefix.to_string(), exit_code));
        self
    }

    /// Sector size reported by `blockdev --getss`
    pub fn with_sector_size(mut self, sector_size: u32) -> Self {
        self.sector_size = sector_size;
        self
    }

    /// All recorded invocations
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().expect("runner lock poisoned").clone()
    }

    /// Recorded command lines
    pub fn command_lines(&self) -> Vec<String> {
        self.calls().iter().map(ToString::to_string).collect()
    }

    /// Command lines starting with `prefix`
    pub fn lines_starting_with(&self, prefix: &str) -> Vec<String> {
        self.command_lines()
            .into_iter()
            .filter(|line| line.starts_with(prefix))
            .collect()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        self.calls
            .lock()
            .expect("runner lock poisoned")
            .push(invocation.clone());

        let line = invocation.to_string();
        if let Some((_, code)) = self
            .failures
            .iter()
            .find(|(prefix, _)| line.starts_with(prefix.as_str()))
        {
            return Ok(CommandOutput {
                code: *code,
                stdout: String::new(),
                stderr: format!("{} failed", invocation.program),
            });
        }

        let stdout = if line.starts_with("blockdev --getss") {
            format!("{}\n", self.sector_size)
        } else {
            String::new()
        };
        Ok(CommandOutput {
            code: 0,
            stdout,
            stderr: String::new(),
        })
    }
}

/// Number of entries left in a directory
pub fn entries_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(Iterator::count).unwrap_or(0)
}

/// A two-disk layout: a system disk by alias and a data disk by path
pub const SAMPLE_LAYOUT: &str = r"
disks:
  - alias: system-disk
    partitioning:
      scheme: gpt
      partitions:
        boot:
          label: BOOT
          filesystem: vfat
          guid: C12A7328-F81F-11D2-BA4B-00A0C93EC93B
          size: 512MiB
          mountpoint: /boot/efi
          order: 1
        root:
          size: 20GiB
          order: 2
        home:
          label: HOME
          guid: 933AC7E1-2EB4-4F13-B844-0E14E2AEF915
          mountpoint: /home
          order: 3
  - path: /dev/sdb
    partitioning:
      scheme: mbr
      partitions:
        data:
          label: DATA
          filesystem: btrfs
          subvolumes:
            - volume: /@data
              mountpoint: /srv
";

/// A formula with every section
pub const SAMPLE_FORMULA: &str = r#"
config:
  system:
    hostname: workstation
    users:
      ada:
        fullname: Ada
        groups: [wheel]
  packages:
    base: [linux, systemd]
  services:
    network: [systemd-networkd]
  files:
    /etc/motd:
      contents: "welcome"
      mode: create
      permissions: "0644"
"#;
