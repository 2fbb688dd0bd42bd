//! Scoped temporary mounts
//!
//! [`ScopedMount`] mounts a btrfs partition on a private temporary directory
//! and guarantees release: explicit [`ScopedMount::unmount`] reports failure,
//! dropping the guard unmounts on a best-effort basis. The directory is only
//! removed once nothing is mounted on it.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;

use super::process::{CommandRunner, Invocation};
use crate::config::defaults::MOUNT_DIR_PREFIX;

/// A mount, unmount or subvolume operation failed
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct MountFailure {
    /// Directory the operation targeted
    pub mountpoint: PathBuf,
    /// What went wrong
    pub message: String,
}

/// A btrfs filesystem mounted on a temporary directory
pub struct ScopedMount<'r> {
    runner: &'r dyn CommandRunner,
    dir: Option<TempDir>,
    mountpoint: PathBuf,
}

impl std::fmt::Debug for ScopedMount<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedMount")
            .field("mountpoint", &self.mountpoint)
            .field("mounted", &self.dir.is_some())
            .finish()
    }
}

impl<'r> ScopedMount<'r> {
    /// Create a temporary directory under `root` and mount `device` there.
    ///
    /// On failure the directory is removed before returning.
    pub fn mount_btrfs(
        runner: &'r dyn CommandRunner,
        device: &Path,
        root: &Path,
    ) -> Result<Self, MountFailure> {
        let dir = tempfile::Builder::new()
            .prefix(MOUNT_DIR_PREFIX)
            .tempdir_in(root)
            .map_err(|e| MountFailure {
                mountpoint: root.to_path_buf(),
                message: format!("failed to create temporary mount directory: {e}"),
            })?;
        let mountpoint = dir.path().to_path_buf();

        let invocation = Invocation::new("mount").args([
            "-t".to_string(),
            "btrfs".to_string(),
            device.display().to_string(),
            mountpoint.display().to_string(),
        ]);
        let failure = match runner.run(&invocation) {
            Ok(output) if output.success() => None,
            Ok(output) => Some(output.failure_message()),
            Err(e) => Some(format!("failed to run mount: {e}")),
        };

        if let Some(message) = failure {
            // Nothing is mounted, so the directory can go
            if let Err(e) = dir.close() {
                tracing::warn!("Failed to remove {}: {}", mountpoint.display(), e);
            }
            return Err(MountFailure {
                mountpoint,
                message,
            });
        }

        tracing::debug!("Mounted {} on {}", device.display(), mountpoint.display());
        Ok(Self {
            runner,
            dir: Some(dir),
            mountpoint,
        })
    }

    /// Where the filesystem is mounted
    pub fn path(&self) -> &Path {
        &self.mountpoint
    }

    /// Create a subvolume at `subvolume` (relative to the filesystem root)
    pub fn create_subvolume(&self, subvolume: &str) -> Result<(), MountFailure> {
        let target = self.mountpoint.join(subvolume.trim_start_matches('/'));
        let invocation = Invocation::new("btrfs").args([
            "subvolume".to_string(),
            "create".to_string(),
            target.display().to_string(),
        ]);

        match self.runner.run(&invocation) {
            Ok(output) if output.success() => {
                tracing::debug!("Created subvolume {}", target.display());
                Ok(())
            }
            Ok(output) => Err(MountFailure {
                mountpoint: self.mountpoint.clone(),
                message: output.failure_message(),
            }),
            Err(e) => Err(MountFailure {
                mountpoint: self.mountpoint.clone(),
                message: format!("failed to run btrfs: {e}"),
            }),
        }
    }

    /// Unmount and remove the directory.
    ///
    /// If unmounting fails the directory is kept and its path reported.
    pub fn unmount(mut self) -> Result<(), MountFailure> {
        self.release()
    }

    fn release(&mut self) -> Result<(), MountFailure> {
        let Some(dir) = self.dir.take() else {
            return Ok(());
        };

        let invocation =
            Invocation::new("umount").arg(self.mountpoint.display().to_string());
        let failure = match self.runner.run(&invocation) {
            Ok(output) if output.success() => None,
            Ok(output) => Some(output.failure_message()),
            Err(e) => Some(format!("failed to run umount: {e}")),
        };

        match failure {
            None => {
                if let Err(e) = dir.close() {
                    tracing::warn!("Failed to remove {}: {}", self.mountpoint.display(), e);
                }
                tracing::debug!("Unmounted {}", self.mountpoint.display());
                Ok(())
            }
            Some(message) => {
                // Still mounted: never delete the directory under a live filesystem
                let kept = dir.keep();
                tracing::warn!("{} is still mounted: {}", kept.display(), message);
                Err(MountFailure {
                    mountpoint: kept,
                    message,
                })
            }
        }
    }
}

impl Drop for ScopedMount<'_> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::process::CommandOutput;
    use std::sync::Mutex;

    /// Fails any invocation of the named programs
    struct ScriptedRunner {
        failing: Vec<&'static str>,
        calls: Mutex<Vec<Invocation>>,
    }

    impl ScriptedRunner {
        fn failing(programs: &[&'static str]) -> Self {
            Self {
                failing: programs.to_vec(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
            self.calls.lock().unwrap().push(invocation.clone());
            let code = i32::from(self.failing.contains(&invocation.program.as_str()));
            Ok(CommandOutput {
                code,
                stderr: if code == 0 { String::new() } else { "boom".to_string() },
                ..CommandOutput::default()
            })
        }
    }

    #[test]
    fn test_mount_and_unmount_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::failing(&[]);
        let mount = ScopedMount::mount_btrfs(&runner, Path::new("/dev/sda2"), root.path()).unwrap();
        let path = mount.path().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(MOUNT_DIR_PREFIX));

        mount.create_subvolume("/@system").unwrap();
        mount.unmount().unwrap();
        assert!(!path.exists());

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls[0].args[..3], ["-t", "btrfs", "/dev/sda2"]);
        assert_eq!(calls[1].args[2], path.join("@system").display().to_string());
        assert_eq!(calls[2].program, "umount");
    }

    #[test]
    fn test_mount_failure_removes_directory() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::failing(&["mount"]);
        let err = ScopedMount::mount_btrfs(&runner, Path::new("/dev/sda2"), root.path()).unwrap_err();
        assert_eq!(err.message, "exit code 1: boom");
        assert!(!err.mountpoint.exists());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unmount_failure_keeps_directory() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::failing(&["umount"]);
        let mount = ScopedMount::mount_btrfs(&runner, Path::new("/dev/sda2"), root.path()).unwrap();
        let err = mount.unmount().unwrap_err();
        assert!(err.mountpoint.exists());
        std::fs::remove_dir(&err.mountpoint).unwrap();
    }

    #[test]
    fn test_drop_unmounts() {
        let root = tempfile::tempdir().unwrap();
        let runner = ScriptedRunner::failing(&[]);
        {
            let _mount =
                ScopedMount::mount_btrfs(&runner, Path::new("/dev/sda2"), root.path()).unwrap();
        }
        let programs: Vec<String> = runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|i| i.program.clone())
            .collect();
        assert_eq!(programs, vec!["mount", "umount"]);
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
