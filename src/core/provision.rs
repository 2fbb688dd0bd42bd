//! Device provisioning
//!
//! Executes planned disks against real block devices. Each disk moves through
//!
//! ```text
//! Unassigned -> Assigned -> LabelCreated -> PartitionsAdded -> TableWritten
//!            -> FilesystemsCreated [-> SubvolumesCreated] -> Done
//! ```
//!
//! and any failing step moves it to `Failed`, abandoning the rest of that
//! disk's work. The partition table is assembled in memory and committed with
//! a single `sfdisk` run, so a failure before the write leaves the device
//! untouched. Nothing is retried.
//!
//! A [`CancellationToken`] is checked before every step. Steps already
//! committed to the device cannot be undone; cancellation only skips what
//! has not started.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::disk::{Disk, DiskLayout, Filesystem, Partition};
use super::planner::{self, PartitionTable};
use crate::error::{ProvisionError, UnmountOutcome};
use crate::infra::mount::ScopedMount;
use crate::infra::process::{CommandRunner, Invocation};

/// Per-disk provisioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiskState {
    Unassigned,
    Assigned,
    LabelCreated,
    PartitionsAdded,
    TableWritten,
    FilesystemsCreated,
    SubvolumesCreated,
    Done,
    Failed,
}

impl fmt::Display for DiskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unassigned => "unassigned",
            Self::Assigned => "assigned",
            Self::LabelCreated => "label created",
            Self::PartitionsAdded => "partitions added",
            Self::TableWritten => "table written",
            Self::FilesystemsCreated => "filesystems created",
            Self::SubvolumesCreated => "subvolumes created",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// A partition as written to the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedPartition {
    /// Configuration key
    pub name: String,
    /// Table-assigned partition number
    pub number: u32,
    /// Device node
    pub path: PathBuf,
}

/// The partition table written to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedTable {
    /// Device path
    pub device: String,
    /// Partitions in table order
    pub partitions: Vec<AppliedPartition>,
}

impl AppliedTable {
    /// Table-assigned number of a partition
    pub fn number_of(&self, name: &str) -> Option<u32> {
        self.partitions
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.number)
    }
}

/// Result of provisioning one disk
#[derive(Debug, Serialize)]
pub struct DiskOutcome {
    /// Device path
    pub disk: String,
    /// `Done` or `Failed`
    pub state: DiskState,
    /// Last state reached before finishing or failing
    pub last_completed: DiskState,
    /// Written table, when the table step succeeded
    pub table: Option<AppliedTable>,
    /// Failure, if any
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<ProvisionError>,
}

impl DiskOutcome {
    /// Whether the disk was fully provisioned
    pub fn is_success(&self) -> bool {
        self.state == DiskState::Done
    }
}

fn serialize_error<S: serde::Serializer>(
    error: &Option<ProvisionError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

/// Device node for partition `number` of `base`.
///
/// Loop, MMC and NVMe devices take a `p` before the number.
///
/// ```
/// use lithos::core::provision::partition_device_path;
///
/// assert_eq!(partition_device_path("/dev/nvme0n1", 2).to_str(), Some("/dev/nvme0n1p2"));
/// assert_eq!(partition_device_path("/dev/sda", 2).to_str(), Some("/dev/sda2"));
/// ```
pub fn partition_device_path(base: &str, number: u32) -> PathBuf {
    let needs_infix = base.starts_with("/dev/loop")
        || base.contains("/dev/mmcblk")
        || base.starts_with("/dev/nvme");
    if needs_infix {
        PathBuf::from(format!("{base}p{number}"))
    } else {
        PathBuf::from(format!("{base}{number}"))
    }
}

/// The mkfs command for a filesystem
pub fn mkfs_invocation(filesystem: &Filesystem, device: &Path) -> Invocation {
    let device = device.display().to_string();
    match filesystem {
        Filesystem::Vfat => Invocation::new("mkfs.vfat").args(["-F32".to_string(), device]),
        Filesystem::Fat(bits) => {
            Invocation::new("mkfs.fat").args(["-F".to_string(), bits.to_string(), device])
        }
        Filesystem::Btrfs => Invocation::new("mkfs.btrfs").args(["-f".to_string(), device]),
        Filesystem::Other(name) => {
            Invocation::new("mkfs").args(["-t".to_string(), name.clone(), device])
        }
    }
}

/// Provisioning options
#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    /// Parent directory for temporary mounts
    pub mount_root: PathBuf,
    /// Plan with this sector size instead of querying the device
    pub sector_size: Option<u32>,
    /// Create filesystems and subvolumes after writing the table
    pub create_filesystems: bool,
}

impl ProvisionOptions {
    /// Defaults with the given mount root
    pub fn new(mount_root: impl Into<PathBuf>) -> Self {
        Self {
            mount_root: mount_root.into(),
            sector_size: None,
            create_filesystems: true,
        }
    }
}

/// Tracks and logs a disk's state transitions
struct Progress {
    disk: String,
    state: DiskState,
}

impl Progress {
    fn new(disk: &str) -> Self {
        Self {
            disk: disk.to_string(),
            state: DiskState::Unassigned,
        }
    }

    fn advance(&mut self, next: DiskState) {
        tracing::info!("{}: {} -> {}", self.disk, self.state, next);
        self.state = next;
    }
}

/// Executes partition plans against block devices
pub struct Provisioner<'r> {
    runner: &'r dyn CommandRunner,
    options: ProvisionOptions,
    cancel: CancellationToken,
}

impl<'r> Provisioner<'r> {
    /// Create a provisioner running commands through `runner`
    pub fn new(runner: &'r dyn CommandRunner, options: ProvisionOptions) -> Self {
        Self {
            runner,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop before the next step once `token` is cancelled
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Write the disk's partition table and re-read it
    pub fn apply_partition_table(&self, disk: &Disk) -> Result<AppliedTable, ProvisionError> {
        self.write_table(disk, &mut Progress::new(&disk.name))
    }

    /// Create filesystems, then btrfs subvolumes, on a written table
    pub fn apply_filesystems(
        &self,
        disk: &Disk,
        table: &AppliedTable,
    ) -> Result<(), ProvisionError> {
        let mut progress = Progress::new(&disk.name);
        progress.state = DiskState::TableWritten;
        self.create_filesystems(disk, table, &mut progress)
    }

    /// Provision one disk end to end
    pub fn provision(&self, disk: &Disk) -> DiskOutcome {
        let mut progress = Progress::new(&disk.name);
        let mut table = None;

        let result = self.write_table(disk, &mut progress).and_then(|written| {
            let written = table.insert(written);
            if self.options.create_filesystems {
                self.create_filesystems(disk, written, &mut progress)
            } else {
                Ok(())
            }
        });

        let last_completed = progress.state;
        match result {
            Ok(()) => {
                progress.advance(DiskState::Done);
                DiskOutcome {
                    disk: disk.name.clone(),
                    state: DiskState::Done,
                    last_completed,
                    table,
                    error: None,
                }
            }
            Err(error) => {
                tracing::error!("{}: failed after '{}': {}", disk.name, last_completed, error);
                progress.advance(DiskState::Failed);
                DiskOutcome {
                    disk: disk.name.clone(),
                    state: DiskState::Failed,
                    last_completed,
                    table,
                    error: Some(error),
                }
            }
        }
    }

    /// Provision every disk in order.
    ///
    /// A failing disk does not stop later disks. A device listed twice is
    /// only provisioned the first time.
    pub fn provision_all(&self, layout: &DiskLayout) -> Vec<DiskOutcome> {
        let mut seen = HashSet::new();
        layout
            .disks()
            .iter()
            .map(|disk| {
                if !disk.is_alias && !seen.insert(disk.name.as_str()) {
                    let error = ProvisionError::PartitionTable {
                        disk: disk.name.clone(),
                        step: "assigning device".to_string(),
                        message: "device is listed more than once".to_string(),
                    };
                    tracing::error!("{}", error);
                    return DiskOutcome {
                        disk: disk.name.clone(),
                        state: DiskState::Failed,
                        last_completed: DiskState::Unassigned,
                        table: None,
                        error: Some(error),
                    };
                }
                self.provision(disk)
            })
            .collect()
    }

    fn check_cancelled(&self, disk: &Disk, step: &str) -> Result<(), ProvisionError> {
        if self.cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled {
                disk: disk.name.clone(),
                step: step.to_string(),
            });
        }
        Ok(())
    }

    fn table_error(disk: &Disk, step: &str, message: impl Into<String>) -> ProvisionError {
        ProvisionError::PartitionTable {
            disk: disk.name.clone(),
            step: step.to_string(),
            message: message.into(),
        }
    }

    /// Run a partition-table command, mapping any failure to `PartitionTable`
    fn run_table_step(
        &self,
        disk: &Disk,
        step: &str,
        invocation: &Invocation,
    ) -> Result<String, ProvisionError> {
        let output = self
            .runner
            .run(invocation)
            .map_err(|e| Self::table_error(disk, step, format!("failed to run {}: {e}", invocation.program)))?;
        if !output.success() {
            return Err(Self::table_error(disk, step, output.failure_message()));
        }
        Ok(output.stdout)
    }

    fn sector_size(&self, disk: &Disk) -> Result<u32, ProvisionError> {
        if let Some(size) = self.options.sector_size {
            return Ok(size);
        }

        let step = "assigning device";
        let stdout = self.run_table_step(
            disk,
            step,
            &Invocation::new("blockdev").args(["--getss", disk.name.as_str()]),
        )?;
        stdout.trim().parse().map_err(|_| {
            Self::table_error(
                disk,
                step,
                format!("unexpected sector size '{}'", stdout.trim()),
            )
        })
    }

    fn write_table(
        &self,
        disk: &Disk,
        progress: &mut Progress,
    ) -> Result<AppliedTable, ProvisionError> {
        self.check_cancelled(disk, "assigning device")?;
        if disk.is_alias {
            return Err(ProvisionError::Plan {
                disk: disk.name.clone(),
                source: crate::error::PlanError::AliasUnresolved {
                    alias: disk.name.clone(),
                },
            });
        }
        let sector_size = self.sector_size(disk)?;
        progress.advance(DiskState::Assigned);

        let plan = planner::plan(disk, sector_size).map_err(|source| ProvisionError::Plan {
            disk: disk.name.clone(),
            source,
        })?;

        let mut table = PartitionTable::new(plan.scheme, plan.sector_size);
        progress.advance(DiskState::LabelCreated);

        for partition in plan.partitions {
            let name = partition.name.clone();
            let number = table.add(partition);
            tracing::debug!("{}: partition '{}' is number {}", disk.name, name, number);
        }
        progress.advance(DiskState::PartitionsAdded);

        self.check_cancelled(disk, "writing disklabel")?;
        let script = table.to_sfdisk_script();
        tracing::debug!("{}: sfdisk script:\n{}", disk.name, script);
        self.run_table_step(
            disk,
            "writing disklabel",
            &Invocation::new("sfdisk")
                .args(["--wipe", "always", "--wipe-partitions", "always"])
                .arg(disk.name.as_str())
                .stdin(script),
        )?;
        self.run_table_step(
            disk,
            "re-reading partition table",
            &Invocation::new("blockdev").args(["--rereadpt", disk.name.as_str()]),
        )?;
        progress.advance(DiskState::TableWritten);

        Ok(AppliedTable {
            device: disk.name.clone(),
            partitions: table
                .entries()
                .iter()
                .map(|entry| AppliedPartition {
                    name: entry.partition.name.clone(),
                    number: entry.number,
                    path: partition_device_path(&disk.name, entry.number),
                })
                .collect(),
        })
    }

    fn partition_path(
        disk: &Disk,
        table: &AppliedTable,
        partition: &Partition,
    ) -> Result<PathBuf, ProvisionError> {
        table
            .number_of(partition.name())
            .map(|number| partition_device_path(&disk.name, number))
            .ok_or_else(|| ProvisionError::UnassignedPartition {
                disk: disk.name.clone(),
                partition: partition.name().to_string(),
            })
    }

    fn create_filesystems(
        &self,
        disk: &Disk,
        table: &AppliedTable,
        progress: &mut Progress,
    ) -> Result<(), ProvisionError> {
        let partitions = disk.partitions_by_order();

        for partition in &partitions {
            let path = Self::partition_path(disk, table, partition)?;
            let filesystem = &partition.spec().filesystem;
            self.check_cancelled(disk, &format!("creating {filesystem} on {}", path.display()))?;

            let invocation = mkfs_invocation(filesystem, &path);
            let exit_code = match self.runner.run(&invocation) {
                Ok(output) => output.code,
                Err(e) => {
                    tracing::error!("Failed to run {}: {}", invocation.program, e);
                    -1
                }
            };
            if exit_code != 0 {
                return Err(ProvisionError::FilesystemCreation {
                    path,
                    filesystem: filesystem.to_string(),
                    exit_code,
                });
            }
            tracing::info!("Created {} on {}", filesystem, path.display());
        }
        progress.advance(DiskState::FilesystemsCreated);

        let with_subvolumes: Vec<_> = partitions
            .into_iter()
            .filter(|p| !p.subvolumes().is_empty())
            .collect();
        if with_subvolumes.is_empty() {
            return Ok(());
        }

        for partition in with_subvolumes {
            self.check_cancelled(disk, &format!("creating subvolumes on '{}'", partition.name()))?;
            let path = Self::partition_path(disk, table, partition)?;
            self.create_subvolumes(disk, partition, &path)?;
        }
        progress.advance(DiskState::SubvolumesCreated);
        Ok(())
    }

    /// Mount `device`, create the partition's subvolumes and unmount again
    fn create_subvolumes(
        &self,
        disk: &Disk,
        partition: &Partition,
        device: &Path,
    ) -> Result<(), ProvisionError> {
        let mount = ScopedMount::mount_btrfs(self.runner, device, &self.options.mount_root)
            .map_err(|failure| ProvisionError::Mount {
                disk: disk.name.clone(),
                partition: partition.name().to_string(),
                message: failure.message,
            })?;

        for subvolume in partition.subvolumes() {
            if let Err(failure) = mount.create_subvolume(&subvolume.path) {
                let unmount = match mount.unmount() {
                    Ok(()) => UnmountOutcome::Unmounted,
                    Err(u) => UnmountOutcome::StillMounted {
                        mountpoint: u.mountpoint,
                        error: u.message,
                    },
                };
                return Err(ProvisionError::Subvolume {
                    disk: disk.name.clone(),
                    partition: partition.name().to_string(),
                    subvolume: subvolume.path.clone(),
                    message: failure.message,
                    unmount,
                });
            }
            tracing::info!(
                "Created subvolume {} on {}",
                subvolume.path,
                device.display()
            );
        }

        mount.unmount().map_err(|u| ProvisionError::Unmount {
            disk: disk.name.clone(),
            partition: partition.name().to_string(),
            mountpoint: u.mountpoint,
            message: u.message,
        })
    }
}
