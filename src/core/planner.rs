//! Partition planning
//!
//! Turns a resolved [`Disk`] into a device-ready [`PartitionPlan`]: sizes in
//! sectors, concrete type codes from the scheme's registry, partitions in
//! ascending order. Planning never touches a device.
//!
//! The executor feeds the plan into an in-memory [`PartitionTable`], which
//! assigns partition numbers and renders the whole table as a single `sfdisk`
//! script so the disklabel is committed in one write.

use std::fmt::{self, Write as _};

use serde::Serialize;

use super::disk::{Disk, Filesystem, Scheme};
use super::{parttypes, size};
use crate::error::PlanError;

/// Concrete partition type for the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TypeCode {
    /// GPT partition type GUID
    Gpt(String),
    /// MBR partition type code
    Mbr(u32),
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt(guid) => write!(f, "{guid}"),
            Self::Mbr(code) => write!(f, "{code:x}"),
        }
    }
}

/// One partition of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedPartition {
    /// Configuration key
    pub name: String,
    /// On-disk label
    pub label: String,
    /// Size in sectors; `None` fills the remaining space
    pub size_sectors: Option<u64>,
    /// Resolved type code
    pub type_code: TypeCode,
    /// Boot flag
    pub bootable: bool,
    /// Filesystem to create once the table is written
    pub filesystem: Filesystem,
    /// Declared order
    pub order: u8,
}

/// Ordered, device-ready partition plan for one disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    /// Device path
    pub device: String,
    /// Partition table scheme
    pub scheme: Scheme,
    /// Sector size the sizes were computed with
    pub sector_size: u32,
    /// Partitions in ascending order
    pub partitions: Vec<PlannedPartition>,
}

/// Primary partitions an MBR table can hold; extended partitions are not planned
pub const MBR_MAX_PRIMARY: usize = 4;

/// Plan a disk for a device with the given sector size
pub fn plan(disk: &Disk, sector_size: u32) -> Result<PartitionPlan, PlanError> {
    if disk.is_alias {
        return Err(PlanError::AliasUnresolved {
            alias: disk.name.clone(),
        });
    }

    // Partition numbers are assumed to run 1..=N, which only holds for primaries
    if disk.scheme == Scheme::Mbr && disk.partitions.len() > MBR_MAX_PRIMARY {
        return Err(PlanError::TooManyPrimaryPartitions {
            disk: disk.name.clone(),
            count: disk.partitions.len(),
            max: MBR_MAX_PRIMARY,
        });
    }

    let partitions = disk
        .partitions_by_order()
        .into_iter()
        .map(|partition| {
            let spec = partition.spec();

            let size_sectors = spec
                .size
                .as_deref()
                .map(|s| size::to_sectors(s, sector_size))
                .transpose()
                .map_err(|source| PlanError::Size {
                    partition: spec.name.clone(),
                    source,
                })?;

            let type_code = match disk.scheme {
                Scheme::Gpt => parttypes::lookup_gpt(&spec.gpt_guid)
                    .map(|guid| TypeCode::Gpt(guid.to_string()))
                    .ok_or_else(|| PlanError::UnknownPartitionType {
                        partition: spec.name.clone(),
                        requested: spec.gpt_guid.clone(),
                        scheme: disk.scheme.to_string(),
                    })?,
                Scheme::Mbr => parttypes::lookup_mbr(spec.mbr_type)
                    .map(TypeCode::Mbr)
                    .ok_or_else(|| PlanError::UnknownPartitionType {
                        partition: spec.name.clone(),
                        requested: format!("0x{:02x}", spec.mbr_type),
                        scheme: disk.scheme.to_string(),
                    })?,
            };

            Ok(PlannedPartition {
                name: spec.name.clone(),
                label: spec.label.clone(),
                size_sectors,
                type_code,
                bootable: spec.bootable,
                filesystem: spec.filesystem.clone(),
                order: spec.order,
            })
        })
        .collect::<Result<Vec<_>, PlanError>>()?;

    tracing::debug!(
        "Planned {} partition(s) for {} ({}, {}-byte sectors)",
        partitions.len(),
        disk.name,
        disk.scheme,
        sector_size
    );

    Ok(PartitionPlan {
        device: disk.name.clone(),
        scheme: disk.scheme,
        sector_size,
        partitions,
    })
}

/// A partition added to an in-memory table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    /// Table-assigned partition number
    pub number: u32,
    /// The planned partition
    pub partition: PlannedPartition,
}

/// In-memory partition table, written to the device in one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    scheme: Scheme,
    sector_size: u32,
    entries: Vec<TableEntry>,
}

impl PartitionTable {
    /// New empty disklabel
    pub fn new(scheme: Scheme, sector_size: u32) -> Self {
        Self {
            scheme,
            sector_size,
            entries: Vec::new(),
        }
    }

    /// Add a partition after the last one, returning its assigned number
    pub fn add(&mut self, partition: PlannedPartition) -> u32 {
        let number = self.entries.last().map_or(1, |e| e.number + 1);
        self.entries.push(TableEntry { number, partition });
        number
    }

    /// Partitions in table order
    pub fn entries(&self) -> &[TableEntry] {
        &self.entries
    }

    /// Render the table as an `sfdisk` script
    pub fn to_sfdisk_script(&self) -> String {
        let mut script = format!(
            "label: {}\nsector-size: {}\n\n",
            self.scheme.sfdisk_label(),
            self.sector_size
        );

        for entry in &self.entries {
            let partition = &entry.partition;
            let mut fields = Vec::new();
            if let Some(sectors) = partition.size_sectors {
                fields.push(format!("size={sectors}"));
            }
            fields.push(format!("type={}", partition.type_code));
            match self.scheme {
                Scheme::Gpt => {
                    // sfdisk has no escaping for quotes inside names
                    fields.push(format!("name=\"{}\"", partition.label.replace('"', "")));
                    if partition.bootable {
                        fields.push("attrs=\"LegacyBIOSBootable\"".to_string());
                    }
                }
                Scheme::Mbr => {
                    if partition.bootable {
                        fields.push("bootable".to_string());
                    }
                }
            }
            let _ = writeln!(script, "{}", fields.join(", "));
        }

        script
    }
}
