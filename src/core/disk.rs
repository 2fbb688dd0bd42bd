//! Disk layout configuration
//!
//! Resolves the `disks` section of a configuration document into a validated
//! [`DiskLayout`]: disks, their partition table scheme, and their partitions.
//! Any partition named `root` is forced into a btrfs partition carrying the
//! fixed `@system`/`@revisions` subvolume pair.
//!
//! ```yaml
//! disks:
//!   - alias: system-disk
//!     partitioning:
//!       scheme: gpt
//!       partitions:
//!         boot:
//!           label: BOOT
//!           filesystem: vfat
//!           guid: C12A7328-F81F-11D2-BA4B-00A0C93EC93B
//!           size: 512MiB
//!           mountpoint: /boot/efi
//!           order: 1
//!         root:
//!           order: 2
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_yaml::Value;

use super::node::Node;
use super::size;
use crate::config::defaults::{
    DEFAULT_FILESYSTEM, DEFAULT_GPT_GUID, DEFAULT_MBR_TYPE, ROOT_GPT_GUID, ROOT_LABEL,
    ROOT_MBR_TYPE,
};
use crate::error::{ConfigError, LayoutError, ValidationError};

/// Partition table scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    /// GUID partition table
    Gpt,
    /// DOS/MBR partition table
    Mbr,
}

impl Scheme {
    /// Parse a scheme name, case-insensitively
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "gpt" => Some(Self::Gpt),
            "mbr" => Some(Self::Mbr),
            _ => None,
        }
    }

    /// Label name understood by `sfdisk`
    pub fn sfdisk_label(self) -> &'static str {
        match self {
            Self::Gpt => "gpt",
            Self::Mbr => "dos",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt => write!(f, "GPT"),
            Self::Mbr => write!(f, "MBR"),
        }
    }
}

/// Filesystem to create on a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filesystem {
    /// vfat, always created as FAT32
    Vfat,
    /// FAT with an explicit FAT size (12, 16 or 32)
    Fat(u8),
    /// btrfs
    Btrfs,
    /// Anything else, passed to `mkfs -t`
    Other(String),
}

impl Filesystem {
    /// Parse a filesystem name.
    ///
    /// Returns `None` for `fatNN` names whose size is not 12, 16 or 32.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "vfat" => Some(Self::Vfat),
            "btrfs" => Some(Self::Btrfs),
            _ => match name.strip_prefix("fat") {
                Some(bits) => match bits.parse::<u8>() {
                    Ok(n @ (12 | 16 | 32)) => Some(Self::Fat(n)),
                    _ => None,
                },
                None => Some(Self::Other(name.to_string())),
            },
        }
    }
}

impl fmt::Display for Filesystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vfat => write!(f, "vfat"),
            Self::Fat(bits) => write!(f, "fat{bits}"),
            Self::Btrfs => write!(f, "btrfs"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

impl Serialize for Filesystem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How a btrfs subvolume is meant to be mounted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubvolumeKind {
    /// Read-write
    Rw,
    /// Read-only
    Ro,
    /// Default mount behaviour
    #[default]
    Default,
}

impl SubvolumeKind {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rw" => Some(Self::Rw),
            "ro" => Some(Self::Ro),
            "default" => Some(Self::Default),
            _ => None,
        }
    }
}

/// A btrfs subvolume
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subvolume {
    /// Path of the subvolume inside the filesystem
    pub path: String,
    /// Where the subvolume is mounted in the installed system
    pub mountpoint: Option<String>,
    /// Mount intent
    pub kind: SubvolumeKind,
}

/// Attributes shared by every partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionSpec {
    /// Configuration key, e.g. `boot` or `root`
    pub name: String,
    /// On-disk partition label
    pub label: String,
    /// Filesystem to create
    pub filesystem: Filesystem,
    /// MBR partition type code
    pub mbr_type: u32,
    /// GPT partition type GUID
    pub gpt_guid: String,
    /// Size string; `None` consumes the remaining space
    pub size: Option<String>,
    /// Mountpoint in the installed system
    pub mountpoint: Option<String>,
    /// Position in the partition table
    pub order: u8,
    /// Boot flag
    pub bootable: bool,
}

/// A partition, selected by kind at construction time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Partition {
    /// Any non-btrfs partition
    Plain(PartitionSpec),
    /// A btrfs partition with subvolumes
    Btrfs {
        #[serde(flatten)]
        spec: PartitionSpec,
        subvolumes: Vec<Subvolume>,
    },
}

impl Partition {
    /// Common partition attributes
    pub fn spec(&self) -> &PartitionSpec {
        match self {
            Self::Plain(spec) | Self::Btrfs { spec, .. } => spec,
        }
    }

    /// Configuration key of the partition
    pub fn name(&self) -> &str {
        &self.spec().name
    }

    /// Subvolumes, empty for non-btrfs partitions
    pub fn subvolumes(&self) -> &[Subvolume] {
        match self {
            Self::Plain(_) => &[],
            Self::Btrfs { subvolumes, .. } => subvolumes,
        }
    }
}

/// A target disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disk {
    /// Device path, or an alias token while `is_alias` is set
    pub name: String,
    /// Whether `name` still needs alias substitution
    pub is_alias: bool,
    /// Partition table scheme
    pub scheme: Scheme,
    /// Partitions in declaration order
    pub partitions: Vec<Partition>,
}

impl Disk {
    /// Partitions sorted by ascending order
    pub fn partitions_by_order(&self) -> Vec<&Partition> {
        let mut partitions: Vec<&Partition> = self.partitions.iter().collect();
        partitions.sort_by_key(|p| p.spec().order);
        partitions
    }
}

/// Validated disk layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiskLayout {
    disks: Vec<Disk>,
}

impl DiskLayout {
    /// Load a layout from a YAML file
    pub fn load(path: &Path) -> Result<Self, LayoutError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Parse(format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Resolve a layout from a YAML document
    pub fn from_yaml(content: &str) -> Result<Self, LayoutError> {
        let document: Value =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::resolve(Node::new(&document))
    }

    /// Resolve a layout from a configuration tree holding a `disks` root node
    pub fn resolve(root: Node<'_>) -> Result<Self, LayoutError> {
        let disks_node = root.get("disks").ok_or(ConfigError::MissingDisksRoot)?;
        if !disks_node.is_sequence() {
            return Err(ConfigError::DisksNotAList.into());
        }

        let disks = disks_node
            .items()
            .into_iter()
            .enumerate()
            .map(|(index, node)| resolve_disk(index, node))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!("Resolved {} disk(s)", disks.len());
        Ok(Self { disks })
    }

    /// Build a layout directly from disks; no validation is performed
    pub fn from_disks(disks: Vec<Disk>) -> Self {
        Self { disks }
    }

    /// All disks in declaration order
    pub fn disks(&self) -> &[Disk] {
        &self.disks
    }

    /// Replace alias names with concrete device paths.
    ///
    /// Disks whose alias is not in `aliases` are left untouched; use
    /// [`DiskLayout::unresolved_aliases`] to find them.
    pub fn apply_aliases(&mut self, aliases: &HashMap<String, String>) -> &mut Self {
        for disk in self.disks.iter_mut().filter(|d| d.is_alias) {
            if let Some(device) = aliases.get(&disk.name) {
                tracing::debug!("Alias '{}' resolved to {}", disk.name, device);
                disk.name.clone_from(device);
                disk.is_alias = false;
            }
        }
        self
    }

    /// Alias names that have not been mapped to a device
    pub fn unresolved_aliases(&self) -> Vec<&str> {
        self.disks
            .iter()
            .filter(|d| d.is_alias)
            .map(|d| d.name.as_str())
            .collect()
    }

    /// Whether any disk has a partition with the given name
    pub fn contains_partition(&self, name: &str) -> bool {
        self.disks
            .iter()
            .flat_map(|d| &d.partitions)
            .any(|p| p.name() == name)
    }

    /// All partitions, on any disk, with the given filesystem
    pub fn partitions_with_filesystem(&self, filesystem: &str) -> Vec<&Partition> {
        self.disks
            .iter()
            .flat_map(|d| &d.partitions)
            .filter(|p| p.spec().filesystem.to_string() == filesystem)
            .collect()
    }

    /// Check that the partitions a system installation needs are present
    pub fn validate_for_system(&self) -> Result<(), ValidationError> {
        for name in ["boot", "root"] {
            if !self.contains_partition(name) {
                return Err(ValidationError::MissingRequiredPartition {
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn resolve_disk(index: usize, node: Node<'_>) -> Result<Disk, LayoutError> {
    let (name, is_alias) = if let Some(alias) = node.get("alias").and_then(|n| n.as_string()) {
        (alias, true)
    } else if let Some(path) = node.get("path").and_then(|n| n.as_string()) {
        (path, false)
    } else {
        return Err(ConfigError::MissingDiskTarget { index }.into());
    };

    let partitioning = node
        .get("partitioning")
        .filter(|p| p.is_mapping() && !p.is_empty())
        .ok_or_else(|| ConfigError::MissingPartitioning { disk: name.clone() })?;

    let scheme = match partitioning.get("scheme") {
        Some(scheme_node) => {
            let raw = scheme_node.as_string().unwrap_or_default();
            Scheme::parse(&raw).ok_or_else(|| ConfigError::InvalidScheme {
                disk: name.clone(),
                scheme: raw,
            })?
        }
        None => Scheme::Gpt,
    };

    let entries = partitioning
        .get("partitions")
        .filter(|p| p.is_mapping())
        .map(|p| p.entries())
        .unwrap_or_default();
    if entries.is_empty() {
        return Err(ConfigError::MissingPartitions { disk: name }.into());
    }

    let single = entries.len() == 1;

    // First pass: orders, so the size rule knows which partition is last
    let mut orders = Vec::with_capacity(entries.len());
    for (partition, props) in &entries {
        let order = match props.get("order") {
            Some(order_node) => Some(parse_order(&name, partition, order_node)?),
            None if single => None,
            None => {
                return Err(ValidationError::MissingOrder {
                    disk: name,
                    partition: partition.clone(),
                }
                .into())
            }
        };
        orders.push(order);
    }

    let mut seen: BTreeMap<u8, &str> = BTreeMap::new();
    for ((partition, _), order) in entries.iter().zip(&orders) {
        if let Some(order) = order {
            if let Some(first) = seen.insert(*order, partition) {
                return Err(ValidationError::DuplicateOrder {
                    disk: name,
                    order: *order,
                    first: first.to_string(),
                    second: partition.clone(),
                }
                .into());
            }
        }
    }
    let max_order = orders.iter().flatten().copied().max();

    let mut partitions = Vec::with_capacity(entries.len());
    for ((partition, props), order) in entries.iter().zip(orders) {
        let order = order.unwrap_or(1);
        let is_last = single || Some(order) == max_order;
        partitions.push(resolve_partition(&name, partition, *props, order, is_last)?);
    }

    tracing::debug!(
        "Disk '{}' ({}): {} partition(s)",
        name,
        scheme,
        partitions.len()
    );

    Ok(Disk {
        name,
        is_alias,
        scheme,
        partitions,
    })
}

fn parse_order(disk: &str, partition: &str, node: Node<'_>) -> Result<u8, ConfigError> {
    node.as_u64()
        .and_then(|n| u8::try_from(n).ok())
        .ok_or_else(|| ConfigError::InvalidField {
            owner: format!("{disk}/{partition}"),
            field: "order".to_string(),
            reason: format!(
                "expected an integer between 0 and 255, got '{}'",
                node.as_string().unwrap_or_default()
            ),
        })
}

fn string_field(props: Node<'_>, key: &str) -> Option<String> {
    props.get(key).and_then(|n| n.as_string())
}

fn resolve_partition(
    disk: &str,
    name: &str,
    props: Node<'_>,
    order: u8,
    is_last: bool,
) -> Result<Partition, LayoutError> {
    let owner = || format!("{disk}/{name}");

    let size = string_field(props, "size");
    match &size {
        None if !is_last => {
            return Err(ValidationError::MissingSize {
                disk: disk.to_string(),
                partition: name.to_string(),
            }
            .into())
        }
        Some(size) => size::validate(size).map_err(|source| ConfigError::Size {
            disk: disk.to_string(),
            partition: name.to_string(),
            source,
        })?,
        None => {}
    }

    let guid = string_field(props, "guid");
    let mbr_type = match props.get("type") {
        Some(node) => Some(
            node.as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| ConfigError::InvalidField {
                    owner: owner(),
                    field: "type".to_string(),
                    reason: "expected a numeric MBR partition type".to_string(),
                })?,
        ),
        None => None,
    };

    let bootable = match props.get("bootable") {
        Some(node) => node.as_bool().ok_or_else(|| ConfigError::InvalidField {
            owner: owner(),
            field: "bootable".to_string(),
            reason: "expected true or false".to_string(),
        })?,
        None => false,
    };

    let label = string_field(props, "label");
    let mountpoint = string_field(props, "mountpoint");

    if name == "root" {
        let spec = PartitionSpec {
            name: name.to_string(),
            label: label.unwrap_or_else(|| ROOT_LABEL.to_string()),
            filesystem: Filesystem::Btrfs,
            mbr_type: mbr_type.unwrap_or(ROOT_MBR_TYPE),
            gpt_guid: guid.unwrap_or_else(|| ROOT_GPT_GUID.to_string()),
            size,
            mountpoint: Some("/".to_string()),
            order,
            bootable,
        };
        return Ok(Partition::Btrfs {
            spec,
            subvolumes: root_subvolumes(),
        });
    }

    // Root ignores any declared filesystem, so only other partitions parse it
    let filesystem_name =
        string_field(props, "filesystem").unwrap_or_else(|| DEFAULT_FILESYSTEM.to_string());
    let filesystem =
        Filesystem::parse(&filesystem_name).ok_or_else(|| ConfigError::InvalidFatSize {
            partition: name.to_string(),
            filesystem: filesystem_name.clone(),
        })?;

    let spec = PartitionSpec {
        name: name.to_string(),
        label: label.unwrap_or_default(),
        filesystem,
        mbr_type: mbr_type.unwrap_or(DEFAULT_MBR_TYPE),
        gpt_guid: guid.unwrap_or_else(|| DEFAULT_GPT_GUID.to_string()),
        size,
        mountpoint,
        order,
        bootable,
    };

    if spec.filesystem == Filesystem::Btrfs {
        let subvolumes = match props.get("subvolumes") {
            Some(list) => resolve_subvolumes(disk, name, list)?,
            None => Vec::new(),
        };
        Ok(Partition::Btrfs { spec, subvolumes })
    } else {
        Ok(Partition::Plain(spec))
    }
}

fn resolve_subvolumes(
    disk: &str,
    partition: &str,
    list: Node<'_>,
) -> Result<Vec<Subvolume>, ConfigError> {
    list.items()
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let path = string_field(item, "volume").ok_or_else(|| {
                ConfigError::MissingSubvolumeVolume {
                    disk: disk.to_string(),
                    partition: partition.to_string(),
                    index,
                }
            })?;
            let kind = match string_field(item, "type") {
                Some(raw) => SubvolumeKind::parse(&raw).ok_or_else(|| {
                    ConfigError::InvalidSubvolumeType {
                        subvolume: path.clone(),
                        value: raw,
                    }
                })?,
                None => SubvolumeKind::Default,
            };
            Ok(Subvolume {
                path,
                mountpoint: string_field(item, "mountpoint"),
                kind,
            })
        })
        .collect()
}

/// The fixed subvolume pair every root partition carries
pub fn root_subvolumes() -> Vec<Subvolume> {
    vec![
        Subvolume {
            path: "/@system".to_string(),
            mountpoint: Some("/system".to_string()),
            kind: SubvolumeKind::Rw,
        },
        Subvolume {
            path: "/@revisions".to_string(),
            mountpoint: Some("/revisions".to_string()),
            kind: SubvolumeKind::Ro,
        },
    ]
}
