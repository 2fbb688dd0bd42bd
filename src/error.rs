//! Error types for lithos
//!
//! Domain-specific error types using thiserror. Resolution errors
//! ([`ConfigError`], [`ValidationError`], [`FormulaError`]) are raised before
//! any device is touched; [`ProvisionError`] is scoped to a single disk.

use std::path::PathBuf;
use thiserror::Error;

/// Size string conversion errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SizeError {
    /// The size string has no recognised unit suffix or a malformed number
    #[error("Invalid size '{size}': expected a number followed by KiB, MiB, GiB, TiB, K, M, G or T")]
    InvalidFormat { size: String },

    /// The size is zero, which would request an empty partition
    #[error("Size '{size}' is zero; omit the size on the last partition to use the rest of the disk")]
    Zero { size: String },

    /// Sector size of zero
    #[error("Invalid sector size {sector_size}")]
    InvalidSectorSize { sector_size: u32 },

    /// Result does not fit in a sector count
    #[error("Size '{size}' is too large")]
    Overflow { size: String },
}

/// Malformed or missing fields in a disk configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The configuration has no `disks` root node
    #[error("Invalid partition configuration: could not find root node \"disks\"")]
    MissingDisksRoot,

    /// The `disks` node is not a list
    #[error("Invalid partition configuration: \"disks\" must be a list")]
    DisksNotAList,

    /// A disk entry has neither `alias` nor `path`
    #[error("Disk entry #{index} has neither an \"alias\" nor a \"path\"")]
    MissingDiskTarget { index: usize },

    /// A disk has no usable `partitioning` block
    #[error("Disk '{disk}' has no \"partitioning\" entry or it is empty")]
    MissingPartitioning { disk: String },

    /// Unrecognised partition table scheme
    #[error("Disk '{disk}' has invalid partition scheme '{scheme}' (expected gpt or mbr)")]
    InvalidScheme { disk: String, scheme: String },

    /// A disk has no partitions
    #[error("Disk '{disk}' has no \"partitions\" entry or it is empty")]
    MissingPartitions { disk: String },

    /// A btrfs subvolume entry lacks its `volume` key
    #[error("Subvolume #{index} of partition '{partition}' on disk '{disk}' must have a \"volume\" attribute")]
    MissingSubvolumeVolume {
        disk: String,
        partition: String,
        index: usize,
    },

    /// Unknown subvolume type
    #[error("Subvolume '{subvolume}' has invalid type '{value}' (expected rw, ro or default)")]
    InvalidSubvolumeType { subvolume: String, value: String },

    /// A field holds a value of the wrong shape
    #[error("Field '{field}' of '{owner}' is invalid: {reason}")]
    InvalidField {
        owner: String,
        field: String,
        reason: String,
    },

    /// Unsupported FAT variant
    #[error("Partition '{partition}' has unsupported FAT filesystem '{filesystem}' (expected fat12, fat16 or fat32)")]
    InvalidFatSize {
        partition: String,
        filesystem: String,
    },

    /// A size string could not be converted
    #[error("Partition '{partition}' on disk '{disk}': {source}")]
    Size {
        disk: String,
        partition: String,
        source: SizeError,
    },

    /// The YAML document could not be parsed
    #[error("Failed to parse disk configuration: {0}")]
    Parse(String),
}

/// Ordering, sizing and existence invariant violations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A partition lacks `order` on a disk with several partitions
    #[error("Partition '{partition}' on disk '{disk}' must have an \"order\" when the disk has more than one partition")]
    MissingOrder { disk: String, partition: String },

    /// Two partitions share an `order`
    #[error("Partitions '{first}' and '{second}' on disk '{disk}' both use order {order}")]
    DuplicateOrder {
        disk: String,
        order: u8,
        first: String,
        second: String,
    },

    /// A partition other than the last one lacks `size`
    #[error("Partition '{partition}' on disk '{disk}' must have a \"size\" unless it is the final partition")]
    MissingSize { disk: String, partition: String },

    /// A partition required for system installation is absent
    #[error("Configuration doesn't contain a '{name}' partition")]
    MissingRequiredPartition { name: String },
}

/// Disk layout resolution errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    /// Malformed configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Invariant violation
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Formula resolution errors
#[derive(Error, Debug)]
pub enum FormulaError {
    /// An inherited formula could not be found at any candidate path
    #[error("Could not include formula '{name}', looked at: {}", candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    NotFound {
        name: String,
        candidates: Vec<PathBuf>,
    },

    /// A formula inherits itself, directly or transitively
    #[error("Cyclic formula inheritance: {}", cycle.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" -> "))]
    CyclicInheritance { cycle: Vec<PathBuf> },

    /// More than one `system` block in the inheritance closure
    #[error("Multiple \"system\" sections are ambiguous ({count} found across the inheritance chain)")]
    AmbiguousSystemConfig { count: usize },

    /// Structural problems with a formula document
    #[error("Bad formula format in '{origin}': {message}")]
    Format { origin: String, message: String },

    /// Formula file could not be read
    #[error("Failed to read formula '{path}': {error}")]
    Io { path: PathBuf, error: String },

    /// YAML syntax error
    #[error("Failed to parse formula '{origin}': {error}")]
    Parse { origin: String, error: String },
}

/// Partition planning errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// The disk still refers to an alias that was never mapped to a device
    #[error("Disk alias '{alias}' was not resolved to a device path")]
    AliasUnresolved { alias: String },

    /// The requested type identifier is not in the scheme's registry
    #[error("Unknown partition type '{requested}' for partition '{partition}' ({scheme})")]
    UnknownPartitionType {
        partition: String,
        requested: String,
        scheme: String,
    },

    /// Partition size could not be converted to sectors
    #[error("Partition '{partition}': {source}")]
    Size { partition: String, source: SizeError },

    /// An MBR table holds at most four primary partitions
    #[error("MBR disk '{disk}' has {count} partitions; at most {max} primary partitions are supported")]
    TooManyPrimaryPartitions {
        disk: String,
        count: usize,
        max: usize,
    },
}

/// Whether the cleanup unmount after a failed subvolume creation succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnmountOutcome {
    /// Filesystem was unmounted and the temporary directory removed
    Unmounted,
    /// Filesystem is still mounted at the given path
    StillMounted { mountpoint: PathBuf, error: String },
}

/// Device provisioning errors, scoped to a single disk
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// Partition table creation failed at some step
    #[error("Partition table error on disk '{disk}' while {step}: {message}")]
    PartitionTable {
        disk: String,
        step: String,
        message: String,
    },

    /// Planning failed once the device sector size was known
    #[error("Failed to plan disk '{disk}': {source}")]
    Plan { disk: String, source: PlanError },

    /// mkfs exited non-zero
    #[error("Failed to create filesystem {filesystem} on {}: exit code {exit_code}", path.display())]
    FilesystemCreation {
        path: PathBuf,
        filesystem: String,
        exit_code: i32,
    },

    /// The partition could not be mounted for subvolume creation
    #[error("Failed to mount partition '{partition}' on disk '{disk}' to create btrfs subvolumes: {message}")]
    Mount {
        disk: String,
        partition: String,
        message: String,
    },

    /// The partition could not be unmounted after subvolume creation
    #[error("Failed to unmount partition '{partition}' on disk '{disk}' from {}: {message}; manual intervention required", mountpoint.display())]
    Unmount {
        disk: String,
        partition: String,
        mountpoint: PathBuf,
        message: String,
    },

    /// A btrfs subvolume could not be created
    #[error("Failed to create btrfs subvolume '{subvolume}' for disk '{disk}' on partition '{partition}': {message}{}", match unmount {
        UnmountOutcome::Unmounted => String::new(),
        UnmountOutcome::StillMounted { mountpoint, error } => format!("; the filesystem is still mounted at {} ({error}) and requires manual intervention", mountpoint.display()),
    })]
    Subvolume {
        disk: String,
        partition: String,
        subvolume: String,
        message: String,
        unmount: UnmountOutcome,
    },

    /// A partition named in the applied table is missing from the disk
    #[error("Partition '{partition}' has no table-assigned number on disk '{disk}'")]
    UnassignedPartition { disk: String, partition: String },

    /// Work was cancelled between steps
    #[error("Provisioning of disk '{disk}' cancelled before {step}")]
    Cancelled { disk: String, step: String },
}

/// Package manager collaborator errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// No package with the exact name exists in any database
    #[error("Package '{name}' ({category}) not found in any database")]
    NotFound { name: String, category: String },

    /// The backend rejected an operation
    #[error("Package manager error: {0}")]
    Backend(String),
}

/// Top-level lithos error type
#[derive(Error, Debug)]
pub enum LithosError {
    /// Disk layout error
    #[error("Disk configuration error: {0}")]
    Layout(#[from] LayoutError),

    /// Formula error
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Planning error
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Provisioning error
    #[error("Provisioning error: {0}")]
    Provision(#[from] ProvisionError),

    /// Package manager error
    #[error("Package error: {0}")]
    Package(#[from] PackageError),

    /// IO error
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl From<ConfigError> for LithosError {
    fn from(error: ConfigError) -> Self {
        Self::Layout(error.into())
    }
}

impl From<ValidationError> for LithosError {
    fn from(error: ValidationError) -> Self {
        Self::Layout(error.into())
    }
}
