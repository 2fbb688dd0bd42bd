//! Default configuration values

/// Filesystem used when a partition does not declare one
pub const DEFAULT_FILESYSTEM: &str = "ext4";

/// GPT type GUID for generic Linux filesystem data
pub const DEFAULT_GPT_GUID: &str = "0FC63DAF-8483-4772-8E79-3D69D8477DE4";

/// MBR type code for Linux filesystem data
pub const DEFAULT_MBR_TYPE: u32 = 0x83;

/// GPT type GUID for the Linux root partition (x86-64)
pub const ROOT_GPT_GUID: &str = "4F68BCE3-E8CD-4DB1-96E7-FBCAF984B709";

/// MBR type code for the Linux root partition
pub const ROOT_MBR_TYPE: u32 = 0x83;

/// Label given to the root partition when none is configured
pub const ROOT_LABEL: &str = "ROOT";

/// GPT type GUID for the EFI system partition
pub const EFI_SYSTEM_GUID: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";

/// GPT type GUID for Linux /home
pub const LINUX_HOME_GUID: &str = "933AC7E1-2EB4-4F13-B844-0E14E2AEF915";

/// Size of the boot partition in the built-in layout
pub const DEFAULT_BOOT_SIZE: &str = "512MiB";

/// Sector size assumed when planning without a device
pub const DEFAULT_SECTOR_SIZE: u32 = 512;

/// Default hostname for a formula's system block
pub const DEFAULT_HOSTNAME: &str = "lithos";

/// Default timezone for a formula's system block
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Default locale for a formula's system block
pub const DEFAULT_LOCALE: &str = "en_US.UTF-8";

/// Default console keymap for a formula's system block
pub const DEFAULT_KEYMAP: &str = "us";

/// Default login shell for formula users
pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Prefix for temporary btrfs mount directories
pub const MOUNT_DIR_PREFIX: &str = "lithos-mnt-";
