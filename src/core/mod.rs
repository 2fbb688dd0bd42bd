//! Core business logic module
//!
//! Resolution and planning are pure; provisioning reaches devices only
//! through [`crate::infra`].
//!
//! # Submodules
//!
//! - [`size`] - Size strings to sector counts
//! - [`node`] - Read-only view over a parsed YAML document
//! - [`disk`] - Disk layout resolution and model
//! - [`formula`] - Formula resolution with inheritance
//! - [`parttypes`] - GPT and MBR partition type registries
//! - [`planner`] - Partition planning and in-memory partition tables
//! - [`provision`] - Partition table, filesystem and subvolume provisioning
//! - [`install`] - Package manager collaborator
//! - [`layout`] - Built-in single-device layout
//! - [`settings`] - Global settings
//! - [`doctor`] - Host tool checks

pub mod disk;
pub mod doctor;
pub mod formula;
pub mod install;
pub mod layout;
pub mod node;
pub mod parttypes;
pub mod planner;
pub mod provision;
pub mod settings;
pub mod size;
