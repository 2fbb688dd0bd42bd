//! Lithos - declarative disk provisioning and system formulas
//!
//! This library resolves YAML disk layouts and inheritable system formulas
//! into validated models, plans partition tables from them, and provisions
//! block devices: partition tables, filesystems and btrfs subvolumes.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Resolution, planning and provisioning logic
//! - [`infra`] - Infrastructure layer (processes, mounts, directories)
//! - [`config`] - Constants and defaults
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;
