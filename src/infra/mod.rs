//! Infrastructure layer
//!
//! Handles external processes, mounts and platform directories.
//! This module is the only place where side effects occur.

pub mod dirs;
pub mod mount;
pub mod process;
