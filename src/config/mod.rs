//! Configuration constants
//!
//! - [`defaults`] - Default values for partitions, formulas and provisioning

pub mod defaults;
