//! Configuration, constants and numeric helpers shared across the crate.

pub mod config;
pub mod constants;
pub mod math;
