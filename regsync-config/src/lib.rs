//! Configuration management for the registry mirror.
//!
//! Provides environment detection, configuration loading from YAML files,
//! secret handling, and the shared configuration types consumed by the
//! mirror binary and the core crate.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
