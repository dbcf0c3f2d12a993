//! Configuration module for Motion Sweep
//!
//! Handles loading the sweep configuration from TOML files, environment
//! variable overrides and validation of the resolution catalog.

pub mod config;
pub mod resolution;

pub use config::*;
pub use resolution::{ParseResolutionError, Resolution};
