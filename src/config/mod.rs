//! Configuration module
//!
//! Handles loading service settings from an optional TOML file.

mod settings;

pub use settings::*;
