//! Engine Configuration Module
//!
//! Analysis parameters loaded from TOML files, with built-in defaults
//! matching the reference firmware.
//!
//! ## Loading Order
//!
//! 1. `MOTIONSP_CONFIG` environment variable (path to TOML file)
//! 2. `motion_sp.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded [`EngineConfig`] is handed to the engine by value; there is
//! no process-wide configuration state.

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;
