//! Plant Configuration Module
//!
//! Physics parameters, runtime knobs, and detector rule tables loaded from
//! TOML, with built-in defaults for everything.
//!
//! ## Loading Order
//!
//! 1. `PUMPGUARD_CONFIG` environment variable (path to TOML file)
//! 2. `pumpguard.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! Call `config::init()` once at startup, then `config::get()` anywhere:
//!
//! ```ignore
//! // In main():
//! config::init(PlantConfig::load());
//!
//! // Anywhere in the codebase:
//! let window = config::get().detector.window_sec;
//! ```

mod plant_config;
pub mod defaults;
pub mod validation;

pub use plant_config::*;

use std::sync::OnceLock;

/// Global plant configuration, initialized once at startup.
static PLANT_CONFIG: OnceLock<PlantConfig> = OnceLock::new();

/// Initialize the global plant configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: PlantConfig) {
    if PLANT_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once, ignoring");
    }
}

/// Get the global plant configuration.
///
/// Before `init()` this returns the built-in defaults; a later `init()`
/// still takes effect.
pub fn get() -> &'static PlantConfig {
    static DEFAULTS: OnceLock<PlantConfig> = OnceLock::new();
    PLANT_CONFIG
        .get()
        .unwrap_or_else(|| DEFAULTS.get_or_init(PlantConfig::default))
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    PLANT_CONFIG.get().is_some()
}
