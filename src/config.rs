// src/config.rs

//! Configuration loading utilities.
//!
//! This module loads the TOML config and assembles the dealership registry
//! from inline `[[dealerships]]` entries and an optional CSV file.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, Dealership};

/// Load configuration from a TOML file.
///
/// A missing file falls back to defaults; a malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let config = Config::load(path)
        .map_err(|e| AppError::config(format!("Failed to load {path:?}: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Build the dealership registry.
///
/// Inline entries come first, then rows from `dealerships_csv` (resolved
/// against `base_dir` when relative). Later entries with an id already seen
/// are dropped.
pub fn load_dealerships(config: &Config, base_dir: &Path) -> Result<Vec<Dealership>> {
    let mut dealers = config.dealerships.clone();

    if let Some(csv_path) = &config.dealerships_csv {
        let path = if csv_path.is_absolute() {
            csv_path.clone()
        } else {
            base_dir.join(csv_path)
        };
        let loaded = Dealership::load_csv(&path)
            .map_err(|e| AppError::config(format!("Failed to load dealerships from {path:?}: {e}")))?;
        log::info!("Loaded {} dealerships from {:?}", loaded.len(), path);
        dealers.extend(loaded);
    }

    let mut seen = HashSet::new();
    let before = dealers.len();
    dealers.retain(|d| seen.insert(d.id.clone()));
    if dealers.len() < before {
        log::warn!("Dropped {} dealerships with duplicate ids", before - dealers.len());
    }
    Ok(dealers)
}

/// Load config and dealership registry together.
pub fn load_all(config_path: &Path) -> Result<(Config, Vec<Dealership>)> {
    let config = load_config(config_path)?;
    let base_dir = config_path.parent().unwrap_or(Path::new("."));
    let dealers = load_dealerships(&config, base_dir)?;
    Ok((config, dealers))
}
