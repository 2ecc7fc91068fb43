//! Configuration module for search-dispatch
//!
//! Handles loading and validating settings from YAML files and environment variables.

mod settings;

pub use settings::*;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming an explicit settings file
pub const SETTINGS_PATH_ENV: &str = "SEARCH_DISPATCH_SETTINGS_PATH";

/// Load settings from `explicit`, the environment, or the default locations.
///
/// Falls back to [`Settings::default`] when no file exists. Environment
/// overrides are merged and the result is validated in every case.
pub fn load(explicit: Option<&Path>) -> Result<Settings> {
    let mut settings = match locate(explicit) {
        Some(path) => {
            info!("Loading settings from: {}", path.display());
            Settings::from_file(&path)?
        }
        None => {
            info!("No settings file found, using defaults");
            Settings::default()
        }
    };
    settings.merge_env();
    settings.validate()?;
    Ok(settings)
}

fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(SETTINGS_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let mut candidates = vec![
        PathBuf::from("search-dispatch.yml"),
        PathBuf::from("config/search-dispatch.yml"),
    ];
    if let Some(dir) = dirs::config_dir() {
        candidates.push(dir.join("search-dispatch/settings.yml"));
    }
    candidates.into_iter().find(|p| p.exists())
}
