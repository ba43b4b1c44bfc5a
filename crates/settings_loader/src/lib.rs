//! # Settings Loader
//!
//! Centralized settings loading for the generation service. Configuration
//! lives in a JSON file (by default `settings.json`) holding the database
//! file location, the daily schedules of the generation jobs, and the
//! shutdown timeout.
//!
//! ## Features
//!
//! - Load settings from specified file paths
//! - Load settings from default location (`settings.json`)
//! - Handle optional settings gracefully
//! - Provide fallback mechanisms when settings files are missing

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use models::Settings;

/// Loads settings from a JSON file
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading settings file: {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("Parsing settings JSON in {}", path.display()))?;
    Ok(settings)
}

/// Loads settings from a default location (settings.json in the current directory)
pub fn load_default_settings() -> Result<Settings> {
    load_settings("settings.json")
}

/// Loads settings from an optional path, returning None if no path is provided
pub fn load_optional_settings(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    match path {
        Some(settings_path) => Ok(Some(load_settings(settings_path)?)),
        None => Ok(None),
    }
}

/// Tries to load settings from the provided path, falling back to default location if the path is None
/// or if the file doesn't exist. Returns None only if no settings file is found anywhere.
pub fn load_settings_with_fallback(path: Option<&PathBuf>) -> Result<Option<Settings>> {
    // First try the provided path
    if let Some(settings_path) = path {
        match load_settings(settings_path) {
            Ok(settings) => return Ok(Some(settings)),
            Err(_) => {
                // If the provided path fails, fall back to checking default location
            }
        }
    }

    // Try default location
    match load_default_settings() {
        Ok(settings) => Ok(Some(settings)),
        Err(_) => Ok(None), // No settings file found, return None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_settings_applies_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{\"budget_schedule\": \"04:30\"}}").unwrap();

        let settings = load_settings(file.path()).unwrap();
        assert_eq!(settings.budget_schedule, "04:30");
        assert_eq!(settings.transaction_schedule, "06:30");
        assert_eq!(settings.database_file, "database/database.json");
    }

    #[test]
    fn test_load_settings_missing_file() {
        let result = load_settings("does/not/exist/settings.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_settings_malformed_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let result = load_settings(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_load_optional_settings_none() {
        let result = load_optional_settings(None).unwrap();
        assert!(result.is_none());
    }
}
