//! Grid settings
//!
//! Settings come from defaults, then an optional JSON file, then
//! `LEADGRID_*` environment variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Page sizes offered by the pagination control
pub const PAGE_SIZE_OPTIONS: [usize; 4] = [10, 25, 50, 100];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid value for {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("page size {0} is not one of the offered sizes")]
    PageSize(usize),

    #[error("page size options must all be greater than zero")]
    ZeroPageSizeOption,
}

/// Settings for a grid instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    /// Rows per page on first load
    pub page_size: usize,

    /// Page sizes the user may pick from
    pub page_size_options: Vec<usize>,

    /// Quiet period before a burst of change notifications triggers a re-fetch
    pub realtime_debounce_ms: u64,

    /// Commit a pending edit when the user moves to another cell
    pub commit_on_leave: bool,

    /// Cell contents treated as missing during CSV import
    pub import_null_patterns: Vec<String>,

    /// SQLite database backing the demo binary
    pub database_path: PathBuf,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE_OPTIONS[0],
            page_size_options: PAGE_SIZE_OPTIONS.to_vec(),
            realtime_debounce_ms: 250,
            commit_on_leave: false,
            import_null_patterns: vec![
                String::new(),
                "-".to_string(),
                "N/A".to_string(),
                "null".to_string(),
                "none".to_string(),
            ],
            database_path: PathBuf::from("data/leads.db"),
        }
    }
}

impl GridSettings {
    /// Load settings from a JSON file, or defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
        let settings = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                let parsed: GridSettings =
                    serde_json::from_str(&raw).map_err(|source| SettingsError::Parse {
                        path: path.to_path_buf(),
                        source,
                    })?;
                debug!(path = %path.display(), "loaded grid settings");
                parsed
            }
            None => Self::default(),
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `LEADGRID_*` environment overrides
    pub fn with_env_overrides(self) -> Result<Self, SettingsError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&'static str) -> Option<String>,
    {
        if let Some(value) = lookup("LEADGRID_PAGE_SIZE") {
            self.page_size = value.parse().map_err(|_| SettingsError::Env {
                name: "LEADGRID_PAGE_SIZE",
                value,
            })?;
        }
        if let Some(value) = lookup("LEADGRID_DEBOUNCE_MS") {
            self.realtime_debounce_ms = value.parse().map_err(|_| SettingsError::Env {
                name: "LEADGRID_DEBOUNCE_MS",
                value,
            })?;
        }
        if let Some(value) = lookup("LEADGRID_COMMIT_ON_LEAVE") {
            self.commit_on_leave = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                _ => {
                    return Err(SettingsError::Env {
                        name: "LEADGRID_COMMIT_ON_LEAVE",
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("LEADGRID_DATABASE") {
            self.database_path = PathBuf::from(value);
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.page_size_options.contains(&0) {
            return Err(SettingsError::ZeroPageSizeOption);
        }
        if self.page_size == 0 || !self.page_size_options.contains(&self.page_size) {
            return Err(SettingsError::PageSize(self.page_size));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.realtime_debounce_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = GridSettings::default();
        assert_eq!(settings.page_size, 10);
        assert_eq!(settings.debounce(), Duration::from_millis(250));
        assert!(!settings.commit_on_leave);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let parsed: GridSettings = serde_json::from_str(r#"{ "page_size": 25 }"#).unwrap();
        assert_eq!(parsed.page_size, 25);
        assert_eq!(parsed.realtime_debounce_ms, 250);
    }

    #[test]
    fn test_env_overrides() {
        let settings = GridSettings::default()
            .with_overrides(|name| match name {
                "LEADGRID_DEBOUNCE_MS" => Some("40".to_string()),
                "LEADGRID_COMMIT_ON_LEAVE" => Some("yes".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(settings.realtime_debounce_ms, 40);
        assert!(settings.commit_on_leave);
    }

    #[test]
    fn test_rejects_unoffered_page_size() {
        let err = GridSettings::default()
            .with_overrides(|name| (name == "LEADGRID_PAGE_SIZE").then(|| "7".to_string()))
            .unwrap_err();
        assert!(matches!(err, SettingsError::PageSize(7)));
    }

    #[test]
    fn test_rejects_zero_page_size_option() {
        let raw = r#"{ "page_size": 10, "page_size_options": [0, 10, 25] }"#;
        let parsed: GridSettings = serde_json::from_str(raw).unwrap();
        assert!(matches!(parsed.validate(), Err(SettingsError::ZeroPageSizeOption)));
    }
}
