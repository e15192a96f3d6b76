use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::engine::{Engine, DEFAULT_RAY_LENGTH_KM};
use crate::observation::DEFAULT_DATETIME_FORMAT;
use crate::view_extent::ViewExtentController;

/// File looked up in the working directory when no path is given
pub const LOCAL_CONFIG_FILE: &str = "radiotrack.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub display: DisplayConfig,
    pub view: ViewConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub ray_length_km: f64,
    pub datetime_format: String,
    pub show_intersections: bool,
    pub refresh_rate: u64, // milliseconds
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            ray_length_km: DEFAULT_RAY_LENGTH_KM,
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            show_intersections: true,
            refresh_rate: 250,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub extent_tolerance: f64, // degrees
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            extent_tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Explicit path, else `./radiotrack.toml`, else the user config
    /// directory, else built-in defaults.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        for candidate in Self::candidate_paths() {
            if candidate.is_file() {
                return Self::load(candidate);
            }
        }
        Ok(Self::default())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("radiotrack").join("config.toml"));
        }
        paths
    }

    pub fn build_engine(&self) -> Result<Engine> {
        Engine::new(self.display.ray_length_km, &self.display.datetime_format)
            .context("invalid [display] settings")
    }

    pub fn view_controller(&self) -> ViewExtentController {
        ViewExtentController::new(self.view.extent_tolerance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.display.ray_length_km, 1.0);
        assert_eq!(config.display.datetime_format, "%Y-%m-%d %H:%M:%S");
        assert!(config.display.show_intersections);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [display]
            ray_length_km = 2.5

            [logging]
            file = "radiotrack.log"
            "#,
        )
        .unwrap();
        assert_eq!(config.display.ray_length_km, 2.5);
        assert_eq!(config.display.refresh_rate, 250);
        assert_eq!(config.logging.file, Some(PathBuf::from("radiotrack.log")));
        assert_eq!(config.view.extent_tolerance, 1e-9);
    }

    #[test]
    fn test_load_and_build_engine() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[display]\nray_length_km = 3.0\ndatetime_format = \"%d/%m/%Y %H:%M:%S\""
        )
        .unwrap();

        let config = Config::discover(Some(file.path())).unwrap();
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.ray_length_km(), 3.0);
        assert_eq!(engine.datetime_format(), "%d/%m/%Y %H:%M:%S");
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let config: Config = toml::from_str("[display]\nray_length_km = -1.0").unwrap();
        assert!(config.build_engine().is_err());
        assert!(Config::load("/nonexistent/radiotrack.toml").is_err());
    }
}
