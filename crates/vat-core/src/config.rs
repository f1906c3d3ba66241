use crate::validation::{self, ValidationError};
use crate::vat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const DEFAULT_CURRENT_VAT: f64 = 20.0;
pub const DEFAULT_FUTURE_VAT: f64 = 22.0;
pub const DEFAULT_PROJECTION_YEARS: u32 = 5;

/// Per-project VAT assumptions used by the simplified model and by projections.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_current_vat")]
    pub current_vat: f64,
    #[serde(default = "default_future_vat")]
    pub future_vat: f64,
    #[serde(default = "default_projection_years")]
    pub projection_years: u32,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            current_vat: DEFAULT_CURRENT_VAT,
            future_vat: DEFAULT_FUTURE_VAT,
            projection_years: DEFAULT_PROJECTION_YEARS,
        }
    }
}

impl ProjectSettings {
    pub fn new(
        current_vat: f64,
        future_vat: f64,
        projection_years: u32,
    ) -> Result<Self, ValidationError> {
        let settings = Self {
            current_vat,
            future_vat,
            projection_years,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        vat::validate_rate(self.current_vat)?;
        vat::validate_rate(self.future_vat)?;
        validation::ensure_projection_years(self.projection_years)?;
        Ok(())
    }
}

fn default_current_vat() -> f64 {
    DEFAULT_CURRENT_VAT
}

fn default_future_vat() -> f64 {
    DEFAULT_FUTURE_VAT
}

fn default_projection_years() -> u32 {
    DEFAULT_PROJECTION_YEARS
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Serialization(serde_json::Error),
    Invalid(ValidationError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {err}"),
            ConfigError::Serialization(err) => write!(f, "config parse error: {err}"),
            ConfigError::Invalid(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<ValidationError> for ConfigError {
    fn from(value: ValidationError) -> Self {
        Self::Invalid(value)
    }
}

/// Application-level configuration, normally stored as `config.json` next to
/// the projects folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VatConfig {
    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,
    #[serde(default = "default_current_vat")]
    pub default_current_vat: f64,
    #[serde(default = "default_future_vat")]
    pub default_future_vat: f64,
    #[serde(default = "default_projection_years")]
    pub default_projection_years: u32,
}

impl Default for VatConfig {
    fn default() -> Self {
        Self {
            projects_dir: default_projects_dir(),
            default_current_vat: DEFAULT_CURRENT_VAT,
            default_future_vat: DEFAULT_FUTURE_VAT,
            default_projection_years: DEFAULT_PROJECTION_YEARS,
        }
    }
}

impl VatConfig {
    /// Base folder holding `config.json` and the `projects` directory.
    pub fn base_dir() -> PathBuf {
        directories::UserDirs::new()
            .and_then(|dirs| dirs.document_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vat")
    }

    pub fn default_path() -> PathBuf {
        Self::base_dir().join("config.json")
    }

    /// Reads the config at `path`; a missing file yields the defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let json = fs::read_to_string(path)?;
        let config: VatConfig = serde_json::from_str(&json)?;
        config.project_settings()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.project_settings()?;
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Settings handed to every newly created project.
    pub fn project_settings(&self) -> Result<ProjectSettings, ValidationError> {
        ProjectSettings::new(
            self.default_current_vat,
            self.default_future_vat,
            self.default_projection_years,
        )
    }
}

fn default_projects_dir() -> PathBuf {
    VatConfig::base_dir().join("projects")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = VatConfig::load(dir.path().join("config.json")).unwrap();
        assert_eq!(config.default_current_vat, DEFAULT_CURRENT_VAT);
        assert_eq!(config.default_future_vat, DEFAULT_FUTURE_VAT);
        assert_eq!(config.default_projection_years, DEFAULT_PROJECTION_YEARS);
    }

    #[test]
    fn partial_file_fills_in_missing_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_future_vat": 25.0, "projects_dir": "/srv/vat" }"#).unwrap();

        let config = VatConfig::load(&path).unwrap();
        assert_eq!(config.default_current_vat, DEFAULT_CURRENT_VAT);
        assert_eq!(config.default_future_vat, 25.0);
        assert_eq!(config.projects_dir, PathBuf::from("/srv/vat"));
    }

    #[test]
    fn invalid_rate_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_current_vat": -120.0 }"#).unwrap();
        assert!(matches!(VatConfig::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn save_then_load_preserves_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = VatConfig {
            projects_dir: dir.path().join("projects"),
            default_current_vat: 18.0,
            default_future_vat: 20.0,
            default_projection_years: 3,
        };
        config.save(&path).unwrap();
        assert_eq!(VatConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn project_settings_reject_out_of_range_horizon() {
        assert_eq!(
            ProjectSettings::new(20.0, 22.0, 0),
            Err(ValidationError::InvalidProjectionYears(0))
        );
        assert_eq!(
            ProjectSettings::new(20.0, 22.0, u32::MAX),
            Err(ValidationError::InvalidProjectionYears(u32::MAX))
        );
        assert!(ProjectSettings::new(20.0, 22.0, validation::MAX_PROJECTION_YEARS).is_ok());
        assert_eq!(ProjectSettings::default().projection_years, 5);
    }

    #[test]
    fn huge_horizon_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "default_projection_years": 4294967295 }"#).unwrap();
        assert!(matches!(VatConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
