//! Configuration file support for hemo.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/hemo/config.toml`.

use crate::{CalcType, Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Settings read from `config.toml`; every section is optional
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub autosave: AutosaveConfig,

    #[serde(default)]
    pub workshop: WorkshopConfig,

    #[serde(default)]
    pub trend: TrendConfig,
}

/// Where studies are stored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

impl DataConfig {
    /// Directory holding one JSON file per study
    pub fn studies_dir(&self) -> PathBuf {
        self.data_dir.join("studies")
    }
}

/// Autosave behaviour
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Quiet period after the last ledger change before saving.
    /// Additional changes reset the timer.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl AutosaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Workshop completion rules
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkshopConfig {
    /// Calculators that must all have results before the workshop can finish
    #[serde(default = "default_required")]
    pub required: Vec<CalcType>,
}

impl Default for WorkshopConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
        }
    }
}

/// Trend classification parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TrendConfig {
    /// First/last differences below this are reported as stable
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("hemo")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_required() -> Vec<CalcType> {
    CalcType::ALL.to_vec()
}

fn default_epsilon() -> f64 {
    1e-6
}

impl Config {
    /// Read `config.toml` from the user config dir, or fall back to defaults
    pub fn load() -> Result<Self> {
        let path = Self::default_config_path();
        if !path.exists() {
            tracing::info!(path = %path.display(), "No hemo config, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Parse and validate a config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let config: Config = toml::from_str(&std::fs::read_to_string(path)?)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            debounce_ms = config.autosave.debounce_ms,
            "Loaded hemo config"
        );
        Ok(config)
    }

    /// `$XDG_CONFIG_HOME/hemo/config.toml`
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("hemo").join("config.toml")
    }

    /// Reject settings the workshop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.autosave.debounce_ms == 0 {
            return Err(Error::Config("autosave.debounce_ms must be positive".into()));
        }
        if self.trend.epsilon.is_nan() || self.trend.epsilon <= 0.0 {
            return Err(Error::Config("trend.epsilon must be positive".into()));
        }
        if self.workshop.required.is_empty() {
            return Err(Error::Config(
                "workshop.required must name at least one calculator".into(),
            ));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Write the config atomically, creating the directory if needed
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let rendered = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot render config: {}", e)))?;
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(rendered.as_bytes())?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::info!(path = %path.display(), "Saved hemo config");
        Ok(())
    }
}
