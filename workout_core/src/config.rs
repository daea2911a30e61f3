//! Configuration file support for Lift.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/lift/config.toml`.

use crate::engine::EngineSettings;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub rest: RestConfig,
}

/// Data storage configuration
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

/// Session engine parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Calories reported when a plan declares no estimate
    #[serde(default = "default_calories")]
    pub default_calories: u32,

    /// Weight change per `w+` / `w-` in the CLI
    #[serde(default = "default_weight_step")]
    pub weight_step: f64,

    /// Attempts at the completion write before giving up (at least 2)
    #[serde(default = "default_write_attempts")]
    pub write_attempts: u32,

    #[serde(default = "default_plan")]
    pub default_plan: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_calories: default_calories(),
            weight_step: default_weight_step(),
            write_attempts: default_write_attempts(),
            default_plan: default_plan(),
        }
    }
}

/// Rest timer controls
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_adjust_step_seconds")]
    pub adjust_step_seconds: i64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            adjust_step_seconds: default_adjust_step_seconds(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("lift")
}

fn default_calories() -> u32 {
    300
}

fn default_weight_step() -> f64 {
    2.5
}

fn default_write_attempts() -> u32 {
    2
}

fn default_plan() -> String {
    "full_body_a".into()
}

fn default_adjust_step_seconds() -> i64 {
    15
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("lift").join("config.toml")
    }

    /// Save the current configuration to the default path
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !self.session.weight_step.is_finite() || self.session.weight_step <= 0.0 {
            return Err(Error::Config(format!(
                "session.weight_step must be positive, got {}",
                self.session.weight_step
            )));
        }
        if self.session.write_attempts < 2 {
            return Err(Error::Config("session.write_attempts must be at least 2".into()));
        }
        if self.rest.adjust_step_seconds <= 0 {
            return Err(Error::Config(format!(
                "rest.adjust_step_seconds must be positive, got {}",
                self.rest.adjust_step_seconds
            )));
        }
        Ok(())
    }

    /// Engine parameters derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            default_calories: self.session.default_calories,
            write_attempts: self.session.write_attempts,
        }
    }
}
