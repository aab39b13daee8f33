//! Persisted analyzer and display settings.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use oledwave_decode::settings::{ADDRESS_FILTER_SETTING, I2C_ADDRESS_SETTING};
use oledwave_decode::{AddressPolicy, DeviceAddress, ResultFormat};
use serde::{Deserialize, Serialize};

use crate::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Display controller address
    #[serde(default)]
    pub i2c_address: DeviceAddress,
    /// Whether traffic to other devices is dropped
    #[serde(default)]
    pub address_policy: AddressPolicy,
    /// Decoded transactions kept in history
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default)]
    pub show_timestamp: bool,
    #[serde(default)]
    pub show_hex: bool,
    /// Label template for each decoded transaction
    #[serde(default = "default_result_format")]
    pub result_format: String,
}

fn default_history_size() -> usize {
    10_000
}

fn default_result_format() -> String {
    ResultFormat::default().format
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            i2c_address: DeviceAddress::default(),
            address_policy: AddressPolicy::default(),
            history_size: default_history_size(),
            show_timestamp: false,
            show_hex: false,
            result_format: default_result_format(),
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("oledwave"))
    }

    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Load from the platform config directory, or defaults if nothing is saved.
    pub fn load() -> Result<Self, CoreError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("no saved configuration, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, CoreError> {
        let text = fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        debug!("loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, CoreError> {
        let path = Self::config_path().ok_or(CoreError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("saved configuration to {}", path.display());
        Ok(())
    }

    /// Settings in the form the analyzer reads them.
    pub fn analyzer_settings(&self) -> BTreeMap<String, String> {
        let filter = match self.address_policy {
            AddressPolicy::Record => "off",
            AddressPolicy::Filter => "on",
        };
        BTreeMap::from([
            (
                I2C_ADDRESS_SETTING.to_string(),
                self.i2c_address.choice().to_string(),
            ),
            (ADDRESS_FILTER_SETTING.to_string(), filter.to_string()),
        ])
    }

    pub fn result_format(&self) -> ResultFormat {
        ResultFormat::new(self.result_format.clone())
    }
}
