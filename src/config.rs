// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration module.
//!
//! Handles loading and saving application settings, including the
//! selected timer and the write pacing preference.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bluetooth::{ConnectorSettings, ProtocolTimings, WritePacing, DEFAULT_WRITE_DELAY_MS};

const APP_DIR: &str = "pt-timer";

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for saved records.
    #[serde(skip)]
    pub data_dir: PathBuf,

    /// Bluetooth settings.
    pub bluetooth: BluetoothConfig,

    /// Write settings.
    pub transfer: TransferConfig,

    /// Protocol timing budgets.
    pub protocol: ProtocolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BluetoothConfig {
    /// Name of the paired timer to talk to.
    pub selected_device: String,

    /// RFCOMM channel of the SPP service.
    pub rfcomm_channel: u8,

    pub connect_timeout_ms: u64,

    /// Paired device lookups before giving up.
    pub lookup_attempts: u32,

    pub lookup_retry_delay_ms: u64,
}

impl Default for BluetoothConfig {
    fn default() -> Self {
        Self {
            selected_device: String::new(),
            rfcomm_channel: 1,
            connect_timeout_ms: 10_000,
            lookup_attempts: 3,
            lookup_retry_delay_ms: 500,
        }
    }
}

impl BluetoothConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn connector_settings(&self) -> ConnectorSettings {
        ConnectorSettings {
            rfcomm_channel: self.rfcomm_channel,
            lookup_attempts: self.lookup_attempts,
            lookup_retry_delay: Duration::from_millis(self.lookup_retry_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Delay after each written byte in milliseconds.
    pub write_delay_ms: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            write_delay_ms: DEFAULT_WRITE_DELAY_MS,
        }
    }
}

impl TransferConfig {
    pub fn pacing(&self) -> WritePacing {
        WritePacing::from_millis(self.write_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub poll_interval_ms: u64,
    pub poll_attempts: u32,
    pub settle_delay_ms: u64,
    pub verify_interval_ms: u64,
    pub verify_attempts: u32,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        let timings = ProtocolTimings::default();
        Self {
            poll_interval_ms: timings.poll_interval.as_millis() as u64,
            poll_attempts: timings.poll_attempts,
            settle_delay_ms: timings.settle_delay.as_millis() as u64,
            verify_interval_ms: timings.verify_interval.as_millis() as u64,
            verify_attempts: timings.verify_attempts,
        }
    }
}

impl ProtocolConfig {
    pub fn timings(&self) -> ProtocolTimings {
        ProtocolTimings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            poll_attempts: self.poll_attempts,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            verify_interval: Duration::from_millis(self.verify_interval_ms),
            verify_attempts: self.verify_attempts,
        }
    }
}

impl Config {
    /// Load configuration from file or create default.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;

        // Set data directory
        config.data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR);
        std::fs::create_dir_all(&config.data_dir)?;

        Ok(config)
    }

    /// Load from `path`, writing defaults there if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Directory holding saved record documents.
    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_creates_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pt-timer").join("config.toml");

        let config = Config::load_from(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.transfer.write_delay_ms, 100);
        assert_eq!(config.protocol.timings(), ProtocolTimings::default());
        assert!(config.bluetooth.selected_device.is_empty());
    }

    #[test]
    fn test_preferences_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.bluetooth.selected_device = "PT-Timer 07".to_string();
        config.transfer.write_delay_ms = 250;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.bluetooth.selected_device, "PT-Timer 07");
        assert_eq!(loaded.transfer.pacing(), WritePacing::from_millis(250));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transfer]\nwrite_delay_ms = 40\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.transfer.write_delay_ms, 40);
        assert_eq!(config.bluetooth.rfcomm_channel, 1);
        assert_eq!(config.bluetooth.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.protocol.poll_attempts, 100);
    }
}
