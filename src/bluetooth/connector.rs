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

//! Paired device lookup and RFCOMM connect.

use bluer::rfcomm::{SocketAddr, Stream};
use bluer::{Adapter, Address};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::link::{RfcommLink, SerialLink};
use crate::error::ConnectionError;

/// Standard SPP UUID.
pub const SPP_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805F9B34FB);

/// Opens streams to paired devices by name.
pub trait DeviceConnector: Send + Sync {
    type Link: SerialLink + 'static;

    fn paired_device_names(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, ConnectionError>> + Send;

    /// Connect to the paired device called `name`, giving up after
    /// `connect_timeout`.
    fn open(
        &self,
        name: &str,
        connect_timeout: Duration,
    ) -> impl Future<Output = Result<Self::Link, ConnectionError>> + Send;
}

/// A paired Bluetooth device.
#[derive(Debug, Clone)]
pub struct PairedDevice {
    pub address: Address,
    pub name: String,
}

/// Lookup and socket settings for [`BluetoothConnector`].
#[derive(Debug, Clone)]
pub struct ConnectorSettings {
    pub rfcomm_channel: u8,
    pub lookup_attempts: u32,
    pub lookup_retry_delay: Duration,
}

impl Default for ConnectorSettings {
    fn default() -> Self {
        Self {
            rfcomm_channel: 1,
            lookup_attempts: 3,
            lookup_retry_delay: Duration::from_millis(500),
        }
    }
}

/// BlueZ backed connector.
pub struct BluetoothConnector {
    adapter: Adapter,
    settings: ConnectorSettings,
}

impl BluetoothConnector {
    pub async fn new(settings: ConnectorSettings) -> Result<Self, ConnectionError> {
        let session = bluer::Session::new().await?;
        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self { adapter, settings })
    }

    /// Get paired devices.
    pub async fn paired_devices(&self) -> Result<Vec<PairedDevice>, ConnectionError> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(PairedDevice {
                    address: addr,
                    name,
                });
            }
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    async fn find_device(&self, name: &str) -> Result<PairedDevice, ConnectionError> {
        let attempts = self.settings.lookup_attempts.max(1);

        for attempt in 1..=attempts {
            let devices = self.paired_devices().await?;
            if let Some(device) = devices.into_iter().find(|d| d.name == name) {
                return Ok(device);
            }
            debug!("Device '{}' not found (attempt {}/{})", name, attempt, attempts);
            if attempt < attempts {
                tokio::time::sleep(self.settings.lookup_retry_delay).await;
            }
        }

        Err(ConnectionError::DeviceNotFound {
            name: name.to_string(),
            attempts,
        })
    }

    async fn warn_if_not_spp(&self, device: &PairedDevice) {
        let uuids = match self.adapter.device(device.address) {
            Ok(d) => d.uuids().await.ok().flatten(),
            Err(_) => None,
        };
        match uuids {
            Some(uuids) if uuids.contains(&SPP_UUID) => {}
            _ => warn!(
                "Device '{}' does not advertise SPP ({}), connecting anyway",
                device.name, SPP_UUID
            ),
        }
    }
}

impl DeviceConnector for BluetoothConnector {
    type Link = RfcommLink;

    async fn paired_device_names(&self) -> Result<Vec<String>, ConnectionError> {
        Ok(self
            .paired_devices()
            .await?
            .into_iter()
            .map(|d| d.name)
            .collect())
    }

    async fn open(&self, name: &str, connect_timeout: Duration) -> Result<RfcommLink, ConnectionError> {
        if name.trim().is_empty() {
            return Err(ConnectionError::NoDeviceSelected);
        }

        let device = self.find_device(name).await?;
        self.warn_if_not_spp(&device).await;

        let target = SocketAddr::new(device.address, self.settings.rfcomm_channel);
        info!(
            "Connecting to {} ({}) on RFCOMM channel {}",
            device.name, device.address, self.settings.rfcomm_channel
        );

        match tokio::time::timeout(connect_timeout, Stream::connect(target)).await {
            Ok(Ok(stream)) => {
                info!("Connected to {}", device.name);
                Ok(RfcommLink::new(stream))
            }
            Ok(Err(e)) => Err(ConnectionError::Io(e)),
            Err(_) => Err(ConnectionError::Timeout {
                name: device.name,
                timeout: connect_timeout,
            }),
        }
    }
}
