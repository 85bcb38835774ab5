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

//! BlueZ RFCOMM client.

use async_trait::async_trait;
use bluer::rfcomm::{SocketAddr, Stream};
use bluer::Address;
use tracing::{debug, info, warn};

use super::transport::{BoxedTransport, ConnectionTarget, Connector};
use crate::error::{Result, ScaleError};

/// RFCOMM channel the scale's serial service listens on.
pub const DEFAULT_RFCOMM_CHANNEL: u8 = 1;

/// Opens RFCOMM streams through the default BlueZ adapter.
pub struct BluezConnector {
    adapter: bluer::Adapter,
    channel: u8,
}

impl BluezConnector {
    /// Open a BlueZ session and power on the default adapter.
    pub async fn new(channel: u8) -> Result<Self> {
        let session = bluer::Session::new().await?;
        debug!("BlueZ session created");

        let adapter = session.default_adapter().await?;
        info!("Using Bluetooth adapter: {}", adapter.name());

        if !adapter.is_powered().await? {
            info!("Powering on Bluetooth adapter...");
            adapter.set_powered(true).await?;
        }

        Ok(Self { adapter, channel })
    }

    /// Paired devices, as connection targets.
    pub async fn paired_devices(&self) -> Result<Vec<ConnectionTarget>> {
        let mut devices = Vec::new();

        for addr in self.adapter.device_addresses().await? {
            let device = self.adapter.device(addr)?;
            if device.is_paired().await? {
                let name = device.alias().await.unwrap_or_else(|_| addr.to_string());
                devices.push(ConnectionTarget::new(addr.to_string(), name));
            }
        }

        Ok(devices)
    }

    fn parse_address(target: &ConnectionTarget) -> Result<Address> {
        target
            .address
            .parse::<Address>()
            .map_err(|_| ScaleError::InvalidAddress(target.address.clone()))
    }
}

#[async_trait]
impl Connector for BluezConnector {
    async fn cancel_ongoing_discovery(&self) -> Result<()> {
        // BlueZ only lets the session that started discovery stop it.
        if self.adapter.is_discovering().await? {
            warn!("Adapter is discovering, connection may be slow");
        }
        Ok(())
    }

    async fn connect(&self, target: &ConnectionTarget) -> Result<BoxedTransport> {
        let address = Self::parse_address(target)?;
        info!(
            "Opening RFCOMM stream to {} on channel {}",
            target, self.channel
        );

        let stream = Stream::connect(SocketAddr::new(address, self.channel))
            .await
            .map_err(|e| ScaleError::ConnectFailed {
                device: target.name.clone(),
                reason: e.to_string(),
            })?;

        Ok(Box::new(stream))
    }
}
