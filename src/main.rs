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

//! Bluetooth scale reader.
//!
//! Usage: `btscale [ADDRESS [NAME]]`. Without arguments the device from the
//! config file is used.

use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use btscale::bluetooth::{BluezConnector, ConnectionManager, ConnectionTarget};
use btscale::config::Config;
use btscale::{ConnectionEvent, Reading, ReadingHistory};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("btscale=info".parse()?),
        )
        .init();

    info!("Starting btscale v{}...", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = Config::load()?;
    info!("Configuration loaded");

    let connector = BluezConnector::new(config.bluetooth.rfcomm_channel).await?;
    let target = resolve_target(&config, &connector).await?;

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<ConnectionEvent>();
    let manager = ConnectionManager::new(Arc::new(connector), event_tx)?
        .with_read_timeout(config.bluetooth.read_timeout());
    let mut history = ReadingHistory::new(config.history.capacity);

    manager.connect(target.clone());

    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                match event {
                    ConnectionEvent::Connecting { device_name } => {
                        info!("Connecting to {}...", device_name);
                    }
                    ConnectionEvent::Connected { device_name } => {
                        info!("Connected to {}", device_name);
                    }
                    ConnectionEvent::LineRead(text) => match text.parse::<Reading>() {
                        Ok(reading) => {
                            history.push(reading);
                            info!("Reading: {} ({})", reading, reading.zone().as_str());
                        }
                        Err(e) => warn!("Unparseable reading '{}': {}", text, e),
                    },
                    failure @ (ConnectionEvent::ConnectionFailed | ConnectionEvent::ConnectionLost) => {
                        error!("{:?} for {}", failure, target);
                        if !config.bluetooth.auto_reconnect {
                            break;
                        }
                        tokio::time::sleep(config.bluetooth.reconnect_delay()).await;
                        manager.connect(target.clone());
                    }
                    ConnectionEvent::NotConnected => {
                        info!("Not connected");
                    }
                    ConnectionEvent::BytesWritten(bytes) => {
                        info!("Wrote {} bytes", bytes.len());
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    manager.stop();

    match (history.min(), history.max()) {
        (Some(min), Some(max)) => info!(
            "{} readings, min {}, max {}, last {}",
            history.len(),
            min,
            max,
            history.latest()
        ),
        _ => info!("No readings received"),
    }

    info!("btscale stopped");
    Ok(())
}

/// Pick the scale from the command line or config, filling in the name of a
/// paired device when only an address is given.
async fn resolve_target(config: &Config, connector: &BluezConnector) -> Result<ConnectionTarget> {
    let mut args = std::env::args().skip(1);

    let (address, name) = match (args.next(), args.next()) {
        (Some(address), name) => (address, name),
        (None, _) => match &config.bluetooth.device {
            Some(device) => return Ok(ConnectionTarget::from(device)),
            None => bail!(
                "No scale configured. Pass an address or set [bluetooth.device] in {}",
                Config::default_path().display()
            ),
        },
    };

    if let Some(name) = name {
        return Ok(ConnectionTarget::new(address, name));
    }

    let paired = connector.paired_devices().await?;
    let target = paired
        .into_iter()
        .find(|d| d.address.eq_ignore_ascii_case(&address))
        .unwrap_or_else(|| ConnectionTarget::new(address.clone(), address));
    Ok(target)
}
