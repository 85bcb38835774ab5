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

//! Transport abstraction required from the platform.

use async_trait::async_trait;
use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// An open bidirectional byte channel to the scale.
///
/// Dropping the transport closes it, which is how workers cancel.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

/// Owned, type-erased transport.
pub type BoxedTransport = Box<dyn Transport>;

/// Device to connect to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionTarget {
    /// Platform device identifier (a Bluetooth address for BlueZ).
    pub address: String,
    /// Human-readable device name.
    pub name: String,
}

impl ConnectionTarget {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.address)
    }
}

/// Platform adapter that opens transports.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Stop any device discovery that would slow down a connect attempt.
    async fn cancel_ongoing_discovery(&self) -> Result<()>;

    /// Open a transport to `target`. Blocks until connected or failed.
    ///
    /// Dropping the returned future aborts the attempt.
    async fn connect(&self, target: &ConnectionTarget) -> Result<BoxedTransport>;
}
