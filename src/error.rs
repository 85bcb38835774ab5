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

//! Error types for the scale connection core.

use std::time::Duration;
use thiserror::Error;

/// Result type alias.
pub type Result<T> = std::result::Result<T, ScaleError>;

/// Errors raised inside the connection core.
///
/// None of these cross the manager's control surface; workers translate
/// them into lifecycle events.
#[derive(Error, Debug)]
pub enum ScaleError {
    /// Outbound attempt could not establish a transport.
    #[error("Failed to connect to {device}: {reason}")]
    ConnectFailed { device: String, reason: String },

    /// No byte arrived within the bounded wait.
    #[error("No data received within {0:?}")]
    ReadTimeout(Duration),

    /// I/O error or end of stream while reading.
    #[error("Stream failure: {0}")]
    Stream(#[from] std::io::Error),

    /// Device identifier could not be parsed by the platform adapter.
    #[error("Invalid device address: {0}")]
    InvalidAddress(String),

    /// The manager was created outside a tokio runtime.
    #[error("No tokio runtime available")]
    NoRuntime,

    #[cfg(feature = "bluez")]
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] bluer::Error),
}

impl ScaleError {
    /// Whether this failure is the remote end closing the stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ScaleError::Stream(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}
