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

//! Bluetooth communication module.
//!
//! Connects to the scale over an RFCOMM serial link and decodes its byte
//! stream into readings.

#[cfg(feature = "bluez")]
mod bluez;
mod connection;
mod connector;
mod decoder;
mod manager;
mod signal;
mod transport;

#[cfg(feature = "bluez")]
pub use bluez::{BluezConnector, DEFAULT_RFCOMM_CHANNEL};
pub use connection::{StreamListener, StreamWorker, DEFAULT_READ_TIMEOUT};
pub use connector::{ConnectListener, ConnectWorker};
pub use decoder::{FrameDecoder, FRAME_END, FRAME_START};
pub use manager::{ConnectionManager, WorkerLink};
pub use transport::{BoxedTransport, ConnectionTarget, Connector, Transport};
