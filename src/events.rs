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

//! Events delivered to the consumer of a connection manager.

use tokio::sync::mpsc;
use tracing::debug;

/// Events emitted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Manager was stopped; no connection.
    NotConnected,
    /// Outbound connection attempt started.
    Connecting { device_name: String },
    /// Connection established, readings will follow.
    Connected { device_name: String },
    /// Outbound connection attempt failed.
    ConnectionFailed,
    /// Established connection dropped or stalled.
    ConnectionLost,
    /// One decoded reading, as decimal text.
    LineRead(String),
    /// Bytes handed to the transport for sending.
    BytesWritten(Vec<u8>),
}

/// Receiver side of the event stream.
///
/// `emit` is called while the manager holds its state lock, so
/// implementations must not block and must not call back into the manager.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: ConnectionEvent);
}

impl EventSink for mpsc::UnboundedSender<ConnectionEvent> {
    fn emit(&self, event: ConnectionEvent) {
        if let Err(e) = self.send(event) {
            debug!("Event receiver dropped, discarding {:?}", e.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbounded_sender_delivers_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.emit(ConnectionEvent::Connecting {
            device_name: "Scale".to_string(),
        });
        tx.emit(ConnectionEvent::LineRead("42".to_string()));

        assert_eq!(
            rx.try_recv().unwrap(),
            ConnectionEvent::Connecting {
                device_name: "Scale".to_string()
            }
        );
        assert_eq!(rx.try_recv().unwrap(), ConnectionEvent::LineRead("42".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.emit(ConnectionEvent::ConnectionLost);
    }
}
