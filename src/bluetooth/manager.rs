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

//! Connection manager: owns the connection state and its workers.
//!
//! All transitions happen under one lock. Workers report back through a
//! [`WorkerLink`] tagged with their id; reports from a worker the manager no
//! longer owns are dropped, so a superseded attempt can never move state.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::connection::{StreamListener, StreamWorker, DEFAULT_READ_TIMEOUT};
use super::connector::{ConnectListener, ConnectWorker};
use super::transport::{BoxedTransport, ConnectionTarget, Connector};
use crate::error::{Result, ScaleError};
use crate::events::{ConnectionEvent, EventSink};
use crate::readings::Reading;
use crate::state::ConnectionState;

/// Guarded state.
struct Inner {
    state: ConnectionState,
    connect_worker: Option<ConnectWorker>,
    stream_worker: Option<Arc<StreamWorker>>,
    next_worker_id: u64,
    read_timeout: Duration,
}

impl Inner {
    fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            connect_worker: None,
            stream_worker: None,
            next_worker_id: 0,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_worker_id += 1;
        self.next_worker_id
    }

    fn set_state(&mut self, state: ConnectionState) {
        debug!("State {} -> {}", self.state, state);
        self.state = state;
    }

    fn owns_connect_worker(&self, id: u64) -> bool {
        self.connect_worker.as_ref().map(|w| w.id()) == Some(id)
    }

    fn owns_stream_worker(&self, id: u64) -> bool {
        self.stream_worker.as_ref().map(|w| w.id()) == Some(id)
    }
}

struct Shared {
    inner: Mutex<Inner>,
    connector: Arc<dyn Connector>,
    sink: Box<dyn EventSink>,
    runtime: Handle,
}

/// Manages the single logical connection to a scale.
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    /// Create a manager bound to the current tokio runtime.
    pub fn new(connector: Arc<dyn Connector>, sink: impl EventSink) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| ScaleError::NoRuntime)?;
        Ok(Self::with_runtime(connector, sink, runtime))
    }

    /// Create a manager whose workers run on `runtime`.
    pub fn with_runtime(connector: Arc<dyn Connector>, sink: impl EventSink, runtime: Handle) -> Self {
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new()),
                connector,
                sink: Box::new(sink),
                runtime,
            }),
        }
    }

    /// Set the bounded wait for each byte read.
    ///
    /// Applies to stream workers started after the call.
    pub fn with_read_timeout(self, read_timeout: Duration) -> Self {
        self.shared.inner.lock().read_timeout = read_timeout;
        self
    }

    pub fn read_timeout(&self) -> Duration {
        self.shared.inner.lock().read_timeout
    }

    /// Start connecting to `target`, superseding any current worker.
    pub fn connect(&self, target: ConnectionTarget) {
        info!("Connect to: {}", target);
        let mut inner = self.shared.inner.lock();

        if let Some(worker) = inner.connect_worker.take() {
            worker.cancel();
        }
        if let Some(worker) = inner.stream_worker.take() {
            worker.cancel();
        }

        let id = inner.next_id();
        let device_name = target.name.clone();
        let worker = ConnectWorker::spawn(
            id,
            target,
            self.shared.connector.clone(),
            WorkerLink::new(&self.shared, id),
            &self.shared.runtime,
        );
        inner.connect_worker = Some(worker);

        inner.set_state(ConnectionState::Connecting);
        self.shared
            .sink
            .emit(ConnectionEvent::Connecting { device_name });
    }

    /// Tear down all workers and return to `Disconnected`.
    ///
    /// Does nothing when already idle.
    pub fn stop(&self) {
        let mut inner = self.shared.inner.lock();

        if inner.state == ConnectionState::Disconnected
            && inner.connect_worker.is_none()
            && inner.stream_worker.is_none()
        {
            debug!("Stop while idle ignored");
            return;
        }
        info!("Stop");

        if let Some(worker) = inner.connect_worker.take() {
            worker.cancel();
        }
        if let Some(worker) = inner.stream_worker.take() {
            worker.request_shutdown();
            worker.cancel();
        }

        inner.set_state(ConnectionState::Disconnected);
        self.shared.sink.emit(ConnectionEvent::NotConnected);
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.inner.lock().state
    }

    /// Send `bytes` to the scale. No-op unless connected.
    pub fn write(&self, bytes: &[u8]) {
        let worker = {
            let inner = self.shared.inner.lock();
            if inner.state != ConnectionState::Connected {
                return;
            }
            match &inner.stream_worker {
                Some(worker) => worker.clone(),
                None => return,
            }
        };
        // Outside the lock so a slow write never blocks transitions.
        worker.write(bytes);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        let mut inner = self.shared.inner.lock();
        if let Some(worker) = inner.connect_worker.take() {
            worker.cancel();
        }
        if let Some(worker) = inner.stream_worker.take() {
            worker.cancel();
        }
    }
}

impl Shared {
    fn on_connected(self: &Arc<Self>, id: u64, transport: BoxedTransport, target: ConnectionTarget) {
        let mut inner = self.inner.lock();
        if !inner.owns_connect_worker(id) {
            debug!("Dropping transport from superseded connect worker {}", id);
            return;
        }
        // Already finished, so cancelling is a no-op.
        if let Some(worker) = inner.connect_worker.take() {
            worker.cancel();
        }
        if let Some(worker) = inner.stream_worker.take() {
            worker.cancel();
        }

        let stream_id = inner.next_id();
        let worker = StreamWorker::spawn(
            stream_id,
            transport,
            inner.read_timeout,
            WorkerLink::new(self, stream_id),
            &self.runtime,
        );
        inner.stream_worker = Some(Arc::new(worker));

        inner.set_state(ConnectionState::Connected);
        self.sink.emit(ConnectionEvent::Connected {
            device_name: target.name,
        });
    }

    fn on_connect_failed(&self, id: u64) {
        let mut inner = self.inner.lock();
        if !inner.owns_connect_worker(id) {
            debug!("Ignoring failure from superseded connect worker {}", id);
            return;
        }
        inner.connect_worker = None;
        inner.set_state(ConnectionState::Disconnected);
        self.sink.emit(ConnectionEvent::ConnectionFailed);
    }

    fn on_reading(&self, id: u64, reading: Reading) {
        let inner = self.inner.lock();
        if !inner.owns_stream_worker(id) {
            return;
        }
        self.sink.emit(ConnectionEvent::LineRead(reading.to_string()));
    }

    fn on_connection_lost(&self, id: u64) {
        let mut inner = self.inner.lock();
        if !inner.owns_stream_worker(id) {
            debug!("Ignoring loss from superseded stream worker {}", id);
            return;
        }
        inner.stream_worker = None;
        inner.set_state(ConnectionState::Disconnected);
        self.sink.emit(ConnectionEvent::ConnectionLost);
    }
}

/// Narrow path from a worker back to its manager.
///
/// Holds a weak reference so a dropped manager does not outlive its workers.
pub struct WorkerLink {
    shared: Weak<Shared>,
    id: u64,
}

impl WorkerLink {
    fn new(shared: &Arc<Shared>, id: u64) -> Self {
        Self {
            shared: Arc::downgrade(shared),
            id,
        }
    }
}

impl ConnectListener for WorkerLink {
    fn on_connected(&self, transport: BoxedTransport, target: ConnectionTarget) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_connected(self.id, transport, target);
        }
    }

    fn on_connect_failed(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_connect_failed(self.id);
        }
    }
}

impl StreamListener for WorkerLink {
    fn on_reading(&self, reading: Reading) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_reading(self.id, reading);
        }
    }

    fn on_connection_lost(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.on_connection_lost(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    /// Connector whose attempts never complete on their own.
    struct PendingConnector;

    #[async_trait]
    impl Connector for PendingConnector {
        async fn cancel_ongoing_discovery(&self) -> Result<()> {
            Ok(())
        }

        async fn connect(&self, _target: &ConnectionTarget) -> Result<BoxedTransport> {
            std::future::pending().await
        }
    }

    fn manager() -> (ConnectionManager, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let manager = ConnectionManager::new(Arc::new(PendingConnector), tx).unwrap();
        (manager, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ConnectionEvent>) -> Vec<ConnectionEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = ConnectionManager::new(Arc::new(PendingConnector), tx);
        assert!(matches!(result, Err(ScaleError::NoRuntime)));
    }

    #[tokio::test]
    async fn test_with_read_timeout() {
        let (manager, _rx) = manager();
        assert_eq!(manager.read_timeout(), DEFAULT_READ_TIMEOUT);
        let manager = manager.with_read_timeout(Duration::from_millis(250));
        assert_eq!(manager.read_timeout(), Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_stale_connect_success_is_ignored() {
        let (manager, mut rx) = manager();
        manager.connect(ConnectionTarget::new("A", "Scale A"));
        manager.connect(ConnectionTarget::new("B", "Scale B"));

        // Worker 1 (for A) was superseded by worker 2 (for B).
        let (client, mut device) = tokio::io::duplex(8);
        manager
            .shared
            .on_connected(1, Box::new(client), ConnectionTarget::new("A", "Scale A"));
        manager.shared.on_connect_failed(1);

        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(
            drain(&mut rx),
            vec![
                ConnectionEvent::Connecting {
                    device_name: "Scale A".to_string()
                },
                ConnectionEvent::Connecting {
                    device_name: "Scale B".to_string()
                },
            ]
        );

        // The stale transport was closed.
        use tokio::io::AsyncReadExt;
        let mut buf = [0u8; 1];
        assert_eq!(device.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_stream_reports_are_ignored() {
        let (manager, mut rx) = manager();
        manager.connect(ConnectionTarget::new("A", "Scale A"));

        let (client, _device) = tokio::io::duplex(8);
        manager
            .shared
            .on_connected(1, Box::new(client), ConnectionTarget::new("A", "Scale A"));
        assert_eq!(manager.state(), ConnectionState::Connected);

        // Stream worker 2 is current; id 99 is not.
        manager.shared.on_reading(99, Reading::new(5));
        manager.shared.on_connection_lost(99);
        manager.shared.on_reading(2, Reading::new(6));

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(
            drain(&mut rx),
            vec![
                ConnectionEvent::Connecting {
                    device_name: "Scale A".to_string()
                },
                ConnectionEvent::Connected {
                    device_name: "Scale A".to_string()
                },
                ConnectionEvent::LineRead("6".to_string()),
            ]
        );

        manager.shared.on_connection_lost(2);
        manager.shared.on_connection_lost(2);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert_eq!(drain(&mut rx), vec![ConnectionEvent::ConnectionLost]);
    }

    #[tokio::test]
    async fn test_stop_cancels_pending_connect() {
        let (manager, mut rx) = manager();
        manager.connect(ConnectionTarget::new("A", "Scale A"));
        manager.stop();
        manager.stop();

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        let events = drain(&mut rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], ConnectionEvent::NotConnected);
    }
}
