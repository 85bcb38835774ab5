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

//! Outbound connection attempt.

use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::signal::CloseSignal;
use super::transport::{BoxedTransport, ConnectionTarget, Connector};

/// Receives the outcome of a connect attempt.
pub trait ConnectListener: Send + Sync + 'static {
    fn on_connected(&self, transport: BoxedTransport, target: ConnectionTarget);
    fn on_connect_failed(&self);
}

/// Handle to one in-flight connect attempt.
///
/// The attempt runs on its own task. Cancelling drops the pending connect,
/// which closes whatever socket the platform had opened; a cancelled attempt
/// reports nothing.
pub struct ConnectWorker {
    id: u64,
    target: ConnectionTarget,
    close: CloseSignal,
}

impl ConnectWorker {
    /// Start connecting to `target` on `runtime`.
    pub fn spawn<L: ConnectListener>(
        id: u64,
        target: ConnectionTarget,
        connector: Arc<dyn Connector>,
        listener: L,
        runtime: &Handle,
    ) -> Self {
        let close = CloseSignal::new();
        let task_close = close.clone();
        let task_target = target.clone();

        runtime.spawn(async move {
            Self::run(id, task_target, connector, listener, task_close).await;
        });

        Self { id, target, close }
    }

    async fn run<L: ConnectListener>(
        id: u64,
        target: ConnectionTarget,
        connector: Arc<dyn Connector>,
        listener: L,
        close: CloseSignal,
    ) {
        debug!("Connect worker {} started for {}", id, target);

        let attempt = async {
            // Discovery scanning slows the connect down, stop it first.
            if let Err(e) = connector.cancel_ongoing_discovery().await {
                warn!("Could not cancel discovery: {}", e);
            }
            connector.connect(&target).await
        };

        tokio::select! {
            biased;
            _ = close.closed() => {
                debug!("Connect worker {} cancelled", id);
            }
            result = attempt => match result {
                Ok(transport) => {
                    info!("Connected to {}", target);
                    listener.on_connected(transport, target.clone());
                }
                Err(e) => {
                    warn!("Connection to {} failed: {}", target, e);
                    listener.on_connect_failed();
                }
            }
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &ConnectionTarget {
        &self.target
    }

    /// Abort the attempt. Safe to call after it has completed.
    pub fn cancel(&self) {
        debug!("Cancelling connect worker {}", self.id);
        self.close.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ScaleError};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Connected(String),
        Failed,
    }

    #[derive(Clone)]
    struct Recorder(mpsc::UnboundedSender<Outcome>);

    impl ConnectListener for Recorder {
        fn on_connected(&self, _transport: BoxedTransport, target: ConnectionTarget) {
            let _ = self.0.send(Outcome::Connected(target.name));
        }

        fn on_connect_failed(&self) {
            let _ = self.0.send(Outcome::Failed);
        }
    }

    struct FixedConnector {
        succeed: bool,
        delay: Duration,
        discovery_cancels: AtomicUsize,
        dropped: Mutex<Option<tokio::io::DuplexStream>>,
    }

    impl FixedConnector {
        fn new(succeed: bool, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                succeed,
                delay,
                discovery_cancels: AtomicUsize::new(0),
                dropped: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Connector for FixedConnector {
        async fn cancel_ongoing_discovery(&self) -> Result<()> {
            self.discovery_cancels.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn connect(&self, target: &ConnectionTarget) -> Result<BoxedTransport> {
            tokio::time::sleep(self.delay).await;
            if self.succeed {
                let (client, device) = tokio::io::duplex(16);
                *self.dropped.lock() = Some(device);
                Ok(Box::new(client))
            } else {
                Err(ScaleError::ConnectFailed {
                    device: target.name.clone(),
                    reason: "refused".to_string(),
                })
            }
        }
    }

    fn target() -> ConnectionTarget {
        ConnectionTarget::new("00:11:22:33:44:55", "Scale")
    }

    #[tokio::test]
    async fn test_success_reports_connected() {
        let connector = FixedConnector::new(true, Duration::ZERO);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = ConnectWorker::spawn(
            1,
            target(),
            connector.clone(),
            Recorder(tx),
            &Handle::current(),
        );

        let outcome = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(outcome, Some(Outcome::Connected("Scale".to_string())));
        assert_eq!(connector.discovery_cancels.load(Ordering::SeqCst), 1);

        // Cancelling a finished worker is a no-op.
        worker.cancel();
    }

    #[tokio::test]
    async fn test_failure_reports_failed() {
        let connector = FixedConnector::new(false, Duration::ZERO);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _worker = ConnectWorker::spawn(1, target(), connector, Recorder(tx), &Handle::current());

        let outcome = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(outcome, Some(Outcome::Failed));
    }

    #[tokio::test]
    async fn test_cancel_suppresses_outcome() {
        let connector = FixedConnector::new(true, Duration::from_millis(200));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = ConnectWorker::spawn(7, target(), connector, Recorder(tx), &Handle::current());
        assert_eq!(worker.id(), 7);
        assert_eq!(worker.target().name, "Scale");

        worker.cancel();
        drop(worker);

        // The task exits without reporting, dropping the listener and closing the channel.
        let outcome = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(outcome, None);
    }
}
