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

//! Reader for an established scale connection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use super::decoder::FrameDecoder;
use super::signal::CloseSignal;
use super::transport::BoxedTransport;
use crate::error::{Result, ScaleError};
use crate::readings::Reading;

/// Default bounded wait for a single byte.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Receives what a stream worker reads.
pub trait StreamListener: Send + Sync + 'static {
    fn on_reading(&self, reading: Reading);
    fn on_connection_lost(&self);
}

/// Flags shared between the handle and the read task.
#[derive(Default)]
struct Control {
    /// Loop exits before its next read.
    stop: AtomicBool,
    /// Teardown was requested by the owner, not detected by the reader.
    closing: AtomicBool,
    /// At least one byte has been read.
    has_read: AtomicBool,
    close: CloseSignal,
}

/// Handle to the task reading one transport.
pub struct StreamWorker {
    id: u64,
    control: Arc<Control>,
}

impl StreamWorker {
    /// Start reading `transport` on `runtime`.
    pub fn spawn<L: StreamListener>(
        id: u64,
        transport: BoxedTransport,
        read_timeout: Duration,
        listener: L,
        runtime: &Handle,
    ) -> Self {
        let control = Arc::new(Control::default());
        let task_control = control.clone();

        runtime.spawn(async move {
            Self::run(id, transport, read_timeout, listener, task_control).await;
        });

        Self { id, control }
    }

    async fn run<L: StreamListener>(
        id: u64,
        mut transport: BoxedTransport,
        read_timeout: Duration,
        listener: L,
        control: Arc<Control>,
    ) {
        info!("Stream worker {} started", id);
        let mut decoder = FrameDecoder::new();

        let failure = loop {
            if control.stop.load(Ordering::SeqCst) {
                break None;
            }

            let read = tokio::select! {
                biased;
                _ = control.close.closed() => break None,
                read = read_byte(&mut transport, read_timeout) => read,
            };

            match read {
                Ok(byte) => {
                    control.has_read.store(true, Ordering::SeqCst);
                    if let Some(reading) = decoder.feed(byte) {
                        debug!("Reading: {}", reading);
                        listener.on_reading(reading);
                    }
                }
                Err(e) => {
                    control.stop.store(true, Ordering::SeqCst);
                    break Some(e);
                }
            }
        };

        // Dropping the transport closes the socket.
        drop(transport);

        match failure {
            Some(e) if !control.closing.load(Ordering::SeqCst) => {
                if e.is_end_of_stream() {
                    info!("Stream worker {}: connection closed by remote", id);
                } else {
                    warn!("Stream worker {}: {}", id, e);
                }
                listener.on_connection_lost();
            }
            Some(e) => debug!("Stream worker {} ended during teardown: {}", id, e),
            None => debug!("Stream worker {} shut down", id),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Ask the loop to exit after its current read.
    ///
    /// The transport is closed right away only once data has flowed on it.
    pub fn request_shutdown(&self) {
        debug!("Shutdown requested for stream worker {}", self.id);
        self.control.closing.store(true, Ordering::SeqCst);
        self.control.stop.store(true, Ordering::SeqCst);
        if self.control.has_read.load(Ordering::SeqCst) {
            self.control.close.close();
        }
    }

    /// Close the transport, unblocking any pending read.
    pub fn cancel(&self) {
        debug!("Cancelling stream worker {}", self.id);
        self.control.closing.store(true, Ordering::SeqCst);
        self.control.close.close();
    }

    /// Outbound write path.
    ///
    /// The scale protocol defines no commands, so the payload is dropped.
    pub fn write(&self, bytes: &[u8]) {
        debug!(
            "Stream worker {}: write of {} bytes ignored, no transmit path",
            self.id,
            bytes.len()
        );
    }
}

/// Read one byte, failing if none arrives within `read_timeout`.
async fn read_byte(transport: &mut BoxedTransport, read_timeout: Duration) -> Result<u8> {
    match tokio::time::timeout(read_timeout, transport.read_u8()).await {
        Ok(byte) => Ok(byte?),
        Err(_) => Err(ScaleError::ReadTimeout(read_timeout)),
    }
}
