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

//! One-shot close signal shared between a worker handle and its task.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    closed: AtomicBool,
    notify: Notify,
}

/// Latching signal: once closed, stays closed.
#[derive(Debug, Clone, Default)]
pub(crate) struct CloseSignal {
    inner: Arc<Inner>,
}

impl CloseSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Close the signal and wake every waiter. Idempotent.
    pub(crate) fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Resolve once the signal is closed.
    pub(crate) async fn closed(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent close is not missed.
            notified.as_mut().enable();
            if self.is_closed() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_closed_resolves_after_close() {
        let signal = CloseSignal::new();
        let waiter = signal.clone();
        let task = tokio::spawn(async move { waiter.closed().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_finished());

        signal.close();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("waiter not woken")
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_resolves_immediately_when_already_closed() {
        let signal = CloseSignal::new();
        signal.close();
        signal.close();
        assert!(signal.is_closed());
        tokio::time::timeout(Duration::from_millis(100), signal.closed())
            .await
            .unwrap();
    }
}
