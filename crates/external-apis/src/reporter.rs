// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Progress reporting sinks
//!
//! The aggregator pushes every snapshot of a running query to a [`ProgressReporter`].
//! Delivery to the caller is the transport's business; a reporter never fails the query.

use std::sync::Mutex;

use async_trait::async_trait;
use shared_types::NftSnapshot;
use tokio::sync::mpsc;
use tracing::debug;

/// Sink for query snapshots
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Push a snapshot
    async fn report(&self, snapshot: &NftSnapshot);

    /// No more snapshots will follow
    async fn close(&self);
}

/// Forwards snapshots over a tokio channel
///
/// Closing drops the sender, so the receiving side sees the end of the stream once the
/// buffered snapshots are drained.
#[derive(Debug)]
pub struct ChannelReporter {
    sender: Mutex<Option<mpsc::Sender<NftSnapshot>>>,
}

impl ChannelReporter {
    /// Wrap an existing sender
    pub fn new(sender: mpsc::Sender<NftSnapshot>) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
        }
    }

    /// Create a reporter and the receiver it feeds
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<NftSnapshot>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self::new(sender), receiver)
    }

    fn sender(&self) -> Option<mpsc::Sender<NftSnapshot>> {
        self.sender.lock().ok().and_then(|sender| sender.clone())
    }
}

#[async_trait]
impl ProgressReporter for ChannelReporter {
    async fn report(&self, snapshot: &NftSnapshot) {
        let Some(sender) = self.sender() else {
            debug!("snapshot reported after close, dropping");
            return;
        };
        if sender.send(snapshot.clone()).await.is_err() {
            debug!(address = snapshot.address(), "snapshot receiver gone");
        }
    }

    async fn close(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }
}

/// Discards every snapshot
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

#[async_trait]
impl ProgressReporter for NoopReporter {
    async fn report(&self, _snapshot: &NftSnapshot) {}

    async fn close(&self) {}
}
