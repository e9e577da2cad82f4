//! Consumer boundary
//!
//! Batches flow through an unbounded crossbeam channel. The dispatch side
//! holds the only [`EventSink`]; dropping it closes the stream, so the
//! stream closes exactly once no matter how many [`EventStream`] clones exist.

use crate::error::WatchError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use fslog_core::Batch;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Create a connected sink/stream pair
pub fn channel() -> (EventSink, EventStream) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (EventSink { tx }, EventStream { rx })
}

/// Producer half, owned by the dispatch task
#[derive(Debug)]
pub struct EventSink {
    tx: Sender<Batch>,
}

impl EventSink {
    /// Push a batch; returns false once every stream handle is gone
    pub fn send(&self, batch: Batch) -> bool {
        self.tx.send(batch).is_ok()
    }
}

/// Receive side of a watcher's output
///
/// Clones share one queue: each batch goes to exactly one receiver.
#[derive(Debug, Clone)]
pub struct EventStream {
    rx: Receiver<Batch>,
}

impl EventStream {
    /// Block for the next batch; `None` once the stream is closed and drained
    pub fn recv(&self) -> Option<Batch> {
        self.rx.recv().ok()
    }

    /// Block for at most `timeout`
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Batch, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn try_recv(&self) -> Result<Batch, TryRecvError> {
        self.rx.try_recv()
    }

    /// Iterate until the stream closes
    pub fn iter(&self) -> impl Iterator<Item = Batch> + '_ {
        self.rx.iter()
    }

    /// Number of batches waiting to be drained
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn into_receiver(self) -> Receiver<Batch> {
        self.rx
    }
}

impl IntoIterator for EventStream {
    type Item = Batch;
    type IntoIter = crossbeam_channel::IntoIter<Batch>;

    fn into_iter(self) -> Self::IntoIter {
        self.rx.into_iter()
    }
}

/// Terminal error left behind by a dispatch task
#[derive(Debug, Clone, Default)]
pub struct ErrorSlot {
    inner: Arc<Mutex<Option<WatchError>>>,
}

impl ErrorSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `err` unless an earlier error is already stored
    pub fn set(&self, err: WatchError) {
        let mut slot = self.inner.lock();
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    pub fn take(&self) -> Option<WatchError> {
        self.inner.lock().take()
    }

    pub fn is_set(&self) -> bool {
        self.inner.lock().is_some()
    }
}
