//! Dedicated dispatch task for poll-driven backends
//!
//! One OS thread per watcher performs every blocking read against the
//! kernel handle. Batches are pushed to the sink in the order they were
//! read. When the source reports cancellation or fails, the thread drops
//! the sink, which closes the consumer stream.

use crate::error::WatchError;
use crate::stream::{ErrorSlot, EventSink};
use fslog_core::Batch;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Blocking producer of decoded batches
pub trait BatchSource: Send + 'static {
    /// Block until the next wake-up
    ///
    /// `Ok(None)` means the source was cancelled and the task should exit.
    /// An empty batch (timeout, interrupted wait) is skipped.
    fn next_batch(&mut self) -> Result<Option<Batch>, WatchError>;
}

/// Handle to a running dispatch thread
#[derive(Debug)]
pub struct Dispatcher {
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    /// Spawn the dispatch thread
    pub fn spawn<S: BatchSource>(
        name: &str,
        mut source: S,
        sink: EventSink,
        errors: ErrorSlot,
    ) -> io::Result<Self> {
        let thread_name = name.to_string();
        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            debug!("{} started", thread_name);
            run(&mut source, &sink, &errors);
            debug!("{} exiting", thread_name);
            // `sink` drops here, closing the stream
        })?;

        Ok(Self {
            handle: Some(handle),
        })
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }

    /// Wait for the thread to exit; the source must already be cancelled
    pub fn join(mut self) {
        self.join_inner();
    }

    fn join_inner(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("dispatch thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if self.handle.is_some() {
            warn!("dispatcher dropped without join; detaching thread");
        }
    }
}

fn run<S: BatchSource>(source: &mut S, sink: &EventSink, errors: &ErrorSlot) {
    loop {
        match source.next_batch() {
            Ok(Some(batch)) if batch.is_empty() => continue,
            Ok(Some(batch)) => {
                if !sink.send(batch) {
                    debug!("all event streams dropped; stopping dispatch");
                    return;
                }
            }
            Ok(None) => return,
            Err(e) => {
                error!("dispatch read failed: {}", e);
                errors.set(e);
                return;
            }
        }
    }
}
