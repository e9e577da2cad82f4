//! Drain a running watcher until interrupted

use crate::output::Printer;
use anyhow::{Context, Result};
use fslog_watcher::Watcher;
use std::io::Write;
use tracing::{info, warn};

/// Start `watcher`, print its events, and close it on Ctrl-C
///
/// Also returns when the printer's limit is reached or the event stream
/// closes on its own. A terminal error recorded by the watcher is returned
/// after close. Returns the number of events printed.
pub async fn drain(watcher: &mut dyn Watcher, printer: Printer) -> Result<usize> {
    drain_to(watcher, printer, std::io::stdout).await
}

/// [`drain`] with a custom output
pub async fn drain_to<W, F>(watcher: &mut dyn Watcher, mut printer: Printer, output: F) -> Result<usize>
where
    W: Write,
    F: FnOnce() -> W + Send + 'static,
{
    watcher.start().context("Failed to start watcher")?;
    info!("{} watcher running; press Ctrl-C to stop", watcher.backend());

    let events = watcher.events();
    let mut writer = tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut out = output();
        for batch in events.iter() {
            if !printer.write_batch(&batch, &mut out)? {
                break;
            }
        }
        Ok(printer.printed())
    });

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("interrupted; closing watcher");
            None
        }
        joined = &mut writer => Some(joined),
    };

    let closed = watcher.close();
    let joined = match finished {
        Some(joined) => joined,
        None => writer.await,
    };
    let printed = joined.context("Event writer task failed")??;
    closed.context("Failed to close watcher")?;

    if let Some(checkpoint) = watcher.checkpoint() {
        info!("last event id {}; resume with --since {}", checkpoint, checkpoint);
    }
    if let Some(err) = watcher.take_error() {
        warn!("watcher stopped on error after {} event(s)", printed);
        return Err(anyhow::Error::new(err).context("Watcher stopped"));
    }

    info!("{} event(s) reported", printed);
    Ok(printed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use fslog_core::{Batch, Event, EventFlags};
    use fslog_watcher::state::Lifecycle;
    use fslog_watcher::stream::{self, ErrorSlot, EventSink};
    use fslog_watcher::{Backend, EventStream, WatchError, WatcherState};
    use std::io;
    use std::sync::{Arc, Mutex};

    /// Replays fixed batches when started
    struct ScriptedWatcher {
        script: Vec<Batch>,
        keep_open: bool,
        fail_with: Option<WatchError>,
        lifecycle: Lifecycle,
        sink: Option<EventSink>,
        events: EventStream,
        errors: ErrorSlot,
    }

    impl ScriptedWatcher {
        fn new(script: Vec<Batch>, keep_open: bool) -> Self {
            let (sink, events) = stream::channel();
            let lifecycle = Lifecycle::new();
            lifecycle
                .transition("open", &[WatcherState::Created], WatcherState::Opened)
                .unwrap();
            Self {
                script,
                keep_open,
                fail_with: None,
                lifecycle,
                sink: Some(sink),
                events,
                errors: ErrorSlot::new(),
            }
        }
    }

    impl Watcher for ScriptedWatcher {
        fn start(&mut self) -> fslog_watcher::Result<()> {
            self.lifecycle
                .transition("start", &[WatcherState::Opened], WatcherState::Running)?;
            if let Some(sink) = &self.sink {
                for batch in self.script.drain(..) {
                    sink.send(batch);
                }
            }
            if let Some(err) = self.fail_with.take() {
                self.errors.set(err);
            }
            if !self.keep_open {
                self.sink.take();
            }
            Ok(())
        }

        fn close(&mut self) -> fslog_watcher::Result<()> {
            self.lifecycle.close();
            self.sink.take();
            Ok(())
        }

        fn events(&self) -> EventStream {
            self.events.clone()
        }

        fn state(&self) -> WatcherState {
            self.lifecycle.get()
        }

        fn take_error(&self) -> Option<WatchError> {
            self.errors.take()
        }

        fn backend(&self) -> Backend {
            Backend::KernelQueue
        }
    }

    /// Shared in-memory output
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn batch(ident: u64) -> Batch {
        vec![Event::new(EventFlags::MODIFIED).with_ident(ident)]
    }

    fn plain() -> Printer {
        Printer::new(OutputFormat::Human, false)
    }

    #[tokio::test]
    async fn test_stops_at_limit_and_closes() {
        let mut watcher = ScriptedWatcher::new(vec![batch(1), batch(2), batch(3)], true);
        let out = Captured::default();
        let sink = out.clone();

        let printed = drain_to(&mut watcher, plain().with_limit(Some(2)), move || sink)
            .await
            .unwrap();

        assert_eq!(printed, 2);
        assert_eq!(out.text(), "fd 1 modified\nfd 2 modified\n");
        assert_eq!(watcher.state(), WatcherState::Closed);
    }

    #[tokio::test]
    async fn test_returns_when_stream_closes() {
        let mut watcher = ScriptedWatcher::new(vec![batch(1), batch(2)], false);
        let out = Captured::default();
        let sink = out.clone();

        let printed = drain_to(&mut watcher, plain(), move || sink).await.unwrap();
        assert_eq!(printed, 2);
        assert_eq!(watcher.state(), WatcherState::Closed);
    }

    #[tokio::test]
    async fn test_terminal_error_is_reported() {
        let mut watcher = ScriptedWatcher::new(vec![batch(1)], false);
        watcher.fail_with = Some(WatchError::Syscall {
            call: "kevent",
            source: io::Error::from(io::ErrorKind::Other),
        });

        let err = drain_to(&mut watcher, plain(), Captured::default)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Watcher stopped"));
        assert!(format!("{:#}", err).contains("kevent"));
    }

    #[tokio::test]
    async fn test_start_failure_is_reported() {
        let mut watcher = ScriptedWatcher::new(Vec::new(), false);
        watcher.close().unwrap();

        let err = drain_to(&mut watcher, plain(), Captured::default)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to start watcher"));
    }
}
