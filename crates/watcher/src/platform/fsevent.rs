//! FSEvents-backed watcher
//!
//! The stream is created when the watcher opens and scheduled on a private
//! run loop thread when it starts. FSEvents invokes the callback on that
//! thread with coalesced batches of path, flags and id records, which are
//! decoded and pushed to the consumer stream in delivery order.
//!
//! The callback context owns the sink. It is freed by the stream's release
//! callback, so releasing the stream is what closes the consumer stream.

use crate::config::FsEventsConfig;
use crate::error::{Result, WatchError};
use crate::state::{Lifecycle, WatcherState};
use crate::stream::{self, ErrorSlot, EventSink, EventStream};
use crate::{Backend, Watcher};
use fslog_core::decode::fsevent as stream_flags;
use fslog_core::{EventFlags, EventId, SinceWhen};
use fsevent_sys as fs;
use fsevent_sys::core_foundation as cf;
use std::ffi::{CStr, OsStr};
use std::io;
use std::mem;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, trace};

extern "C" {
    fn CFRunLoopIsWaiting(runloop: cf::CFRunLoopRef) -> cf::Boolean;
}

const FALSE: cf::Boolean = 0;

/// Current id of the system-wide FSEvents stream
///
/// Useful as a checkpoint taken before a scan, to replay whatever changed
/// while the scan ran.
pub fn current_system_event_id() -> EventId {
    // SAFETY: no arguments, no preconditions
    EventId::from_raw(unsafe { fs::FSEventsGetCurrentEventId() })
}

/// State reachable from the C callback
struct CallbackContext {
    sink: EventSink,
    interest: EventFlags,
    last_event_id: Arc<AtomicU64>,
}

/// Owned stream reference; releasing it frees the callback context
struct StreamRef(fs::FSEventStreamRef);

// SAFETY: stream references may move between threads; the stream is only
// scheduled on one run loop at a time
unsafe impl Send for StreamRef {}

impl StreamRef {
    fn into_raw(self) -> fs::FSEventStreamRef {
        let raw = self.0;
        mem::forget(self);
        raw
    }
}

impl Drop for StreamRef {
    fn drop(&mut self) {
        // SAFETY: never scheduled, so releasing is all that is needed
        unsafe { fs::FSEventStreamRelease(self.0) };
    }
}

struct RunLoopRef(cf::CFRunLoopRef);

// SAFETY: CFRunLoopStop and CFRunLoopIsWaiting may be called from any thread
unsafe impl Send for RunLoopRef {}

/// Watcher over one FSEvents stream
pub struct HistoryStreamWatcher {
    roots: Vec<PathBuf>,
    since: SinceWhen,
    latency: Duration,
    lifecycle: Lifecycle,
    events: EventStream,
    /// Present between open and start
    stream: Option<StreamRef>,
    runloop: Option<(RunLoopRef, JoinHandle<()>)>,
    last_event_id: Arc<AtomicU64>,
    errors: ErrorSlot,
}

impl HistoryStreamWatcher {
    /// Open a stream over `roots` with per-file granularity
    pub fn new(
        roots: impl IntoIterator<Item = impl Into<PathBuf>>,
        since: SinceWhen,
        latency: Duration,
        interest: EventFlags,
    ) -> Result<Self> {
        let flags = fs::kFSEventStreamCreateFlagNone | fs::kFSEventStreamCreateFlagFileEvents;
        Self::open(roots, since, latency, interest, flags)
    }

    pub fn with_config(paths: &[PathBuf], interest: EventFlags, options: &FsEventsConfig) -> Result<Self> {
        let mut flags = fs::kFSEventStreamCreateFlagNone;
        if options.file_events {
            flags |= fs::kFSEventStreamCreateFlagFileEvents;
        }
        if options.no_defer {
            flags |= fs::kFSEventStreamCreateFlagNoDefer;
        }
        if options.watch_root {
            flags |= fs::kFSEventStreamCreateFlagWatchRoot;
        }
        if options.ignore_self {
            flags |= fs::kFSEventStreamCreateFlagIgnoreSelf;
        }
        Self::open(
            paths.iter().cloned(),
            options.since_when(),
            options.latency(),
            interest,
            flags,
        )
    }

    fn open(
        roots: impl IntoIterator<Item = impl Into<PathBuf>>,
        since: SinceWhen,
        latency: Duration,
        interest: EventFlags,
        create_flags: fs::FSEventStreamCreateFlags,
    ) -> Result<Self> {
        let lifecycle = Lifecycle::new();
        let roots = roots
            .into_iter()
            .map(|root| canonical_root(&Into::<PathBuf>::into(root)))
            .collect::<Result<Vec<_>>>()?;
        if roots.is_empty() {
            return Err(WatchError::InvalidTarget {
                target: "<no roots>".to_string(),
                source: io::Error::new(io::ErrorKind::InvalidInput, "at least one root is required"),
            });
        }

        let (sink, events) = stream::channel();
        let last_event_id = Arc::new(AtomicU64::new(0));
        let context = CallbackContext {
            sink,
            interest,
            last_event_id: Arc::clone(&last_event_id),
        };
        let stream = create_stream(&roots, since, latency, create_flags, context)?;
        lifecycle.transition("open", &[WatcherState::Created], WatcherState::Opened)?;

        info!(
            "fsevents watcher opened over {} root(s), since {:?}, latency {:?}",
            roots.len(),
            since,
            latency
        );
        Ok(Self {
            roots,
            since,
            latency,
            lifecycle,
            events,
            stream: Some(stream),
            runloop: None,
            last_event_id,
            errors: ErrorSlot::new(),
        })
    }

    /// Canonical roots the stream covers
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn since(&self) -> SinceWhen {
        self.since
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Id of the most recent record the OS delivered, filtered or not
    ///
    /// Persist it and pass it back as `SinceWhen::Event` to resume.
    pub fn last_event_id(&self) -> Option<EventId> {
        match self.last_event_id.load(Ordering::Acquire) {
            0 => None,
            raw => Some(EventId::from_raw(raw)),
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        let previous = self.lifecycle.close();
        if previous == WatcherState::Closed {
            return Ok(());
        }

        // Never started: releasing the stream closes the consumer stream
        drop(self.stream.take());

        if let Some((runloop, handle)) = self.runloop.take() {
            // SAFETY: the run loop stays valid until its thread exits, which
            // cannot happen before CFRunLoopStop
            unsafe {
                while CFRunLoopIsWaiting(runloop.0) == FALSE {
                    thread::yield_now();
                }
                cf::CFRunLoopStop(runloop.0);
            }
            if handle.join().is_err() {
                error!("fsevents run loop thread panicked");
            }
        }

        info!("fsevents watcher closed");
        Ok(())
    }
}

impl Watcher for HistoryStreamWatcher {
    fn start(&mut self) -> Result<()> {
        self.lifecycle
            .transition("start", &[WatcherState::Opened], WatcherState::Running)?;
        let Some(stream) = self.stream.take() else {
            return Err(WatchError::InvalidState {
                operation: "start",
                state: self.lifecycle.get(),
            });
        };

        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let spawned = thread::Builder::new()
            .name("fslog-fsevents".to_string())
            .spawn(move || {
                let stream = stream.into_raw();
                // SAFETY: this thread is the only owner of `stream` from here
                unsafe {
                    let runloop = cf::CFRunLoopGetCurrent();
                    fs::FSEventStreamScheduleWithRunLoop(stream, runloop, cf::kCFRunLoopDefaultMode);
                    if fs::FSEventStreamStart(stream) == FALSE {
                        fs::FSEventStreamInvalidate(stream);
                        fs::FSEventStreamRelease(stream);
                        let _ = ready_tx.send(None);
                        return;
                    }
                    let _ = ready_tx.send(Some(RunLoopRef(runloop)));

                    debug!("fsevents run loop started");
                    cf::CFRunLoopRun();

                    fs::FSEventStreamStop(stream);
                    fs::FSEventStreamInvalidate(stream);
                    fs::FSEventStreamRelease(stream);
                    debug!("fsevents run loop exiting");
                }
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.shutdown();
                return Err(WatchError::syscall("thread spawn", e));
            }
        };

        match ready_rx.recv() {
            Ok(Some(runloop)) => {
                self.runloop = Some((runloop, handle));
                Ok(())
            }
            _ => {
                let _ = handle.join();
                let _ = self.shutdown();
                Err(WatchError::syscall(
                    "FSEventStreamStart",
                    io::Error::new(io::ErrorKind::Other, "stream refused to start"),
                ))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
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
        Backend::HistoryStream
    }

    fn checkpoint(&self) -> Option<EventId> {
        self.last_event_id()
    }
}

impl Drop for HistoryStreamWatcher {
    fn drop(&mut self) {
        let _ = self.shutdown();
    }
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    root.canonicalize().map_err(|source| WatchError::InvalidTarget {
        target: root.display().to_string(),
        source,
    })
}

fn create_stream(
    roots: &[PathBuf],
    since: SinceWhen,
    latency: Duration,
    create_flags: fs::FSEventStreamCreateFlags,
    context: CallbackContext,
) -> Result<StreamRef> {
    // SAFETY: every CF object created here is released on all paths
    unsafe {
        let paths = cf::CFArrayCreateMutable(cf::kCFAllocatorDefault, 0, &cf::kCFTypeArrayCallBacks);
        for root in roots {
            if let Err(e) = append_root(paths, root) {
                cf::CFRelease(paths);
                return Err(e);
            }
        }

        let info = Box::into_raw(Box::new(context));
        let stream_context = fs::FSEventStreamContext {
            version: 0,
            info: info as *mut libc::c_void,
            retain: None,
            release: Some(release_context),
            copy_description: None,
        };
        let since_when = match since {
            SinceWhen::Now => fs::kFSEventStreamEventIdSinceNow,
            SinceWhen::Event(id) => id.as_raw(),
        };

        let stream = fs::FSEventStreamCreate(
            cf::kCFAllocatorDefault,
            callback,
            &stream_context,
            paths,
            since_when,
            latency.as_secs_f64(),
            create_flags,
        );
        // The stream keeps its own copy of the path list
        cf::CFRelease(paths);

        if stream.is_null() {
            drop(Box::from_raw(info));
            return Err(WatchError::ResourceExhausted {
                resource: "event stream",
                source: io::Error::new(io::ErrorKind::Other, "FSEventStreamCreate returned null"),
            });
        }
        Ok(StreamRef(stream))
    }
}

unsafe fn append_root(paths: cf::CFMutableArrayRef, root: &Path) -> Result<()> {
    let invalid = |reason: &str| WatchError::InvalidTarget {
        target: root.display().to_string(),
        source: io::Error::new(io::ErrorKind::InvalidInput, reason.to_string()),
    };
    let text = root.to_str().ok_or_else(|| invalid("root path is not valid UTF-8"))?;

    let mut err: cf::CFErrorRef = ptr::null_mut();
    let cf_path = cf::str_path_to_cfstring_ref(text, &mut err);
    if cf_path.is_null() {
        if !err.is_null() {
            cf::CFRelease(err as cf::CFRef);
        }
        return Err(invalid("cannot convert root path"));
    }
    cf::CFArrayAppendValue(paths, cf_path);
    cf::CFRelease(cf_path);
    Ok(())
}

extern "C" fn release_context(info: *const libc::c_void) {
    // SAFETY: `info` is the box installed by create_stream, and FSEvents
    // calls release exactly once, when the stream is deallocated
    unsafe { drop(Box::from_raw(info as *mut CallbackContext)) };
    trace!("fsevents callback context released");
}

// Runs on the run loop thread and must not unwind.
extern "C" fn callback(
    _stream: fs::FSEventStreamRef,
    info: *mut libc::c_void,
    num_events: libc::size_t,
    event_paths: *mut libc::c_void,
    event_flags: *const fs::FSEventStreamEventFlags,
    event_ids: *const fs::FSEventStreamEventId,
) {
    // SAFETY: `info` outlives the stream; the three arrays hold `num_events`
    // entries each and paths are nul-terminated C strings
    let context = unsafe { &*(info as *const CallbackContext) };
    let event_paths = event_paths as *const *const libc::c_char;

    let mut batch = Vec::with_capacity(num_events);
    for i in 0..num_events {
        let (raw_path, raw_flags, raw_id) =
            unsafe { (CStr::from_ptr(*event_paths.add(i)), *event_flags.add(i), *event_ids.add(i)) };
        if raw_id != 0 {
            context.last_event_id.store(raw_id, Ordering::Release);
        }

        let path = Path::new(OsStr::from_bytes(raw_path.to_bytes()));
        if let Some(event) = stream_flags::decode_record(raw_flags, raw_id, path, context.interest) {
            batch.push(event);
        }
    }

    if !batch.is_empty() && !context.sink.send(batch) {
        trace!("no event stream left; dropping fsevents batch");
    }
}
