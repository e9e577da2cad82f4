//! kqueue-backed watcher
//!
//! Path targets are opened by the watcher and owned by it, so their events
//! carry the path. Descriptor targets stay caller-owned and their events
//! carry only the descriptor number. Directory targets can additionally
//! report created/removed children by diffing the directory listing when
//! the kernel signals a write.

mod queue;

pub use queue::{KernelQueue, KernelRecord, PollTimeout, RecordFilter};

use crate::config::KqueueConfig;
use crate::dispatch::{BatchSource, Dispatcher};
use crate::error::{Result, WatchError};
use crate::state::{Lifecycle, WatcherState};
use crate::stream::{self, ErrorSlot, EventSink, EventStream};
use crate::{Backend, WatchTarget, Watcher};
use dashmap::DashMap;
use fslog_core::decode::kqueue as note;
use fslog_core::{Batch, Event, EventFlags};
use std::collections::BTreeMap;
use std::ffi::{CString, OsString};
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[cfg(any(target_os = "macos", target_os = "ios"))]
const OPEN_FLAGS: libc::c_int = libc::O_EVTONLY | libc::O_CLOEXEC;

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
const OPEN_FLAGS: libc::c_int = libc::O_RDONLY | libc::O_CLOEXEC;

/// One registered descriptor
#[derive(Debug)]
struct Target {
    path: Option<PathBuf>,
    /// IS_FILE / IS_DIRECTORY / IS_SYMLINK as seen at registration
    kind: EventFlags,
    interest: EventFlags,
    /// Present only for descriptors the watcher opened
    owned: Option<OwnedFd>,
    /// Directory listing snapshot, when entry tracking is on
    entries: Option<BTreeMap<OsString, EventFlags>>,
}

impl Target {
    /// Turn one vnode record into events, appending to `batch`
    fn translate(&mut self, ident: u64, fflags: u32, batch: &mut Batch) {
        let flags = note::decode(fflags);
        if flags.matches_interest(self.interest) {
            let mut event = Event::new(flags | self.kind).with_ident(ident);
            if let Some(path) = &self.path {
                event = event.with_path(path.clone());
            }
            batch.push(event);
        }

        if note::touches_directory_entries(fflags) {
            self.diff_entries(batch);
        }
    }

    fn diff_entries(&mut self, batch: &mut Batch) {
        let (Some(dir), Some(previous)) = (&self.path, &mut self.entries) else {
            return;
        };
        let current = match read_entries(dir) {
            Ok(current) => current,
            Err(e) => {
                debug!("cannot list {}: {}", dir.display(), e);
                return;
            }
        };

        let created: Vec<_> = current
            .iter()
            .filter(|(name, _)| !previous.contains_key(*name))
            .collect();
        let removed: Vec<_> = previous
            .iter()
            .filter(|(name, _)| !current.contains_key(*name))
            .collect();

        // A listing that loses one name and gains another in the same
        // write is how a rename inside the directory shows up
        let renamed = if !created.is_empty() && !removed.is_empty() {
            self.interest & EventFlags::RENAMED
        } else {
            EventFlags::empty()
        };

        for (name, kind) in created {
            push_child(batch, dir, name, EventFlags::CREATED | renamed | *kind, self.interest);
        }
        for (name, kind) in removed {
            push_child(batch, dir, name, EventFlags::REMOVED | renamed | *kind, self.interest);
        }
        *previous = current;
    }
}

fn push_child(batch: &mut Batch, dir: &Path, name: &OsString, flags: EventFlags, interest: EventFlags) {
    if flags.matches_interest(interest) {
        batch.push(Event::new(flags).with_path(dir.join(name)));
    }
}

type TargetTable = DashMap<RawFd, Target>;

/// Decode kernel records against the target table
///
/// Records for idents no longer in the table are filtered with the
/// watcher-wide `interest`.
fn decode_records(records: &[KernelRecord], targets: &TargetTable, interest: EventFlags) -> Batch {
    let mut batch = Vec::with_capacity(records.len());
    for record in records {
        if record.is_error() {
            warn!(
                "kevent reported errno {} for ident {}",
                record.data, record.ident
            );
            continue;
        }
        if record.filter != RecordFilter::Vnode {
            continue;
        }

        let ident = record.ident as u64;
        match targets.get_mut(&(record.ident as RawFd)) {
            Some(mut target) => target.translate(ident, record.fflags, &mut batch),
            None => {
                // Unwatched between the kernel wake-up and now
                trace!("record for unknown ident {}", ident);
                let flags = note::decode(record.fflags);
                if flags.matches_interest(interest) {
                    batch.push(Event::new(flags).with_ident(ident));
                }
            }
        }
    }
    batch
}

/// Dispatch-side reader
struct KqueueSource {
    queue: Arc<KernelQueue>,
    targets: Arc<TargetTable>,
    interest: EventFlags,
    max_events: usize,
    timeout: PollTimeout,
}

impl BatchSource for KqueueSource {
    fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.queue.is_closing() {
            return Ok(None);
        }
        let records = match self.queue.poll(self.max_events, self.timeout) {
            Ok(records) => records,
            Err(_) if self.queue.is_closing() => return Ok(None),
            Err(e) => return Err(e),
        };
        Ok(Some(decode_records(&records, &self.targets, self.interest)))
    }
}

/// Watcher over kqueue vnode filters
pub struct KernelQueueWatcher {
    queue: Arc<KernelQueue>,
    targets: Arc<TargetTable>,
    interest: EventFlags,
    options: KqueueConfig,
    lifecycle: Lifecycle,
    stream: EventStream,
    sink: Option<EventSink>,
    errors: ErrorSlot,
    dispatcher: Option<Dispatcher>,
}

impl KernelQueueWatcher {
    /// Open a queue and register `targets` with `interest`
    pub fn new(
        targets: impl IntoIterator<Item = WatchTarget>,
        interest: EventFlags,
    ) -> Result<Self> {
        Self::with_config(targets, interest, &KqueueConfig::default())
    }

    pub fn with_config(
        targets: impl IntoIterator<Item = WatchTarget>,
        interest: EventFlags,
        options: &KqueueConfig,
    ) -> Result<Self> {
        let queue = Arc::new(KernelQueue::open()?);
        let (sink, stream) = stream::channel();

        let watcher = Self {
            queue,
            targets: Arc::new(DashMap::new()),
            interest,
            options: options.clone(),
            lifecycle: Lifecycle::new(),
            stream,
            sink: Some(sink),
            errors: ErrorSlot::new(),
            dispatcher: None,
        };

        // On failure the watcher drops, closing the queue and opened targets
        for target in targets {
            watcher.register_target(target, interest)?;
        }
        watcher
            .lifecycle
            .transition("open", &[WatcherState::Created], WatcherState::Opened)?;

        info!("kqueue watcher opened with {} target(s)", watcher.targets.len());
        Ok(watcher)
    }

    /// Add a target using the watcher's interest mask
    ///
    /// Returns the descriptor number events will carry in `Event::ident`.
    pub fn watch(&self, target: WatchTarget) -> Result<RawFd> {
        self.watch_with(target, self.interest)
    }

    /// Add a target, or replace the mask of one already watched
    pub fn watch_with(&self, target: WatchTarget, interest: EventFlags) -> Result<RawFd> {
        self.lifecycle
            .ensure("register", &[WatcherState::Opened, WatcherState::Running])?;
        self.register_target(target, interest)
    }

    /// Remove a target by descriptor
    ///
    /// Descriptors opened by the watcher are closed; caller-owned ones are not.
    pub fn unwatch(&self, ident: RawFd) -> Result<()> {
        self.lifecycle
            .ensure("unregister", &[WatcherState::Opened, WatcherState::Running])?;

        let (_, target) = self.targets.remove(&ident).ok_or_else(|| WatchError::InvalidTarget {
            target: format!("fd {}", ident),
            source: io::Error::new(io::ErrorKind::NotFound, "descriptor is not watched"),
        })?;
        self.queue.unregister(ident)?;
        debug!(
            "unwatched fd {} ({:?}, owned: {})",
            ident,
            target.path,
            target.owned.is_some()
        );
        Ok(())
    }

    /// Remove a path target
    pub fn unwatch_path(&self, path: &Path) -> Result<()> {
        let ident = self.ident_of(path).ok_or_else(|| WatchError::InvalidTarget {
            target: path.display().to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "path is not watched"),
        })?;
        self.unwatch(ident)
    }

    /// Path registered for a descriptor, if the watcher opened it
    pub fn path_of(&self, ident: RawFd) -> Option<PathBuf> {
        self.targets.get(&ident).and_then(|t| t.path.clone())
    }

    pub fn ident_of(&self, path: &Path) -> Option<RawFd> {
        self.targets
            .iter()
            .find(|entry| entry.path.as_deref() == Some(path))
            .map(|entry| *entry.key())
    }

    /// Registered descriptors and their paths
    pub fn targets(&self) -> Vec<(RawFd, Option<PathBuf>)> {
        let mut targets: Vec<_> = self
            .targets
            .iter()
            .map(|entry| (*entry.key(), entry.path.clone()))
            .collect();
        targets.sort_by_key(|(fd, _)| *fd);
        targets
    }

    /// Read pending records directly
    ///
    /// Only valid before `start`; afterwards the dispatch task is the sole
    /// reader of the queue.
    pub fn poll(&self, timeout: PollTimeout) -> Result<Batch> {
        self.lifecycle.ensure("poll", &[WatcherState::Opened])?;
        let records = self.queue.poll(self.options.max_events, timeout)?;
        Ok(decode_records(&records, &self.targets, self.interest))
    }

    fn register_target(&self, target: WatchTarget, interest: EventFlags) -> Result<RawFd> {
        let notes = note::encode_interest(interest);
        if notes.is_empty() {
            warn!("interest {:?} has no kqueue equivalent; {} will stay silent", interest, target);
        }

        match target {
            WatchTarget::Path(path) => {
                if let Some(ident) = self.ident_of(&path) {
                    // Same path again: replace the mask in place
                    self.queue.register(ident, notes)?;
                    if let Some(mut existing) = self.targets.get_mut(&ident) {
                        existing.interest = interest;
                    }
                    return Ok(ident);
                }

                let fd = open_target(&path)?;
                let ident = fd.as_raw_fd();
                let mut kind = descriptor_kind(ident).map_err(|source| WatchError::InvalidTarget {
                    target: path.display().to_string(),
                    source,
                })?;
                if fs::symlink_metadata(&path).map(|m| m.file_type().is_symlink()).unwrap_or(false) {
                    kind |= EventFlags::IS_SYMLINK;
                }

                let entries = if kind.contains(EventFlags::IS_DIRECTORY)
                    && self.options.track_directory_entries
                {
                    Some(read_entries(&path).map_err(|source| WatchError::InvalidTarget {
                        target: path.display().to_string(),
                        source,
                    })?)
                } else {
                    None
                };

                // Table first, so a record racing the registration finds it
                self.targets.insert(
                    ident,
                    Target {
                        path: Some(path.clone()),
                        kind,
                        interest,
                        owned: Some(fd),
                        entries,
                    },
                );
                if let Err(e) = self.queue.register(ident, notes) {
                    self.targets.remove(&ident);
                    return Err(e);
                }
                debug!("watching {} as fd {}", path.display(), ident);
                Ok(ident)
            }
            WatchTarget::Descriptor(ident) => {
                let kind = descriptor_kind(ident).map_err(|source| WatchError::InvalidTarget {
                    target: format!("fd {}", ident),
                    source,
                })?;
                self.queue.register(ident, notes)?;

                match self.targets.get_mut(&ident) {
                    Some(mut existing) => existing.interest = interest,
                    None => {
                        self.targets.insert(
                            ident,
                            Target {
                                path: None,
                                kind,
                                interest,
                                owned: None,
                                entries: None,
                            },
                        );
                    }
                }
                debug!("watching caller fd {}", ident);
                Ok(ident)
            }
        }
    }

    fn shutdown(&mut self) -> Result<()> {
        let previous = self.lifecycle.close();
        if previous == WatcherState::Closed {
            return Ok(());
        }

        let result = self.queue.close();
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.join();
        }
        // Never started: the stream closes here instead
        self.sink.take();
        self.targets.clear();

        match &result {
            Ok(()) => info!("kqueue watcher closed"),
            Err(e) => warn!("kqueue watcher closed with error: {}", e),
        }
        result
    }
}

impl Watcher for KernelQueueWatcher {
    fn start(&mut self) -> Result<()> {
        self.lifecycle
            .transition("start", &[WatcherState::Opened], WatcherState::Running)?;

        let source = KqueueSource {
            queue: Arc::clone(&self.queue),
            targets: Arc::clone(&self.targets),
            interest: self.interest,
            max_events: self.options.max_events,
            timeout: PollTimeout::from_duration(self.options.poll_timeout()),
        };
        let Some(sink) = self.sink.take() else {
            return Err(WatchError::InvalidState {
                operation: "start",
                state: self.lifecycle.get(),
            });
        };

        match Dispatcher::spawn("fslog-kqueue", source, sink, self.errors.clone()) {
            Ok(dispatcher) => {
                self.dispatcher = Some(dispatcher);
                Ok(())
            }
            Err(e) => {
                let _ = self.shutdown();
                Err(WatchError::syscall("thread spawn", e))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.shutdown()
    }

    fn events(&self) -> EventStream {
        self.stream.clone()
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

impl Drop for KernelQueueWatcher {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("error closing kqueue watcher on drop: {}", e);
        }
    }
}

fn open_target(path: &Path) -> Result<OwnedFd> {
    let invalid = |source: io::Error| WatchError::InvalidTarget {
        target: path.display().to_string(),
        source,
    };
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| invalid(io::Error::new(io::ErrorKind::InvalidInput, "path contains a nul byte")))?;

    // SAFETY: c_path is a valid nul-terminated string
    let raw = unsafe { libc::open(c_path.as_ptr(), OPEN_FLAGS) };
    if raw < 0 {
        let e = io::Error::last_os_error();
        return Err(match e.raw_os_error() {
            Some(libc::EMFILE) | Some(libc::ENFILE) => WatchError::ResourceExhausted {
                resource: "watch descriptor",
                source: e,
            },
            _ => invalid(e),
        });
    }
    // SAFETY: open returned a fresh descriptor we now own
    Ok(unsafe { OwnedFd::from_raw_fd(raw) })
}

/// Item kind of an open descriptor; also rejects closed ones
fn descriptor_kind(fd: RawFd) -> io::Result<EventFlags> {
    // SAFETY: fstat writes into a zeroed stat we own
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd, &mut st) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(match st.st_mode & libc::S_IFMT {
        libc::S_IFDIR => EventFlags::IS_DIRECTORY,
        libc::S_IFREG => EventFlags::IS_FILE,
        libc::S_IFLNK => EventFlags::IS_SYMLINK,
        _ => EventFlags::empty(),
    })
}

fn read_entries(dir: &Path) -> io::Result<BTreeMap<OsString, EventFlags>> {
    let mut entries = BTreeMap::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let kind = entry.file_type().map(kind_of).unwrap_or_default();
        entries.insert(entry.file_name(), kind);
    }
    Ok(entries)
}

fn kind_of(file_type: fs::FileType) -> EventFlags {
    if file_type.is_symlink() {
        EventFlags::IS_SYMLINK
    } else if file_type.is_dir() {
        EventFlags::IS_DIRECTORY
    } else if file_type.is_file() {
        EventFlags::IS_FILE
    } else {
        EventFlags::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    const WAIT: Duration = Duration::from_secs(5);

    /// Drain batches until `pred` holds for some event or the deadline passes
    fn wait_for(stream: &EventStream, pred: impl Fn(&Event) -> bool) -> Vec<Event> {
        let deadline = Instant::now() + WAIT;
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            if let Ok(batch) = stream.recv_timeout(Duration::from_millis(100)) {
                let hit = batch.iter().any(&pred);
                seen.extend(batch);
                if hit {
                    return seen;
                }
            }
        }
        panic!("expected event not delivered; saw {:?}", seen);
    }

    #[test]
    fn test_create_then_remove_in_watched_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let interest = EventFlags::CREATED | EventFlags::REMOVED | EventFlags::MODIFIED;

        let mut watcher = KernelQueueWatcher::new([WatchTarget::path(&root)], interest).unwrap();
        watcher.start().unwrap();
        let events = watcher.events();

        let file = root.join("a.txt");
        fs::write(&file, b"hello").unwrap();
        let seen = wait_for(&events, |e| e.flags.contains(EventFlags::CREATED));
        let created = seen.iter().find(|e| e.flags.contains(EventFlags::CREATED)).unwrap();
        assert_eq!(created.path(), Some(file.as_path()));
        assert!(created.flags.contains(EventFlags::IS_FILE));

        fs::remove_file(&file).unwrap();
        let seen = wait_for(&events, |e| e.flags.contains(EventFlags::REMOVED));
        assert!(seen
            .iter()
            .any(|e| e.flags.contains(EventFlags::REMOVED) && e.path() == Some(file.as_path())));

        watcher.close().unwrap();
    }

    #[test]
    fn test_directory_event_carries_path_and_kind() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let mut options = KqueueConfig::default();
        options.track_directory_entries = false;

        let mut watcher =
            KernelQueueWatcher::with_config([WatchTarget::path(&root)], EventFlags::MODIFIED, &options)
                .unwrap();
        watcher.start().unwrap();

        fs::write(root.join("b.txt"), b"x").unwrap();
        let seen = wait_for(&watcher.events(), |e| e.flags.contains(EventFlags::MODIFIED));
        let event = seen.iter().find(|e| e.flags.contains(EventFlags::MODIFIED)).unwrap();
        assert_eq!(event.path(), Some(root.as_path()));
        assert!(event.flags.contains(EventFlags::IS_DIRECTORY));
        assert!(event.ident.is_some());
        // Tracking off: no child events
        assert!(!seen.iter().any(|e| e.flags.contains(EventFlags::CREATED)));

        watcher.close().unwrap();
    }

    #[test]
    fn test_two_targets_both_reported() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("one.txt");
        let second = dir.path().join("two.txt");
        fs::write(&first, b"").unwrap();
        fs::write(&second, b"").unwrap();

        let mut watcher = KernelQueueWatcher::new(
            [WatchTarget::path(&first), WatchTarget::path(&second)],
            EventFlags::MODIFIED,
        )
        .unwrap();
        watcher.start().unwrap();
        let events = watcher.events();

        let writers: Vec<_> = [first.clone(), second.clone()]
            .into_iter()
            .map(|path| std::thread::spawn(move || fs::write(path, b"changed").unwrap()))
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let mut paths = std::collections::HashSet::new();
        let deadline = Instant::now() + WAIT;
        while paths.len() < 2 && Instant::now() < deadline {
            if let Ok(batch) = events.recv_timeout(Duration::from_millis(100)) {
                paths.extend(batch.into_iter().filter_map(|e| e.path));
            }
        }
        assert!(paths.contains(&first));
        assert!(paths.contains(&second));

        watcher.close().unwrap();
    }

    #[test]
    fn test_caller_descriptor_stays_open_and_has_no_path() {
        let dir = TempDir::new().unwrap();
        let mut file = File::create(dir.path().join("caller.txt")).unwrap();
        let fd = file.as_raw_fd();

        let mut watcher =
            KernelQueueWatcher::new([WatchTarget::Descriptor(fd)], EventFlags::MODIFIED).unwrap();
        assert_eq!(watcher.path_of(fd), None);
        watcher.start().unwrap();

        file.write_all(b"data").unwrap();
        let seen = wait_for(&watcher.events(), |e| e.ident == Some(fd as u64));
        let event = seen.iter().find(|e| e.ident == Some(fd as u64)).unwrap();
        assert!(event.path.is_none());
        assert!(event.flags.contains(EventFlags::MODIFIED | EventFlags::IS_FILE));

        watcher.close().unwrap();
        // Still usable by its owner
        file.write_all(b"more").unwrap();
    }

    #[test]
    fn test_closed_descriptor_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = File::create(dir.path().join("gone")).unwrap();
        let raw = unsafe { libc::fcntl(file.as_raw_fd(), libc::F_DUPFD, 900) };
        unsafe { libc::close(raw) };

        let err = KernelQueueWatcher::new([WatchTarget::Descriptor(raw)], EventFlags::MODIFIED)
            .err()
            .unwrap();
        assert!(matches!(err, WatchError::InvalidTarget { .. }));
    }

    #[test]
    fn test_missing_path_is_rejected() {
        let err = KernelQueueWatcher::new(
            [WatchTarget::path("/nonexistent/fslog/target")],
            EventFlags::MODIFIED,
        )
        .err()
        .unwrap();
        assert!(matches!(err, WatchError::InvalidTarget { .. }));
    }

    #[test]
    fn test_lifecycle_rules() {
        let dir = TempDir::new().unwrap();
        let mut watcher =
            KernelQueueWatcher::new([WatchTarget::path(dir.path())], EventFlags::MODIFIED).unwrap();
        assert_eq!(watcher.state(), WatcherState::Opened);

        // Direct polling is allowed before start, and does not block
        assert!(watcher.poll(PollTimeout::Immediate).unwrap().is_empty());

        watcher.start().unwrap();
        assert_eq!(watcher.state(), WatcherState::Running);
        assert!(matches!(
            watcher.start(),
            Err(WatchError::InvalidState { operation: "start", .. })
        ));
        assert!(matches!(
            watcher.poll(PollTimeout::Immediate),
            Err(WatchError::InvalidState { operation: "poll", .. })
        ));

        watcher.close().unwrap();
        watcher.close().unwrap();
        assert_eq!(watcher.state(), WatcherState::Closed);
        assert!(watcher.events().recv().is_none());
        assert!(matches!(
            watcher.watch(WatchTarget::path(dir.path())),
            Err(WatchError::InvalidState { operation: "register", .. })
        ));
        assert!(watcher.take_error().is_none());
    }

    #[test]
    fn test_close_without_start_closes_stream() {
        let dir = TempDir::new().unwrap();
        let mut watcher =
            KernelQueueWatcher::new([WatchTarget::path(dir.path())], EventFlags::MODIFIED).unwrap();
        let events = watcher.events();
        watcher.close().unwrap();
        assert!(events.recv().is_none());
        assert!(watcher.start().is_err());
    }

    #[test]
    fn test_close_unblocks_indefinite_dispatch() {
        let dir = TempDir::new().unwrap();
        let mut watcher =
            KernelQueueWatcher::new([WatchTarget::path(dir.path())], EventFlags::MODIFIED).unwrap();
        watcher.start().unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        watcher.close().unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_reregister_replaces_and_unwatch_removes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"").unwrap();

        let watcher = KernelQueueWatcher::new([WatchTarget::path(&path)], EventFlags::MODIFIED).unwrap();
        let ident = watcher.ident_of(&path).unwrap();

        let again = watcher
            .watch_with(WatchTarget::path(&path), EventFlags::REMOVED)
            .unwrap();
        assert_eq!(again, ident);
        assert_eq!(watcher.targets().len(), 1);

        // Only removal is armed now
        fs::write(&path, b"changed").unwrap();
        assert!(watcher
            .poll(PollTimeout::After(Duration::from_millis(100)))
            .unwrap()
            .is_empty());

        watcher.unwatch_path(&path).unwrap();
        assert!(watcher.targets().is_empty());
        assert!(matches!(
            watcher.unwatch(ident),
            Err(WatchError::InvalidTarget { .. })
        ));
    }

    #[test]
    fn test_entry_diff_reports_children() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep"), b"").unwrap();
        fs::write(dir.path().join("old"), b"").unwrap();

        let mut target = Target {
            path: Some(dir.path().to_path_buf()),
            kind: EventFlags::IS_DIRECTORY,
            interest: EventFlags::CREATED | EventFlags::REMOVED,
            owned: None,
            entries: Some(read_entries(dir.path()).unwrap()),
        };

        fs::remove_file(dir.path().join("old")).unwrap();
        fs::create_dir(dir.path().join("new")).unwrap();

        let mut batch = Vec::new();
        target.translate(3, note::Note::WRITE.bits(), &mut batch);

        // The directory write itself is outside the interest mask
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].flags, EventFlags::CREATED | EventFlags::IS_DIRECTORY);
        assert_eq!(batch[0].path(), Some(dir.path().join("new").as_path()));
        assert_eq!(batch[1].flags, EventFlags::REMOVED | EventFlags::IS_FILE);
        assert_eq!(batch[1].path(), Some(dir.path().join("old").as_path()));

        // Snapshot advanced
        let mut batch = Vec::new();
        target.translate(3, note::Note::WRITE.bits(), &mut batch);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_rename_in_directory_matches_renamed_interest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();

        let mut target = Target {
            path: Some(dir.path().to_path_buf()),
            kind: EventFlags::IS_DIRECTORY,
            interest: EventFlags::RENAMED,
            owned: None,
            entries: Some(read_entries(dir.path()).unwrap()),
        };

        fs::rename(dir.path().join("a"), dir.path().join("b")).unwrap();

        let mut batch = Vec::new();
        target.translate(3, note::Note::WRITE.bits(), &mut batch);

        assert_eq!(batch.len(), 2);
        assert_eq!(
            batch[0].flags,
            EventFlags::CREATED | EventFlags::RENAMED | EventFlags::IS_FILE
        );
        assert_eq!(batch[0].path(), Some(dir.path().join("b").as_path()));
        assert_eq!(
            batch[1].flags,
            EventFlags::REMOVED | EventFlags::RENAMED | EventFlags::IS_FILE
        );
        assert_eq!(batch[1].path(), Some(dir.path().join("a").as_path()));

        // A plain creation is not a rename
        fs::write(dir.path().join("c"), b"").unwrap();
        let mut batch = Vec::new();
        target.translate(3, note::Note::WRITE.bits(), &mut batch);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_rename_not_tagged_without_renamed_interest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), b"").unwrap();

        let mut target = Target {
            path: Some(dir.path().to_path_buf()),
            kind: EventFlags::IS_DIRECTORY,
            interest: EventFlags::CREATED | EventFlags::REMOVED,
            owned: None,
            entries: Some(read_entries(dir.path()).unwrap()),
        };

        fs::rename(dir.path().join("a"), dir.path().join("b")).unwrap();

        let mut batch = Vec::new();
        target.translate(3, note::Note::WRITE.bits(), &mut batch);
        assert_eq!(batch.len(), 2);
        assert!(batch.iter().all(|e| !e.flags.contains(EventFlags::RENAMED)));
    }

    #[test]
    fn test_unknown_ident_filtered_by_interest() {
        let targets = TargetTable::new();
        let record = |fflags: u32| KernelRecord {
            ident: 4242,
            filter: RecordFilter::Vnode,
            flags: 0,
            fflags,
            data: 0,
        };
        let records = [record(note::Note::ATTRIB.bits()), record(note::Note::DELETE.bits())];

        let batch = decode_records(&records, &targets, EventFlags::REMOVED);
        assert_eq!(batch.len(), 1);
        assert!(batch[0].flags.contains(EventFlags::REMOVED));
        assert_eq!(batch[0].path(), None);
    }
}
