//! Raw kernel event queue
//!
//! Thin wrapper over `kqueue(2)`/`kevent(2)` with the lifecycle rules the
//! watcher relies on:
//! - vnode filters are armed with `EV_ADD | EV_CLEAR | EV_ENABLE`, so each
//!   change is reported once and the filter stays armed
//! - a private wake pipe is registered alongside; [`KernelQueue::close`]
//!   closes its write end, which makes any blocked `poll` return at once
//! - the queue descriptor itself is closed only after in-flight polls have
//!   returned, so its number cannot be reused under a live wait
//!
//! Queues are not documented as safe for concurrent polling. Callers must
//! keep to one polling thread per queue.

use crate::error::{Result, WatchError};
use crate::state::WatcherState;
use fslog_core::decode::kqueue::Note;
use parking_lot::{Mutex, RwLock};
use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

/// How long a poll may block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTimeout {
    /// Return pending records without waiting
    Immediate,
    /// Wait until a record arrives or the queue is closed
    Indefinite,
    /// Wait at most this long
    After(Duration),
}

impl PollTimeout {
    /// `None` blocks forever; a zero duration does not block
    pub fn from_duration(timeout: Option<Duration>) -> Self {
        match timeout {
            None => Self::Indefinite,
            Some(d) if d.is_zero() => Self::Immediate,
            Some(d) => Self::After(d),
        }
    }

    fn to_timespec(self) -> Option<libc::timespec> {
        let d = match self {
            Self::Indefinite => return None,
            Self::Immediate => Duration::ZERO,
            Self::After(d) => d,
        };
        Some(libc::timespec {
            tv_sec: d.as_secs() as libc::time_t,
            tv_nsec: d.subsec_nanos() as _,
        })
    }
}

/// Which filter produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    Vnode,
    Read,
    Other(i32),
}

/// One record returned by the kernel; lives for a single decode step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelRecord {
    /// Descriptor the filter was registered on
    pub ident: usize,
    pub filter: RecordFilter,
    /// `EV_*` bits
    pub flags: u32,
    /// Filter-specific bits; `NOTE_*` for vnode records
    pub fflags: u32,
    /// Filter-specific data; an errno when `EV_ERROR` is set
    pub data: i64,
}

impl KernelRecord {
    fn from_raw(ev: &libc::kevent) -> Self {
        let filter = if ev.filter == libc::EVFILT_VNODE {
            RecordFilter::Vnode
        } else if ev.filter == libc::EVFILT_READ {
            RecordFilter::Read
        } else {
            RecordFilter::Other(ev.filter as i32)
        };
        Self {
            ident: ev.ident as usize,
            filter,
            flags: ev.flags as u32,
            fflags: ev.fflags as u32,
            data: ev.data as i64,
        }
    }

    pub fn is_error(&self) -> bool {
        self.flags & libc::EV_ERROR as u32 != 0
    }

    pub fn is_eof(&self) -> bool {
        self.flags & libc::EV_EOF as u32 != 0
    }
}

/// Kernel event queue handle
#[derive(Debug)]
pub struct KernelQueue {
    kq: RwLock<Option<OwnedFd>>,
    wake_rx: OwnedFd,
    wake_tx: Mutex<Option<OwnedFd>>,
    closing: AtomicBool,
}

impl KernelQueue {
    /// Create a queue
    ///
    /// Fails with `ResourceExhausted` when descriptor or memory limits are hit.
    pub fn open() -> Result<Self> {
        let raw = unsafe { libc::kqueue() };
        if raw < 0 {
            return Err(WatchError::allocation(
                "kqueue",
                "kernel queue",
                io::Error::last_os_error(),
            ));
        }
        // SAFETY: kqueue returned a fresh descriptor we now own
        let kq = unsafe { OwnedFd::from_raw_fd(raw) };
        set_cloexec(kq.as_raw_fd()).map_err(|e| WatchError::syscall("fcntl", e))?;

        let (wake_rx, wake_tx) = wake_pipe()?;
        let wake = change(
            wake_rx.as_raw_fd(),
            libc::EVFILT_READ as i32,
            (libc::EV_ADD | libc::EV_CLEAR | libc::EV_ENABLE) as u32,
            0,
        );
        kevent(kq.as_raw_fd(), &[wake], &mut [], None)
            .map_err(|e| WatchError::syscall("kevent", e))?;

        debug!("opened kqueue fd {}", raw);
        Ok(Self {
            kq: RwLock::new(Some(kq)),
            wake_rx,
            wake_tx: Mutex::new(Some(wake_tx)),
            closing: AtomicBool::new(false),
        })
    }

    /// Install or replace the vnode filter on `fd`
    ///
    /// Re-registering a descriptor replaces its note mask. Fails with
    /// `InvalidTarget` if `fd` is not an open descriptor.
    pub fn register(&self, fd: RawFd, notes: Note) -> Result<()> {
        let change = change(
            fd,
            libc::EVFILT_VNODE as i32,
            (libc::EV_ADD | libc::EV_CLEAR | libc::EV_ENABLE) as u32,
            notes.bits(),
        );
        self.apply("register", fd, change)?;
        trace!("registered fd {} with notes {:?}", fd, notes);
        Ok(())
    }

    /// Remove the vnode filter on `fd`; the descriptor itself stays open
    ///
    /// A filter the kernel already dropped (closed descriptor) is not an error.
    pub fn unregister(&self, fd: RawFd) -> Result<()> {
        let change = change(fd, libc::EVFILT_VNODE as i32, libc::EV_DELETE as u32, 0);
        match self.apply("unregister", fd, change) {
            Err(WatchError::InvalidTarget { .. }) => {
                debug!("filter for fd {} was already gone", fd);
                Ok(())
            }
            other => other,
        }
    }

    fn apply(&self, operation: &'static str, fd: RawFd, change: libc::kevent) -> Result<()> {
        let guard = self.kq.read();
        let kq = self.live(operation, guard.as_ref())?;
        kevent(kq.as_raw_fd(), &[change], &mut [], None)
            .map(|_| ())
            .map_err(|e| WatchError::registration("kevent", format!("fd {}", fd), e))
    }

    /// Wait for records
    ///
    /// Returns an empty sequence when the timeout elapses, when the wait is
    /// interrupted, or when [`close`](Self::close) wakes it. Order within the
    /// returned sequence is whatever the kernel chose.
    pub fn poll(&self, max_events: usize, timeout: PollTimeout) -> Result<Vec<KernelRecord>> {
        let guard = self.kq.read();
        let kq = self.live("poll", guard.as_ref())?;

        let mut events: Vec<libc::kevent> = (0..max_events.max(1))
            .map(|_| unsafe { mem::zeroed() })
            .collect();
        let timespec = timeout.to_timespec();

        let n = match kevent(kq.as_raw_fd(), &[], &mut events, timespec.as_ref()) {
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(Vec::new()),
            Err(e) => return Err(WatchError::syscall("kevent", e)),
        };

        let wake = self.wake_rx.as_raw_fd() as usize;
        Ok(events[..n]
            .iter()
            .map(KernelRecord::from_raw)
            .filter(|r| !(r.filter == RecordFilter::Read && r.ident == wake))
            .collect())
    }

    /// Release the queue
    ///
    /// Wakes any blocked poll first, then closes the descriptor once that
    /// poll has returned. Idempotent.
    pub fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        drop(self.wake_tx.lock().take());

        let kq = self.kq.write().take();
        if let Some(kq) = kq {
            let raw = kq.into_raw_fd();
            // SAFETY: `raw` came out of an OwnedFd and is closed exactly once
            if unsafe { libc::close(raw) } < 0 {
                return Err(WatchError::syscall("close", io::Error::last_os_error()));
            }
            debug!("closed kqueue fd {}", raw);
        }
        Ok(())
    }

    /// True once `close` has begun
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    fn live<'a>(&self, operation: &'static str, kq: Option<&'a OwnedFd>) -> Result<&'a OwnedFd> {
        match kq {
            Some(kq) if !self.is_closing() => Ok(kq),
            _ => Err(WatchError::InvalidState {
                operation,
                state: WatcherState::Closed,
            }),
        }
    }
}

/// Build a change-list entry
///
/// Field widths differ across the BSDs, hence the inferred casts.
fn change(ident: RawFd, filter: i32, flags: u32, fflags: u32) -> libc::kevent {
    // SAFETY: kevent is plain data; all-zero is a valid value
    let mut ev: libc::kevent = unsafe { mem::zeroed() };
    ev.ident = ident as _;
    ev.filter = filter as _;
    ev.flags = flags as _;
    ev.fflags = fflags as _;
    ev
}

fn kevent(
    kq: RawFd,
    changes: &[libc::kevent],
    events: &mut [libc::kevent],
    timeout: Option<&libc::timespec>,
) -> io::Result<usize> {
    let timeout = timeout.map_or(ptr::null(), |t| t as *const libc::timespec);
    // SAFETY: pointers and lengths come from live slices
    let n = unsafe {
        libc::kevent(
            kq,
            changes.as_ptr(),
            changes.len() as _,
            events.as_mut_ptr(),
            events.len() as _,
            timeout,
        )
    };
    if n < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(n as usize)
    }
}

fn wake_pipe() -> Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as libc::c_int; 2];
    // SAFETY: `fds` has room for both ends
    if unsafe { libc::pipe(fds.as_mut_ptr()) } < 0 {
        return Err(WatchError::allocation("pipe", "wake pipe", io::Error::last_os_error()));
    }
    // SAFETY: pipe returned two fresh descriptors we now own
    let (rx, tx) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };
    for fd in [&rx, &tx] {
        set_cloexec(fd.as_raw_fd()).map_err(|e| WatchError::syscall("fcntl", e))?;
    }
    Ok((rx, tx))
}

pub(super) fn set_cloexec(fd: RawFd) -> io::Result<()> {
    // SAFETY: fcntl on a descriptor we own
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
