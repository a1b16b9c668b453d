use parking_lot::{Condvar, Mutex, ReentrantMutex, ReentrantMutexGuard};

/// Serializes "select desktop target, then render it" across every capture
/// session of the process.
///
/// Selecting a desktop is driver-wide state. Two sessions selecting
/// different desktops and rendering concurrently could each sample the
/// other's desktop.
pub struct ExclusivityGuard {
    lock: ReentrantMutex<()>,
}

static GLOBAL_GUARD: ExclusivityGuard = ExclusivityGuard {
    lock: parking_lot::const_reentrant_mutex(()),
};

/// Held access to the desktop target. Released on drop.
pub type DesktopAccess<'a> = ReentrantMutexGuard<'a, ()>;

impl ExclusivityGuard {
    /// The single guard shared by all sessions.
    pub fn global() -> &'static ExclusivityGuard {
        &GLOBAL_GUARD
    }

    /// Blocks until no other thread holds the guard. Re-entrant on the
    /// holding thread.
    pub fn acquire(&self) -> DesktopAccess<'_> {
        self.lock.lock()
    }
}

/// Why a wait on a [`DesktopEvents`] pair returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wake {
    /// The desktop changed; a new frame is available.
    Changed,
    /// Someone asked the waiter to return without producing a frame.
    Released,
}

/// A pair of auto-reset events: "desktop changed" and "release".
///
/// A wait consumes exactly one pending signal. When both are pending,
/// `Changed` is reported first. Signals are not counted, so repeated
/// signals before a wait collapse into one.
pub trait DesktopEvents: Send + Sync {
    /// Blocks without timeout until either event is signaled.
    fn wait(&self) -> Wake;

    /// Consumes a pending signal without blocking.
    fn try_wait(&self) -> Option<Wake>;

    fn signal_changed(&self);

    fn signal_release(&self);

    /// Closes the change event, then the release event. Waiting afterwards
    /// is a logic error; implementations return [`Wake::Released`].
    fn close(&self);
}

#[derive(Default)]
struct Pending {
    changed: bool,
    released: bool,
    closed: bool,
}

/// In-process [`DesktopEvents`] built on a mutex and condition variable.
///
/// Drivers that deliver change notifications through callbacks instead of
/// OS events call [`DesktopEvents::signal_changed`] from their callback.
#[derive(Default)]
pub struct SignalPair {
    pending: Mutex<Pending>,
    signal: Condvar,
}
impl SignalPair {
    pub fn new() -> Self {
        Self::default()
    }

    fn take(pending: &mut Pending) -> Option<Wake> {
        if pending.changed {
            pending.changed = false;
            Some(Wake::Changed)
        } else if pending.released {
            pending.released = false;
            Some(Wake::Released)
        } else if pending.closed {
            Some(Wake::Released)
        } else {
            None
        }
    }
}

impl DesktopEvents for SignalPair {
    fn wait(&self) -> Wake {
        let mut pending = self.pending.lock();
        loop {
            if let Some(wake) = Self::take(&mut pending) {
                return wake;
            }
            self.signal.wait(&mut pending);
        }
    }

    fn try_wait(&self) -> Option<Wake> {
        Self::take(&mut self.pending.lock())
    }

    fn signal_changed(&self) {
        self.pending.lock().changed = true;
        self.signal.notify_all();
    }

    fn signal_release(&self) {
        self.pending.lock().released = true;
        self.signal.notify_all();
    }

    fn close(&self) {
        self.pending.lock().closed = true;
        self.signal.notify_all();
    }
}
