use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::driver::DriverControl;
use crate::sync::{DesktopEvents, Wake};

/// How a session learns about desktop changes. Fixed at initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TrackingMode {
    /// Every capture renders.
    Disabled,
    /// The capture call polls the change event itself and skips the frame
    /// if nothing changed.
    Polling,
    /// A background watcher keeps the dirty flag; captures skip the frame
    /// while it is clear.
    Watched,
    /// Captures block until the desktop changes or they are released.
    Blocking,
}

/// Owns the event pair, the dirty flag and, in [`TrackingMode::Watched`],
/// the watcher thread.
pub struct ChangeTracker {
    mode: TrackingMode,
    events: Option<Arc<dyn DesktopEvents>>,
    tracking: Arc<AtomicBool>,
    changed: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}
impl ChangeTracker {
    pub fn disabled() -> Self {
        Self {
            mode: TrackingMode::Disabled,
            events: None,
            tracking: Arc::new(AtomicBool::new(false)),
            // Nothing has been captured yet, so the first frame is always due.
            changed: Arc::new(AtomicBool::new(true)),
            watcher: None,
        }
    }

    /// Resolves the requested flags into a [`TrackingMode`].
    ///
    /// Blocking implies tracking. If the driver cannot open the change
    /// events, both are dropped and the session captures unthrottled.
    pub fn start(
        control: &dyn DriverControl,
        track_changes: bool,
        blocking: bool,
        watch_thread: bool,
    ) -> Self {
        let mut tracker = Self::disabled();
        if !(track_changes || blocking) {
            return tracker;
        }

        let events = match control.open_desktop_events() {
            Some(events) => events,
            None => {
                tracing::warn!("desktop change notification unavailable, tracking disabled");
                return tracker;
            }
        };

        tracker.tracking.store(true, Ordering::Release);
        tracker.mode = if blocking {
            TrackingMode::Blocking
        } else if watch_thread {
            TrackingMode::Watched
        } else {
            TrackingMode::Polling
        };

        if tracker.mode == TrackingMode::Watched {
            let spawned = thread::Builder::new().name("doppcapture-watch".into()).spawn({
                let events = events.clone();
                let tracking = tracker.tracking.clone();
                let changed = tracker.changed.clone();
                move || watch(events.as_ref(), &tracking, &changed)
            });

            match spawned {
                Ok(handle) => tracker.watcher = Some(handle),
                Err(e) => {
                    tracing::warn!("failed to spawn desktop watcher, polling instead: {}", e);
                    tracker.mode = TrackingMode::Polling;
                }
            }
        }

        tracker.events = Some(events);
        tracker
    }

    pub fn mode(&self) -> TrackingMode {
        self.mode
    }

    pub fn is_dirty(&self) -> bool {
        self.changed.load(Ordering::Acquire)
    }

    /// Decides whether a capture should render now, taking the pending
    /// change if so. Blocks in [`TrackingMode::Blocking`].
    ///
    /// A change recorded after this returns belongs to the next capture.
    pub fn frame_due(&self) -> bool {
        let events = match (&self.events, self.mode) {
            (_, TrackingMode::Disabled) | (None, _) => return true,
            (Some(events), _) => events,
        };

        match self.mode {
            TrackingMode::Blocking => events.wait() == Wake::Changed,
            TrackingMode::Polling => {
                let signaled = events.try_wait() == Some(Wake::Changed);
                self.changed.swap(false, Ordering::AcqRel) || signaled
            }
            _ => self.changed.swap(false, Ordering::AcqRel),
        }
    }

    /// Puts back a change taken by [`ChangeTracker::frame_due`] for a
    /// capture that failed before rendering it.
    pub fn requeue(&self) {
        match (&self.events, self.mode) {
            (Some(events), TrackingMode::Blocking) => events.signal_changed(),
            _ => self.changed.store(true, Ordering::Release),
        }
    }

    /// Wakes a capture blocked in [`TrackingMode::Blocking`] without a frame.
    pub fn release(&self) -> bool {
        match (&self.events, self.mode) {
            (Some(events), TrackingMode::Blocking) => {
                events.signal_release();
                true
            }
            _ => false,
        }
    }

    /// Stops tracking: clears the flag, wakes the watcher so it sees the
    /// flag, joins it, then closes the events.
    pub fn stop(&mut self) {
        self.tracking.store(false, Ordering::Release);

        if let Some(events) = &self.events {
            events.signal_changed();
        }

        if let Some(watcher) = self.watcher.take() {
            if watcher.join().is_err() {
                tracing::error!("desktop watcher panicked");
            }
        }

        if let Some(events) = self.events.take() {
            events.close();
        }

        self.mode = TrackingMode::Disabled;
    }
}

impl Drop for ChangeTracker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn watch(events: &dyn DesktopEvents, tracking: &AtomicBool, changed: &AtomicBool) {
    tracing::debug!("desktop watcher started");

    while tracking.load(Ordering::Acquire) {
        if events.wait() == Wake::Changed {
            changed.store(true, Ordering::Release);
        }
    }

    tracing::debug!("desktop watcher stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SignalPair;
    use std::time::{Duration, Instant};

    struct Control {
        events: Option<Arc<SignalPair>>,
    }
    impl DriverControl for Control {
        fn is_enabled(&self) -> bool {
            true
        }
        fn enable(&self) -> bool {
            true
        }
        fn disable(&self) {}
        fn open_desktop_events(&self) -> Option<Arc<dyn DesktopEvents>> {
            self.events.clone().map(|e| e as Arc<dyn DesktopEvents>)
        }
    }

    fn control() -> (Control, Arc<SignalPair>) {
        let events = Arc::new(SignalPair::new());
        (Control { events: Some(events.clone()) }, events)
    }

    fn wait_until(condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn flags_resolve_to_modes() {
        let (c, _) = control();

        let tracker = ChangeTracker::start(&c, false, false, true);
        assert_eq!(tracker.mode(), TrackingMode::Disabled);
        assert!(tracker.watcher.is_none());
        assert!(tracker.events.is_none());

        let tracker = ChangeTracker::start(&c, true, false, true);
        assert_eq!(tracker.mode(), TrackingMode::Watched);
        assert!(tracker.watcher.is_some());

        let tracker = ChangeTracker::start(&c, true, false, false);
        assert_eq!(tracker.mode(), TrackingMode::Polling);
        assert!(tracker.watcher.is_none());

        let tracker = ChangeTracker::start(&c, true, true, true);
        assert_eq!(tracker.mode(), TrackingMode::Blocking);
        assert!(tracker.watcher.is_none());

        // blocking forces tracking on
        let tracker = ChangeTracker::start(&c, false, true, true);
        assert_eq!(tracker.mode(), TrackingMode::Blocking);
        assert!(tracker.watcher.is_none());
    }

    #[test]
    fn missing_events_disable_blocking_too() {
        let c = Control { events: None };
        let tracker = ChangeTracker::start(&c, true, true, true);

        assert_eq!(tracker.mode(), TrackingMode::Disabled);
        assert!(!tracker.release());
        assert!(tracker.frame_due());
    }

    #[test]
    fn watcher_sets_dirty_flag() {
        let (c, events) = control();
        let tracker = ChangeTracker::start(&c, true, false, true);

        assert!(tracker.frame_due());
        assert!(!tracker.frame_due());

        events.signal_changed();
        assert!(wait_until(|| tracker.is_dirty()));
        assert!(tracker.frame_due());
        assert!(!tracker.is_dirty());
    }

    #[test]
    fn requeue_restores_taken_change() {
        let (c, _) = control();

        let tracker = ChangeTracker::start(&c, true, false, false);
        assert!(tracker.frame_due());
        tracker.requeue();
        assert!(tracker.frame_due());
        assert!(!tracker.frame_due());

        let (c, events) = control();
        let tracker = ChangeTracker::start(&c, true, true, true);
        tracker.requeue();
        assert_eq!(events.try_wait(), Some(Wake::Changed));
    }

    #[test]
    fn polling_consumes_change_event() {
        let (c, events) = control();
        let tracker = ChangeTracker::start(&c, true, false, false);
        assert!(tracker.frame_due());

        assert!(!tracker.frame_due());
        events.signal_changed();
        assert!(tracker.frame_due());
        assert_eq!(events.try_wait(), None);
    }

    #[test]
    fn stop_joins_watcher_and_closes_events() {
        let (c, events) = control();
        let mut tracker = ChangeTracker::start(&c, true, false, true);
        tracker.stop();

        assert!(tracker.watcher.is_none());
        assert_eq!(tracker.mode(), TrackingMode::Disabled);

        // the wake-up signal may still be pending if the watcher exited first
        events.try_wait();
        assert_eq!(events.try_wait(), Some(Wake::Released));
    }
}
