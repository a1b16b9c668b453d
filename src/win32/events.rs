use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use windows::{
    core::PCWSTR,
    Win32::{
        Foundation::{
            CloseHandle,
            BOOL,
            HANDLE,
            WAIT_OBJECT_0,
        },
        System::Threading::{
            CreateEventW,
            SetEvent,
            WaitForMultipleObjects,
            INFINITE,
        },
    },
};

use crate::sync::{DesktopEvents, Wake};

const WAIT_TIMEOUT: u32 = 0x102;

type DeleteChangeEvent = Box<dyn Fn(HANDLE) + Send + Sync>;

/// [`DesktopEvents`] over the driver's change event and an auto-reset
/// release event created here.
pub struct Win32DesktopEvents {
    // [change, release]; order decides which one wins a simultaneous signal.
    handles: [HANDLE; 2],
    delete_change: DeleteChangeEvent,
    closed: AtomicBool,
}

// Event handles are process-wide kernel objects, not tied to a thread.
unsafe impl Send for Win32DesktopEvents {}
unsafe impl Sync for Win32DesktopEvents {}

impl Win32DesktopEvents {
    /// Wraps `change`, the event the driver signals on desktop updates.
    /// `delete_change` gives it back to the driver on close.
    pub fn new<F>(change: HANDLE, delete_change: F) -> anyhow::Result<Self>
    where
        F: Fn(HANDLE) + Send + Sync + 'static,
    {
        anyhow::ensure!(!change.is_invalid(), "driver returned an invalid desktop event");

        let release = unsafe { CreateEventW(None, BOOL(0), BOOL(0), PCWSTR::null()) }
            .context("Failed to create release event")?;

        Ok(Self {
            handles: [change, release],
            delete_change: Box::new(delete_change),
            closed: AtomicBool::new(false),
        })
    }

    fn wait_for(&self, milliseconds: u32) -> Option<Wake> {
        if self.closed.load(Ordering::Acquire) {
            return Some(Wake::Released);
        }

        let result = unsafe { WaitForMultipleObjects(&self.handles, BOOL(0), milliseconds) };
        match result.0.wrapping_sub(WAIT_OBJECT_0.0) {
            0 => Some(Wake::Changed),
            1 => Some(Wake::Released),
            _ if result.0 == WAIT_TIMEOUT => None,
            _ => {
                tracing::error!("waiting for desktop events failed: {:#x}", result.0);
                Some(Wake::Released)
            }
        }
    }

    fn signal(&self, index: usize) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        if let Err(e) = unsafe { SetEvent(self.handles[index]) } {
            tracing::error!("SetEvent failed: {}", e);
        }
        std::thread::yield_now();
    }
}

impl DesktopEvents for Win32DesktopEvents {
    fn wait(&self) -> Wake {
        self.wait_for(INFINITE).unwrap_or(Wake::Released)
    }

    fn try_wait(&self) -> Option<Wake> {
        self.wait_for(0)
    }

    fn signal_changed(&self) {
        self.signal(0);
    }

    fn signal_release(&self) {
        self.signal(1);
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        (self.delete_change)(self.handles[0]);
        if let Err(e) = unsafe { CloseHandle(self.handles[1]) } {
            tracing::error!("Failed to close release event: {}", e);
        }
    }
}

impl Drop for Win32DesktopEvents {
    fn drop(&mut self) {
        self.close();
    }
}
