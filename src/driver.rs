use std::sync::Arc;

use crate::graphics::TextureId;
use crate::sync::DesktopEvents;

/// Driver entry points for desktop duplication.
///
/// The driver tracks the "current capture target" as context state, not as
/// part of the texture, so [`DesktopDriver::desktop_texture`] is only
/// meaningful right after a successful [`DesktopDriver::select_desktop`]
/// made under the [`ExclusivityGuard`](crate::ExclusivityGuard).
pub trait DesktopDriver {
    /// Resolves every entry point. The error names the first missing one.
    fn load_entry_points(&mut self) -> Result<(), String>;

    /// Makes `desktop_id` the active capture target. `false` means the id
    /// is invalid or the display is gone.
    fn select_desktop(&self, desktop_id: u32) -> bool;

    /// Texture holding the composited image of the active capture target.
    fn desktop_texture(&self) -> TextureId;

    fn enable_post_process(&self, enable: bool);
}

/// OS-level switch for the desktop duplication feature.
///
/// One instance is usually shared by every capture session of a process.
pub trait DriverControl: Send + Sync {
    fn is_enabled(&self) -> bool;

    /// Turns the feature on. Calling it while enabled is a no-op.
    fn enable(&self) -> bool;

    /// Turns the feature off. Sessions never call this; the owner of the
    /// control does, once its last session is gone, usually when dropped.
    fn disable(&self);

    /// Opens the event pair signaled by the driver whenever the desktop
    /// changes. `None` if the driver refuses to register the notification.
    fn open_desktop_events(&self) -> Option<Arc<dyn DesktopEvents>>;
}
