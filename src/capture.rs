use std::sync::Arc;

use crate::desktop::{DesktopId, DesktopSurface};
use crate::driver::{DesktopDriver, DriverControl};
use crate::graphics::{FramebufferId, Graphics, TextureId, Viewport};
use crate::sync::ExclusivityGuard;

pub mod blit;
pub mod notify;
pub mod quad;
pub mod targets;

use blit::BlitProgram;
use notify::ChangeTracker;
use quad::QuadGeometry;
use targets::RenderTargetPool;

pub use notify::TrackingMode;

/// Number of present targets a session renders into.
pub const NUM_TARGETS: usize = 2;


#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CaptureError {
    // didn't init, init failed, or already torn down.
    #[error("Capture is not active.")]
    NotActive,

    #[error("No texture.")]
    NoTexture,

    #[error("Invalid dimension {width}x{height}.")]
    InvalidDimension { width: u32, height: u32 },

    // unknown id, or the display went away.
    #[error("Invalid desktop id {0}.")]
    InvalidDesktopId(DesktopId),

    #[error("Desktop capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("Graphics setup failed: {0}")]
    GraphicsSetupFailed(String),
}

impl CaptureError {
    fn no_context() -> Self {
        CaptureError::GraphicsSetupFailed("no current rendering context".into())
    }
}


/// Parameters of [`Capture::initialize`].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CaptureOptions {
    /// Size of the present targets.
    pub width: u32,
    pub height: u32,
    /// Rotation applied to the desktop image, counter-clockwise.
    pub rotation_degrees: f32,
    /// Skip captures while the desktop has not changed.
    pub track_changes: bool,
    /// Block captures until the desktop changes. Implies `track_changes`.
    pub blocking: bool,
    /// Keep the dirty flag on a background thread. When `false` the capture
    /// call polls the driver event itself.
    pub watch_thread: bool,
}
impl CaptureOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rotation_degrees: 0.0,
            track_changes: false,
            blocking: false,
            watch_thread: true,
        }
    }

    pub fn rotation(mut self, degrees: f32) -> Self {
        self.rotation_degrees = degrees;
        self
    }

    pub fn track_changes(mut self, track: bool) -> Self {
        self.track_changes = track;
        self
    }

    pub fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }

    pub fn watch_thread(mut self, watch: bool) -> Self {
        self.watch_thread = watch;
        self
    }
}


/// A capture session bound to one desktop.
///
/// Every call except [`Capture::release_event`] and
/// [`Capture::get_presented_texture`] needs the session's rendering context
/// to be current on the calling thread.
pub struct Capture<G: Graphics, D: DesktopDriver> {
    graphics: G,
    driver: D,
    control: Arc<dyn DriverControl>,
    guard: &'static ExclusivityGuard,
    desktop: DesktopSurface,
    present_width: u32,
    present_height: u32,
    blit: Option<BlitProgram>,
    quad: Option<QuadGeometry>,
    targets: RenderTargetPool,
    tracker: ChangeTracker,
    entry_points_loaded: bool,
    active: bool,
}
impl<G: Graphics, D: DesktopDriver> Capture<G, D> {
    /// Creates an uninitialized session for `desktop_id`.
    ///
    /// Turns desktop duplication on through `control` if it is off.
    pub fn new(
        desktop_id: DesktopId,
        graphics: G,
        driver: D,
        control: Arc<dyn DriverControl>,
    ) -> Result<Self, CaptureError> {
        if !control.is_enabled() && !(control.enable() && control.is_enabled()) {
            return Err(CaptureError::CaptureUnavailable("desktop duplication is disabled".into()));
        }

        Ok(Self {
            graphics,
            driver,
            control,
            guard: ExclusivityGuard::global(),
            desktop: DesktopSurface::new(desktop_id),
            present_width: 0,
            present_height: 0,
            blit: None,
            quad: None,
            targets: RenderTargetPool::new(),
            tracker: ChangeTracker::disabled(),
            entry_points_loaded: false,
            active: false,
        })
    }

    /// Binds the desktop and builds everything needed to capture it.
    ///
    /// Calling it again releases what the previous call allocated first.
    pub fn initialize(&mut self, options: &CaptureOptions) -> Result<(), CaptureError> {
        if options.width == 0 || options.height == 0 {
            return Err(CaptureError::InvalidDimension {
                width: options.width,
                height: options.height,
            });
        }

        let guard = self.guard;
        let _access = guard.acquire();

        if !self.graphics.has_current_context() {
            return Err(CaptureError::no_context());
        }

        self.release_resources();

        self.driver.load_entry_points().map_err(CaptureError::CaptureUnavailable)?;
        self.entry_points_loaded = true;

        self.desktop.acquire(&self.graphics, &self.driver)?;
        let (desktop_width, desktop_height) = self.desktop.size();
        tracing::info!("desktop {} is {}x{}", self.desktop.id(), desktop_width, desktop_height);

        self.blit = Some(BlitProgram::new(&self.graphics)?);

        self.present_width = options.width;
        self.present_height = options.height;
        self.targets.create(&self.graphics, NUM_TARGETS, options.width, options.height)?;

        self.quad = Some(QuadGeometry::new(&self.graphics, options.rotation_degrees));

        self.tracker = ChangeTracker::start(
            self.control.as_ref(),
            options.track_changes,
            options.blocking,
            options.watch_thread,
        );
        tracing::info!("desktop {} capture ready, tracking {:?}", self.desktop.id(), self.tracker.mode());

        self.active = true;

        Ok(())
    }

    /// Renders the desktop into present target `index`.
    ///
    /// Out-of-range indices use target 0. Returns `Ok(false)` when no frame
    /// was produced: the desktop has not changed since the last capture, or
    /// a blocked call was woken by [`Capture::release_event`].
    pub fn process_desktop(&self, index: usize) -> Result<bool, CaptureError> {
        if !self.active {
            return Err(CaptureError::NotActive);
        }
        if !self.graphics.has_current_context() {
            return Err(CaptureError::no_context());
        }

        let index = if index < self.targets.len() { index } else { 0 };
        let target = self.targets.get(index).ok_or(CaptureError::NotActive)?;
        let (blit, quad) = match (&self.blit, &self.quad) {
            (Some(blit), Some(quad)) => (blit, quad),
            _ => return Err(CaptureError::NotActive),
        };

        if !self.tracker.frame_due() {
            return Ok(false);
        }

        if let Err(e) = self.render(target.framebuffer, blit, quad) {
            self.tracker.requeue();
            return Err(e);
        }

        Ok(true)
    }

    fn render(
        &self,
        target: FramebufferId,
        blit: &BlitProgram,
        quad: &QuadGeometry,
    ) -> Result<(), CaptureError> {
        let _access = self.guard.acquire();

        let source = self.desktop.texture().ok_or(CaptureError::NoTexture)?;
        if !self.driver.select_desktop(self.desktop.id()) {
            return Err(CaptureError::InvalidDesktopId(self.desktop.id()));
        }

        // The caller may be rendering with the same context.
        let saved = self.graphics.viewport();
        self.graphics.set_viewport(Viewport {
            x: 0,
            y: 0,
            width: self.present_width as i32,
            height: self.present_height as i32,
        });

        blit.draw(&self.graphics, source, target, quad.vertex_array);

        self.graphics.set_viewport(saved);
        self.graphics.finish();

        Ok(())
    }

    /// Wakes a [`Capture::process_desktop`] call blocked waiting for a
    /// change. Only meaningful in [`TrackingMode::Blocking`].
    pub fn release_event(&self) -> bool {
        self.tracker.release()
    }

    /// Re-acquires the desktop texture after a mode or topology change.
    pub fn resize_desktop_texture(&mut self) -> Result<(), CaptureError> {
        if !self.active {
            return Err(CaptureError::NotActive);
        }

        let guard = self.guard;
        let _access = guard.acquire();

        if !self.graphics.has_current_context() {
            return Err(CaptureError::no_context());
        }

        self.desktop.acquire(&self.graphics, &self.driver)?;
        let (width, height) = self.desktop.size();
        tracing::debug!("desktop {} texture re-acquired at {}x{}", self.desktop.id(), width, height);

        Ok(())
    }

    /// Replaces every present target with one of the new size.
    ///
    /// The new targets are allocated before the old ones are deleted, so
    /// no texture name survives the resize.
    pub fn resize_present_texture(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if !self.active {
            return Err(CaptureError::NotActive);
        }
        if width == 0 || height == 0 {
            return Err(CaptureError::InvalidDimension { width, height });
        }
        if !self.graphics.has_current_context() {
            return Err(CaptureError::no_context());
        }

        let mut resized = RenderTargetPool::new();
        let created = resized.create(&self.graphics, NUM_TARGETS, width, height);

        let mut previous = std::mem::replace(&mut self.targets, resized);
        previous.destroy(&self.graphics);

        self.present_width = width;
        self.present_height = height;
        tracing::debug!("present targets resized to {}x{}", width, height);

        created
    }

    /// Color texture of present target `index`, if allocated.
    pub fn get_presented_texture(&self, index: usize) -> Option<TextureId> {
        self.targets.texture(index)
    }

    pub fn desktop_id(&self) -> DesktopId {
        self.desktop.id()
    }

    /// Native resolution of the bound desktop, `(0, 0)` when unbound.
    pub fn desktop_size(&self) -> (u32, u32) {
        self.desktop.size()
    }

    pub fn present_size(&self) -> (u32, u32) {
        (self.present_width, self.present_height)
    }

    pub fn tracking_mode(&self) -> TrackingMode {
        self.tracker.mode()
    }

    /// Whether a desktop change is waiting to be captured.
    pub fn has_pending_change(&self) -> bool {
        self.tracker.is_dirty()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deletes every GPU object, then stops tracking. Needs a current context.
    fn release_resources(&mut self) {
        self.active = false;

        if let Some(blit) = self.blit.take() {
            blit.destroy(&self.graphics);
        }
        self.desktop.release(&self.graphics);
        self.targets.destroy(&self.graphics);
        if let Some(quad) = self.quad.take() {
            quad.destroy(&self.graphics);
        }

        self.tracker.stop();
    }

    fn holds_gpu_objects(&self) -> bool {
        self.blit.is_some() || self.quad.is_some() || !self.targets.is_empty() || self.desktop.texture().is_some()
    }
}

impl<G: Graphics, D: DesktopDriver> Drop for Capture<G, D> {
    fn drop(&mut self) {
        if self.entry_points_loaded {
            self.driver.enable_post_process(false);
        }

        if self.graphics.has_current_context() {
            self.release_resources();
            return;
        }

        // Deleting GPU objects without a context is undefined; leak them.
        if self.holds_gpu_objects() {
            tracing::error!(
                "no current rendering context while tearing down desktop {} capture, GPU objects leaked",
                self.desktop.id()
            );
        }
        self.blit = None;
        self.quad = None;
        self.targets.forget();
        self.desktop.forget();

        self.active = false;
        self.tracker.stop();
    }
}

#[cfg(feature = "img")]
pub mod img;
#[cfg(feature = "img")]
#[cfg_attr(feature = "docs-features", doc(cfg(feature = "img")))]
pub use img::ImgFrameData;
