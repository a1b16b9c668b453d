use crate::capture::CaptureError;
use crate::driver::DesktopDriver;
use crate::graphics::{Graphics, TextureId};

/// Driver-side desktop number, the same numbering the driver's control
/// panel shows. Zero is never a valid desktop.
pub type DesktopId = u32;

/// The driver texture bound to one desktop, with its native resolution.
///
/// `width`/`height` are only non-zero while a texture is bound.
#[derive(Debug, Default)]
pub struct DesktopSurface {
    id: DesktopId,
    texture: Option<TextureId>,
    width: u32,
    height: u32,
}
impl DesktopSurface {
    pub fn new(id: DesktopId) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    pub fn id(&self) -> DesktopId {
        self.id
    }

    pub fn texture(&self) -> Option<TextureId> {
        self.texture
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Selects this desktop and replaces the bound texture with the one
    /// the driver currently exposes for it.
    ///
    /// Must run under the [`ExclusivityGuard`](crate::ExclusivityGuard):
    /// the texture fetched belongs to whichever desktop is selected.
    pub fn acquire<G: Graphics, D: DesktopDriver>(
        &mut self,
        graphics: &G,
        driver: &D,
    ) -> Result<(), CaptureError> {
        self.release(graphics);

        // A topology change can make a previously valid id disappear.
        if self.id == 0 || !driver.select_desktop(self.id) {
            return Err(CaptureError::InvalidDesktopId(self.id));
        }

        let texture = driver.desktop_texture();
        if texture.is_null() {
            return Err(CaptureError::InvalidDesktopId(self.id));
        }

        graphics.set_sampling(texture);
        // Usually the display mode size; differs for rotated desktops.
        let (width, height) = graphics.texture_size(texture);

        self.texture = Some(texture);
        self.width = width;
        self.height = height;

        Ok(())
    }

    pub fn release<G: Graphics>(&mut self, graphics: &G) {
        if let Some(texture) = self.texture.take() {
            graphics.delete_textures(&[texture]);
        }
        self.width = 0;
        self.height = 0;
    }

    /// Drops the texture handle without deleting it.
    pub fn forget(&mut self) {
        self.texture = None;
        self.width = 0;
        self.height = 0;
    }
}
