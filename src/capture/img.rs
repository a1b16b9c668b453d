use image::{imageops, RgbaImage};

use super::*;
use crate::driver::DesktopDriver;
use crate::graphics::Graphics;

#[derive(Clone, Debug, Default)]
/// this is container for image.
///
/// [Read more](`Capture::get_img_frame`)
#[cfg_attr(feature = "docs-features", doc(cfg(feature = "img")))]
pub struct ImgFrameData {
    pub width: u32,
    pub height: u32,
    pub data: RgbaImage,
}
impl ImgFrameData {
    pub fn new(width: u32, height: u32, data: RgbaImage) -> Self {
        Self {
            width, height, data
        }
    }
}

impl<G: Graphics, D: DesktopDriver> Capture<G, D> {
    /// Read present target `index` back into an RgbaImage, top row first.
    ///
    /// for [image] crate. Call it after [`Capture::process_desktop`] rendered into `index`.
    ///
    /// Required features: *`"img"`*
    pub fn get_img_frame(&self, index: usize) -> Result<ImgFrameData, CaptureError> {
        if !self.active {
            return Err(CaptureError::NotActive);
        }
        if !self.graphics.has_current_context() {
            return Err(CaptureError::no_context());
        }

        let target = self.targets.get(index).ok_or(CaptureError::NoTexture)?;
        let data = self.graphics.read_pixels(target.framebuffer, target.width, target.height);

        let mut image = RgbaImage::from_raw(target.width, target.height, data)
            .ok_or_else(|| CaptureError::GraphicsSetupFailed("short pixel readback".into()))?;
        // GL rows start at the bottom.
        imageops::flip_vertical_in_place(&mut image);

        Ok(ImgFrameData::new(target.width, target.height, image))
    }
}
