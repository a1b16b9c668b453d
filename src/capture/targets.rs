use crate::graphics::{FramebufferId, Graphics, TextureId};

use super::CaptureError;

/// One presentable output: a color texture attached to its framebuffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderTarget {
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
    pub width: u32,
    pub height: u32,
}

/// Same-sized render targets, created and destroyed as a whole.
#[derive(Debug, Default)]
pub struct RenderTargetPool {
    targets: Vec<RenderTarget>,
}
impl RenderTargetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `count` targets of `width`x`height`.
    ///
    /// Targets whose framebuffer turned out incomplete stay allocated; the
    /// caller still has to [`RenderTargetPool::destroy`] the pool.
    pub fn create<G: Graphics>(
        &mut self,
        graphics: &G,
        count: usize,
        width: u32,
        height: u32,
    ) -> Result<(), CaptureError> {
        if !self.targets.is_empty() {
            return Err(CaptureError::GraphicsSetupFailed("render targets already allocated".into()));
        }

        let mut incomplete = Vec::new();
        for i in 0..count {
            let texture = graphics.create_texture(width, height);
            let (framebuffer, complete) = graphics.create_framebuffer(texture);
            if !complete {
                incomplete.push(i);
            }

            self.targets.push(RenderTarget {
                framebuffer,
                texture,
                width,
                height,
            });
        }

        if incomplete.is_empty() {
            tracing::debug!("allocated {} render targets of {}x{}", count, width, height);
            Ok(())
        } else {
            Err(CaptureError::GraphicsSetupFailed(format!("incomplete framebuffer for targets {:?}", incomplete)))
        }
    }

    pub fn destroy<G: Graphics>(&mut self, graphics: &G) {
        if self.targets.is_empty() {
            return;
        }

        let textures: Vec<TextureId> = self.targets.iter().map(|t| t.texture).collect();
        let framebuffers: Vec<FramebufferId> = self.targets.iter().map(|t| t.framebuffer).collect();
        graphics.delete_textures(&textures);
        graphics.delete_framebuffers(&framebuffers);

        self.targets.clear();
    }

    /// Drops the handles without touching the GPU. Used when the context is gone.
    pub fn forget(&mut self) {
        self.targets.clear();
    }

    pub fn get(&self, index: usize) -> Option<&RenderTarget> {
        self.targets.get(index)
    }

    pub fn texture(&self, index: usize) -> Option<TextureId> {
        self.get(index).map(|t| t.texture)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
