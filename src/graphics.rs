use std::ffi::{c_void, CString};

use gl::types::{GLchar, GLenum, GLint, GLsizei, GLuint};

use crate::capture::quad::QuadVertices;

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        pub struct $name(pub u32);

        impl $name {
            /// Zero is never a live object name.
            pub fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

gl_handle!(
    /// Name of a 2D texture object.
    TextureId
);
gl_handle!(
    /// Name of a framebuffer object.
    FramebufferId
);
gl_handle!(
    /// Name of a linked shader program.
    ProgramId
);
gl_handle!(VertexArrayId);
gl_handle!(BufferId);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One full-screen blit: sample `source` through `program` into `target`.
#[derive(Clone, Copy, Debug)]
pub struct BlitCall {
    pub target: FramebufferId,
    pub program: ProgramId,
    pub sampler: i32,
    pub texture_unit: u32,
    pub source: TextureId,
    pub vertex_array: VertexArrayId,
}

/// The slice of a rendering context the capture pipeline needs.
///
/// Every call assumes the context is current on the calling thread. Only
/// [`Graphics::has_current_context`] may be called without one.
pub trait Graphics {
    fn has_current_context(&self) -> bool;

    /// Allocates an uninitialized 4-channel 8-bit texture with linear
    /// filtering and clamp-to-edge wrapping.
    fn create_texture(&self, width: u32, height: u32) -> TextureId;
    /// Applies linear filtering and clamp-to-edge wrapping to an existing texture.
    fn set_sampling(&self, texture: TextureId);
    fn texture_size(&self, texture: TextureId) -> (u32, u32);
    fn delete_textures(&self, textures: &[TextureId]);

    /// Creates a framebuffer with `color` on attachment 0. The boolean is
    /// `false` if the framebuffer is incomplete; the object exists either way.
    fn create_framebuffer(&self, color: TextureId) -> (FramebufferId, bool);
    fn delete_framebuffers(&self, framebuffers: &[FramebufferId]);

    /// Compiles and links a vertex/fragment pair. The error carries the info log.
    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, String>;
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32>;
    fn delete_program(&self, program: ProgramId);

    fn upload_quad(&self, quad: &QuadVertices) -> (VertexArrayId, BufferId);
    fn delete_quad(&self, vertex_array: VertexArrayId, buffer: BufferId);

    fn viewport(&self) -> Viewport;
    fn set_viewport(&self, viewport: Viewport);
    fn draw_quad(&self, blit: &BlitCall);
    /// Blocks until all submitted GPU work has completed.
    fn finish(&self);

    /// Reads back the color attachment of `framebuffer` as bottom-up RGBA8 rows.
    fn read_pixels(&self, framebuffer: FramebufferId, width: u32, height: u32) -> Vec<u8>;
}

/// [`Graphics`] over the process-wide OpenGL function table of the `gl` crate.
#[derive(Clone, Copy, Debug)]
pub struct OpenGl {
    is_current: fn() -> bool,
}
impl OpenGl {
    /// Loads the GL function table through `loader` and returns a backend
    /// that asks `is_current` whether a context is current.
    pub fn load_with<F>(loader: F, is_current: fn() -> bool) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        Self { is_current }
    }

    unsafe fn apply_sampling() {
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MAG_FILTER, gl::LINEAR as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_MIN_FILTER, gl::LINEAR as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_S, gl::CLAMP_TO_EDGE as GLint);
        gl::TexParameteri(gl::TEXTURE_2D, gl::TEXTURE_WRAP_T, gl::CLAMP_TO_EDGE as GLint);
    }

    fn compile_shader(kind: GLenum, source: &str) -> Result<GLuint, String> {
        let source = CString::new(source).map_err(|e| e.to_string())?;

        unsafe {
            let shader = gl::CreateShader(kind);
            gl::ShaderSource(shader, 1, &source.as_ptr(), std::ptr::null());
            gl::CompileShader(shader);

            let mut status = 0;
            gl::GetShaderiv(shader, gl::COMPILE_STATUS, &mut status);
            if status == gl::FALSE as GLint {
                let mut len = 0;
                gl::GetShaderiv(shader, gl::INFO_LOG_LENGTH, &mut len);
                let mut log = vec![0u8; len.max(1) as usize];
                gl::GetShaderInfoLog(shader, len, std::ptr::null_mut(), log.as_mut_ptr() as *mut GLchar);
                gl::DeleteShader(shader);

                return Err(String::from_utf8_lossy(&log).trim_end_matches('\0').to_string());
            }

            Ok(shader)
        }
    }
}

impl Graphics for OpenGl {
    fn has_current_context(&self) -> bool {
        (self.is_current)()
    }

    fn create_texture(&self, width: u32, height: u32) -> TextureId {
        let mut texture = 0;
        unsafe {
            gl::GenTextures(1, &mut texture);
            gl::BindTexture(gl::TEXTURE_2D, texture);

            // Unsized RGBA: the sized RGBA8 format conflicts with encoders that
            // share the same surface.
            gl::TexImage2D(
                gl::TEXTURE_2D,
                0,
                gl::RGBA as GLint,
                width as GLsizei,
                height as GLsizei,
                0,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                std::ptr::null(),
            );
            Self::apply_sampling();

            gl::BindTexture(gl::TEXTURE_2D, 0);
        }

        TextureId(texture)
    }

    fn set_sampling(&self, texture: TextureId) {
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, texture.0);
            Self::apply_sampling();
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }
    }

    fn texture_size(&self, texture: TextureId) -> (u32, u32) {
        let (mut width, mut height) = (0, 0);
        unsafe {
            gl::BindTexture(gl::TEXTURE_2D, texture.0);
            gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_WIDTH, &mut width);
            gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_HEIGHT, &mut height);
            gl::BindTexture(gl::TEXTURE_2D, 0);
        }

        (width.max(0) as u32, height.max(0) as u32)
    }

    fn delete_textures(&self, textures: &[TextureId]) {
        let names: Vec<GLuint> = textures.iter().map(|t| t.0).collect();
        unsafe {
            gl::DeleteTextures(names.len() as GLsizei, names.as_ptr());
        }
    }

    fn create_framebuffer(&self, color: TextureId) -> (FramebufferId, bool) {
        let mut framebuffer = 0;
        let complete = unsafe {
            gl::GenFramebuffers(1, &mut framebuffer);
            gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer);
            gl::FramebufferTexture2D(gl::FRAMEBUFFER, gl::COLOR_ATTACHMENT0, gl::TEXTURE_2D, color.0, 0);

            let status = gl::CheckFramebufferStatus(gl::FRAMEBUFFER);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);

            status == gl::FRAMEBUFFER_COMPLETE
        };

        (FramebufferId(framebuffer), complete)
    }

    fn delete_framebuffers(&self, framebuffers: &[FramebufferId]) {
        let names: Vec<GLuint> = framebuffers.iter().map(|f| f.0).collect();
        unsafe {
            gl::DeleteFramebuffers(names.len() as GLsizei, names.as_ptr());
        }
    }

    fn compile_program(&self, vertex: &str, fragment: &str) -> Result<ProgramId, String> {
        let vs = Self::compile_shader(gl::VERTEX_SHADER, vertex)?;
        let fs = match Self::compile_shader(gl::FRAGMENT_SHADER, fragment) {
            Ok(fs) => fs,
            Err(e) => {
                unsafe { gl::DeleteShader(vs) };
                return Err(e);
            }
        };

        unsafe {
            let program = gl::CreateProgram();
            gl::AttachShader(program, vs);
            gl::AttachShader(program, fs);
            gl::LinkProgram(program);
            gl::DeleteShader(vs);
            gl::DeleteShader(fs);

            let mut status = 0;
            gl::GetProgramiv(program, gl::LINK_STATUS, &mut status);
            if status == gl::FALSE as GLint {
                let mut len = 0;
                gl::GetProgramiv(program, gl::INFO_LOG_LENGTH, &mut len);
                let mut log = vec![0u8; len.max(1) as usize];
                gl::GetProgramInfoLog(program, len, std::ptr::null_mut(), log.as_mut_ptr() as *mut GLchar);
                gl::DeleteProgram(program);

                return Err(String::from_utf8_lossy(&log).trim_end_matches('\0').to_string());
            }

            Ok(ProgramId(program))
        }
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<i32> {
        let name = CString::new(name).ok()?;
        let location = unsafe { gl::GetUniformLocation(program.0, name.as_ptr()) };

        (location >= 0).then_some(location)
    }

    fn delete_program(&self, program: ProgramId) {
        unsafe { gl::DeleteProgram(program.0) };
    }

    fn upload_quad(&self, quad: &QuadVertices) -> (VertexArrayId, BufferId) {
        let data = quad.to_buffer();
        let (mut vertex_array, mut buffer) = (0, 0);

        unsafe {
            gl::GenVertexArrays(1, &mut vertex_array);
            gl::BindVertexArray(vertex_array);

            gl::GenBuffers(1, &mut buffer);
            gl::BindBuffer(gl::ARRAY_BUFFER, buffer);
            gl::BufferData(
                gl::ARRAY_BUFFER,
                std::mem::size_of_val(&data) as isize,
                data.as_ptr() as *const c_void,
                gl::STATIC_DRAW,
            );

            gl::EnableVertexAttribArray(QuadVertices::POSITION_LOCATION);
            gl::EnableVertexAttribArray(QuadVertices::TEX_COORD_LOCATION);
            gl::VertexAttribPointer(QuadVertices::POSITION_LOCATION, 4, gl::FLOAT, gl::FALSE, 0, std::ptr::null());
            gl::VertexAttribPointer(
                QuadVertices::TEX_COORD_LOCATION,
                2,
                gl::FLOAT,
                gl::FALSE,
                0,
                QuadVertices::TEX_COORD_OFFSET as *const c_void,
            );

            gl::BindBuffer(gl::ARRAY_BUFFER, 0);
            gl::BindVertexArray(0);
        }

        (VertexArrayId(vertex_array), BufferId(buffer))
    }

    fn delete_quad(&self, vertex_array: VertexArrayId, buffer: BufferId) {
        unsafe {
            gl::DeleteBuffers(1, &buffer.0);
            gl::DeleteVertexArrays(1, &vertex_array.0);
        }
    }

    fn viewport(&self) -> Viewport {
        let mut vp = [0 as GLint; 4];
        unsafe { gl::GetIntegerv(gl::VIEWPORT, vp.as_mut_ptr()) };

        Viewport { x: vp[0], y: vp[1], width: vp[2], height: vp[3] }
    }

    fn set_viewport(&self, viewport: Viewport) {
        unsafe { gl::Viewport(viewport.x, viewport.y, viewport.width, viewport.height) };
    }

    fn draw_quad(&self, blit: &BlitCall) {
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, blit.target.0);
            gl::UseProgram(blit.program.0);

            gl::ActiveTexture(gl::TEXTURE0 + blit.texture_unit);
            gl::BindTexture(gl::TEXTURE_2D, blit.source.0);
            gl::Uniform1i(blit.sampler, blit.texture_unit as GLint);

            gl::BindVertexArray(blit.vertex_array.0);
            gl::DrawArrays(gl::TRIANGLE_STRIP, 0, 4);
            gl::BindVertexArray(0);

            gl::UseProgram(0);
            gl::BindTexture(gl::TEXTURE_2D, 0);
            gl::ActiveTexture(gl::TEXTURE0);
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }
    }

    fn finish(&self) {
        unsafe { gl::Finish() };
    }

    fn read_pixels(&self, framebuffer: FramebufferId, width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0u8; rgba_len(width, height)];
        unsafe {
            gl::BindFramebuffer(gl::FRAMEBUFFER, framebuffer.0);
            gl::PixelStorei(gl::PACK_ALIGNMENT, 1);
            gl::ReadPixels(
                0,
                0,
                width as GLsizei,
                height as GLsizei,
                gl::RGBA,
                gl::UNSIGNED_BYTE,
                data.as_mut_ptr() as *mut c_void,
            );
            gl::BindFramebuffer(gl::FRAMEBUFFER, 0);
        }

        data
    }
}

/// Byte length of a tightly packed RGBA8 image.
fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 4
}
