use crate::graphics::{BufferId, Graphics, VertexArrayId};

/// Corners of the full-screen triangle strip, rotated about the origin,
/// with the texture coordinates that map the desktop onto them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QuadVertices {
    pub positions: [[f32; 4]; 4],
    pub tex_coords: [[f32; 2]; 4],
}
impl QuadVertices {
    pub const POSITION_LOCATION: u32 = 0;
    pub const TEX_COORD_LOCATION: u32 = 4;
    /// Byte offset of the texture coordinates inside [`QuadVertices::to_buffer`].
    pub const TEX_COORD_OFFSET: usize = 16 * std::mem::size_of::<f32>();

    /// Strip order is top-left, bottom-left, top-right, bottom-right before rotation.
    pub fn rotated(degrees: f32) -> Self {
        let phi = degrees.to_radians();
        let (sin, cos) = phi.sin_cos();

        Self {
            positions: [
                [-cos - sin, -sin + cos, 0.0, 1.0],
                [-cos + sin, -sin - cos, 0.0, 1.0],
                [cos - sin, sin + cos, 0.0, 1.0],
                [cos + sin, sin - cos, 0.0, 1.0],
            ],
            tex_coords: [[0.0, 1.0], [0.0, 0.0], [1.0, 1.0], [1.0, 0.0]],
        }
    }

    /// Positions followed by texture coordinates, as uploaded to the vertex buffer.
    pub fn to_buffer(&self) -> [f32; 24] {
        let mut data = [0.0; 24];
        for (i, p) in self.positions.iter().enumerate() {
            data[i * 4..i * 4 + 4].copy_from_slice(p);
        }
        for (i, t) in self.tex_coords.iter().enumerate() {
            data[16 + i * 2..16 + i * 2 + 2].copy_from_slice(t);
        }

        data
    }
}

/// Uploaded quad. Rotation is fixed for the lifetime of the session.
#[derive(Debug)]
pub struct QuadGeometry {
    pub vertex_array: VertexArrayId,
    pub buffer: BufferId,
    pub rotation_radians: f32,
}
impl QuadGeometry {
    pub fn new<G: Graphics>(graphics: &G, rotation_degrees: f32) -> Self {
        let (vertex_array, buffer) = graphics.upload_quad(&QuadVertices::rotated(rotation_degrees));

        Self {
            vertex_array,
            buffer,
            rotation_radians: rotation_degrees.to_radians(),
        }
    }

    pub fn destroy<G: Graphics>(self, graphics: &G) {
        graphics.delete_quad(self.vertex_array, self.buffer);
    }
}
