use crate::graphics::{BlitCall, FramebufferId, Graphics, ProgramId, TextureId, VertexArrayId};

use super::CaptureError;

pub const VERTEX_SHADER: &str = r#"#version 330 core

layout(location = 0) in vec4 inVertex;
layout(location = 4) in vec2 inTexCoord;

out vec2 texCoord;

void main(void)
{
    gl_Position = inVertex;
    texCoord    = inTexCoord;
}
"#;

pub const FRAGMENT_SHADER: &str = r#"#version 330 core

uniform sampler2D baseMap;

in vec2 texCoord;
out vec4 fragColor;

void main(void)
{
    vec4 texColor = texture(baseMap, texCoord);

    fragColor = vec4(texColor.rgb, 1.0);
}
"#;

pub const SAMPLER_NAME: &str = "baseMap";

/// Texture unit the desktop is bound to while blitting.
pub const DESKTOP_TEXTURE_UNIT: u32 = 1;

/// Pass-through program that copies a sampled texture into the bound target.
#[derive(Debug)]
pub struct BlitProgram {
    program: ProgramId,
    sampler: i32,
}
impl BlitProgram {
    pub fn new<G: Graphics>(graphics: &G) -> Result<Self, CaptureError> {
        let program = graphics
            .compile_program(VERTEX_SHADER, FRAGMENT_SHADER)
            .map_err(|log| CaptureError::GraphicsSetupFailed(format!("blit program: {}", log)))?;

        let sampler = match graphics.uniform_location(program, SAMPLER_NAME) {
            Some(location) => location,
            None => {
                graphics.delete_program(program);
                let reason = format!("blit program has no `{}` uniform", SAMPLER_NAME);
                return Err(CaptureError::GraphicsSetupFailed(reason));
            }
        };

        Ok(Self { program, sampler })
    }

    pub fn draw<G: Graphics>(
        &self,
        graphics: &G,
        source: TextureId,
        target: FramebufferId,
        vertex_array: VertexArrayId,
    ) {
        graphics.draw_quad(&BlitCall {
            target,
            program: self.program,
            sampler: self.sampler,
            texture_unit: DESKTOP_TEXTURE_UNIT,
            source,
            vertex_array,
        });
    }

    pub fn destroy<G: Graphics>(self, graphics: &G) {
        graphics.delete_program(self.program);
    }
}
