//! Trait abstracting the WebGL function table.

use crate::gl_types::*;

/// The subset of the WebGL 1 / GLES 2 API the renderer drives.
///
/// Methods take `&self` and return owned handles, so the trait is object safe
/// and one context can be shared through an `Arc<dyn GlContext>`. Mock
/// implementations record calls through interior mutability.
///
/// A context and every handle it hands out belong to one renderer; handles
/// are meaningless on any other context.
///
/// # Example
///
/// ```rust
/// use lumen_test_utils::{BufferTarget, BufferUsage, GlContext};
///
/// fn upload(gl: &dyn GlContext, bytes: &[u8]) {
///     if let Ok(buffer) = gl.create_buffer() {
///         gl.bind_buffer(BufferTarget::Array, Some(buffer));
///         gl.buffer_data(BufferTarget::Array, bytes, BufferUsage::StaticDraw);
///     }
/// }
/// ```
pub trait GlContext {
    // Buffers

    fn create_buffer(&self) -> Result<GlBuffer, GlError>;
    fn delete_buffer(&self, buffer: GlBuffer);
    fn bind_buffer(&self, target: BufferTarget, buffer: Option<GlBuffer>);
    /// Replaces the contents of the buffer bound to `target`.
    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage);

    // Shaders and programs

    fn create_shader(&self, stage: ShaderStage) -> Result<GlShader, GlError>;
    fn shader_source(&self, shader: GlShader, source: &str);
    fn compile_shader(&self, shader: GlShader);
    fn shader_compile_status(&self, shader: GlShader) -> bool;
    fn shader_info_log(&self, shader: GlShader) -> String;
    fn delete_shader(&self, shader: GlShader);

    fn create_program(&self) -> Result<GlProgram, GlError>;
    fn attach_shader(&self, program: GlProgram, shader: GlShader);
    fn link_program(&self, program: GlProgram);
    fn program_link_status(&self, program: GlProgram) -> bool;
    fn program_info_log(&self, program: GlProgram) -> String;
    fn use_program(&self, program: Option<GlProgram>);
    fn delete_program(&self, program: GlProgram);

    // Introspection

    fn active_attribute_count(&self, program: GlProgram) -> u32;
    fn active_attribute(&self, program: GlProgram, index: u32) -> Option<ActiveInfo>;
    fn attrib_location(&self, program: GlProgram, name: &str) -> Option<u32>;
    fn active_uniform_count(&self, program: GlProgram) -> u32;
    fn active_uniform(&self, program: GlProgram, index: u32) -> Option<ActiveInfo>;
    fn uniform_location(&self, program: GlProgram, name: &str) -> Option<UniformLocation>;

    /// Uploads a uniform to the program currently in use.
    fn uniform(&self, location: UniformLocation, value: UniformUpload<'_>);

    // Vertex attributes and draws

    fn enable_vertex_attrib_array(&self, index: u32);
    fn disable_vertex_attrib_array(&self, index: u32);
    /// Points attribute `index` at tightly packed `f32` data in the bound array buffer.
    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, normalized: bool, stride: i32, offset: i32);
    fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32);
    fn draw_elements(&self, mode: DrawMode, count: i32, index_type: IndexType, offset: i32);

    // Textures

    fn create_texture(&self) -> Result<GlTexture, GlError>;
    fn delete_texture(&self, texture: GlTexture);
    /// Selects texture unit `unit` (0-based).
    fn active_texture(&self, unit: u32);
    fn bind_texture_2d(&self, texture: Option<GlTexture>);
    /// Uploads tightly packed RGBA8 pixels to the bound 2D texture.
    fn tex_image_2d_rgba(&self, width: u32, height: u32, pixels: &[u8]);
    fn tex_parameters(&self, filter: TextureFilter, wrap: TextureWrap);
    fn pixel_store_unpack_alignment(&self, alignment: i32);

    // Fixed-function state

    fn enable(&self, capability: Capability);
    fn disable(&self, capability: Capability);
    fn is_enabled(&self, capability: Capability) -> bool;
    fn depth_func(&self, func: DepthFunc);
    fn depth_mask(&self, write: bool);
    fn blend_equation_separate(&self, rgb: BlendEquation, alpha: BlendEquation);
    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    );
    fn viewport(&self, x: i32, y: i32, width: i32, height: i32);
    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32);
    fn clear(&self, mask: ClearMask);

    // Context

    fn supports_extension(&self, name: &str) -> bool;
    fn is_context_lost(&self) -> bool;

    fn blend_equation(&self, equation: BlendEquation) {
        self.blend_equation_separate(equation, equation);
    }

    fn blend_func(&self, src: BlendFactor, dst: BlendFactor) {
        self.blend_func_separate(src, dst, src, dst);
    }
}
