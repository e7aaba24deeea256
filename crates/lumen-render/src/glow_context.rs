//! [`GlContext`] over a real OpenGL ES 2 / WebGL 1 context through `glow`.
//!
//! glow's object types differ between native and web targets, so they are
//! kept in id maps and only the small `Copy` handles cross into the
//! renderer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use glow::HasContext;
use lumen_test_utils::{
    ActiveInfo, BlendEquation, BlendFactor, BufferTarget, BufferUsage, Capability, ClearMask,
    DepthFunc, DrawMode, GlBuffer, GlContext, GlError, GlProgram, GlShader, GlTexture, IndexType,
    ShaderStage, TextureFilter, TextureWrap, UniformLocation, UniformUpload,
};
use parking_lot::Mutex;

struct Objects<T> {
    next: u32,
    items: HashMap<u32, T>,
}

impl<T: Clone> Objects<T> {
    fn new() -> Self {
        Self {
            next: 1,
            items: HashMap::new(),
        }
    }

    fn insert(&mut self, item: T) -> u32 {
        let id = self.next;
        self.next += 1;
        self.items.insert(id, item);
        id
    }

    fn get(&self, id: u32) -> Option<T> {
        self.items.get(&id).cloned()
    }

    fn remove(&mut self, id: u32) -> Option<T> {
        self.items.remove(&id)
    }
}

#[derive(Default)]
struct Locations {
    ids: HashMap<(u32, String), u32>,
    objects: Vec<glow::UniformLocation>,
}

/// A `GlContext` backed by a `glow::Context` that is current on this thread.
pub struct GlowContext {
    gl: glow::Context,
    buffers: Mutex<Objects<glow::Buffer>>,
    shaders: Mutex<Objects<glow::Shader>>,
    programs: Mutex<Objects<glow::Program>>,
    textures: Mutex<Objects<glow::Texture>>,
    locations: Mutex<Locations>,
    lost: AtomicBool,
}

impl GlowContext {
    /// Wraps `gl`. The context must stay current for the lifetime of the
    /// returned value.
    pub fn new(gl: glow::Context) -> Self {
        tracing::debug!(
            "glow context with {} extensions",
            gl.supported_extensions().len()
        );
        Self {
            gl,
            buffers: Mutex::new(Objects::new()),
            shaders: Mutex::new(Objects::new()),
            programs: Mutex::new(Objects::new()),
            textures: Mutex::new(Objects::new()),
            locations: Mutex::new(Locations::default()),
            lost: AtomicBool::new(false),
        }
    }

    /// Records that the host saw the context go away.
    pub fn mark_context_lost(&self) {
        self.lost.store(true, Ordering::Relaxed);
    }

    pub fn raw(&self) -> &glow::Context {
        &self.gl
    }

    fn buffer(&self, buffer: GlBuffer) -> Option<glow::Buffer> {
        self.buffers.lock().get(buffer.0)
    }

    fn shader(&self, shader: GlShader) -> Option<glow::Shader> {
        self.shaders.lock().get(shader.0)
    }

    fn program(&self, program: GlProgram) -> Option<glow::Program> {
        self.programs.lock().get(program.0)
    }

    fn texture(&self, texture: GlTexture) -> Option<glow::Texture> {
        self.textures.lock().get(texture.0)
    }
}

fn buffer_target(target: BufferTarget) -> u32 {
    match target {
        BufferTarget::Array => glow::ARRAY_BUFFER,
        BufferTarget::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
    }
}

fn draw_mode(mode: DrawMode) -> u32 {
    match mode {
        DrawMode::Points => glow::POINTS,
        DrawMode::Lines => glow::LINES,
        DrawMode::LineStrip => glow::LINE_STRIP,
        DrawMode::LineLoop => glow::LINE_LOOP,
        DrawMode::Triangles => glow::TRIANGLES,
        DrawMode::TriangleStrip => glow::TRIANGLE_STRIP,
        DrawMode::TriangleFan => glow::TRIANGLE_FAN,
    }
}

fn capability(capability: Capability) -> u32 {
    match capability {
        Capability::Blend => glow::BLEND,
        Capability::DepthTest => glow::DEPTH_TEST,
        Capability::CullFace => glow::CULL_FACE,
    }
}

fn blend_equation(equation: BlendEquation) -> u32 {
    match equation {
        BlendEquation::Add => glow::FUNC_ADD,
        BlendEquation::Subtract => glow::FUNC_SUBTRACT,
        BlendEquation::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
        BlendEquation::Min => glow::MIN,
        BlendEquation::Max => glow::MAX,
    }
}

fn blend_factor(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::Zero => glow::ZERO,
        BlendFactor::One => glow::ONE,
        BlendFactor::SrcColor => glow::SRC_COLOR,
        BlendFactor::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
        BlendFactor::DstColor => glow::DST_COLOR,
        BlendFactor::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
        BlendFactor::SrcAlpha => glow::SRC_ALPHA,
        BlendFactor::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
        BlendFactor::DstAlpha => glow::DST_ALPHA,
        BlendFactor::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
    }
}

impl GlContext for GlowContext {
    fn create_buffer(&self) -> Result<GlBuffer, GlError> {
        let buffer = unsafe { self.gl.create_buffer() }.map_err(GlError)?;
        Ok(GlBuffer(self.buffers.lock().insert(buffer)))
    }

    fn delete_buffer(&self, buffer: GlBuffer) {
        if let Some(buffer) = self.buffers.lock().remove(buffer.0) {
            unsafe { self.gl.delete_buffer(buffer) };
        }
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<GlBuffer>) {
        let buffer = buffer.and_then(|b| self.buffer(b));
        unsafe { self.gl.bind_buffer(buffer_target(target), buffer) };
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let usage = match usage {
            BufferUsage::StaticDraw => glow::STATIC_DRAW,
            BufferUsage::DynamicDraw => glow::DYNAMIC_DRAW,
        };
        unsafe { self.gl.buffer_data_u8_slice(buffer_target(target), data, usage) };
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<GlShader, GlError> {
        let kind = match stage {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        };
        let shader = unsafe { self.gl.create_shader(kind) }.map_err(GlError)?;
        Ok(GlShader(self.shaders.lock().insert(shader)))
    }

    fn shader_source(&self, shader: GlShader, source: &str) {
        if let Some(shader) = self.shader(shader) {
            unsafe { self.gl.shader_source(shader, source) };
        }
    }

    fn compile_shader(&self, shader: GlShader) {
        if let Some(shader) = self.shader(shader) {
            unsafe { self.gl.compile_shader(shader) };
        }
    }

    fn shader_compile_status(&self, shader: GlShader) -> bool {
        self.shader(shader)
            .is_some_and(|s| unsafe { self.gl.get_shader_compile_status(s) })
    }

    fn shader_info_log(&self, shader: GlShader) -> String {
        self.shader(shader)
            .map(|s| unsafe { self.gl.get_shader_info_log(s) })
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: GlShader) {
        if let Some(shader) = self.shaders.lock().remove(shader.0) {
            unsafe { self.gl.delete_shader(shader) };
        }
    }

    fn create_program(&self) -> Result<GlProgram, GlError> {
        let program = unsafe { self.gl.create_program() }.map_err(GlError)?;
        Ok(GlProgram(self.programs.lock().insert(program)))
    }

    fn attach_shader(&self, program: GlProgram, shader: GlShader) {
        if let (Some(program), Some(shader)) = (self.program(program), self.shader(shader)) {
            unsafe { self.gl.attach_shader(program, shader) };
        }
    }

    fn link_program(&self, program: GlProgram) {
        if let Some(program) = self.program(program) {
            unsafe { self.gl.link_program(program) };
        }
    }

    fn program_link_status(&self, program: GlProgram) -> bool {
        self.program(program)
            .is_some_and(|p| unsafe { self.gl.get_program_link_status(p) })
    }

    fn program_info_log(&self, program: GlProgram) -> String {
        self.program(program)
            .map(|p| unsafe { self.gl.get_program_info_log(p) })
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<GlProgram>) {
        let program = program.and_then(|p| self.program(p));
        unsafe { self.gl.use_program(program) };
    }

    fn delete_program(&self, program: GlProgram) {
        if let Some(native) = self.programs.lock().remove(program.0) {
            unsafe { self.gl.delete_program(native) };
        }
        self.locations
            .lock()
            .ids
            .retain(|(owner, _), _| *owner != program.0);
    }

    fn active_attribute_count(&self, program: GlProgram) -> u32 {
        self.program(program)
            .map_or(0, |p| unsafe { self.gl.get_active_attributes(p) })
    }

    fn active_attribute(&self, program: GlProgram, index: u32) -> Option<ActiveInfo> {
        let program = self.program(program)?;
        let info = unsafe { self.gl.get_active_attribute(program, index) }?;
        Some(ActiveInfo {
            name: info.name,
            size: info.size,
            kind: info.atype,
        })
    }

    fn attrib_location(&self, program: GlProgram, name: &str) -> Option<u32> {
        let program = self.program(program)?;
        unsafe { self.gl.get_attrib_location(program, name) }
    }

    fn active_uniform_count(&self, program: GlProgram) -> u32 {
        self.program(program)
            .map_or(0, |p| unsafe { self.gl.get_active_uniforms(p) })
    }

    fn active_uniform(&self, program: GlProgram, index: u32) -> Option<ActiveInfo> {
        let program = self.program(program)?;
        let info = unsafe { self.gl.get_active_uniform(program, index) }?;
        Some(ActiveInfo {
            name: info.name,
            size: info.size,
            kind: info.utype,
        })
    }

    fn uniform_location(&self, program: GlProgram, name: &str) -> Option<UniformLocation> {
        let key = (program.0, name.to_string());
        if let Some(&id) = self.locations.lock().ids.get(&key) {
            return Some(UniformLocation(id));
        }
        let native = self.program(program)?;
        let location = unsafe { self.gl.get_uniform_location(native, name) }?;
        let mut locations = self.locations.lock();
        locations.objects.push(location);
        let id = (locations.objects.len() - 1) as u32;
        locations.ids.insert(key, id);
        Some(UniformLocation(id))
    }

    fn uniform(&self, location: UniformLocation, value: UniformUpload<'_>) {
        let locations = self.locations.lock();
        let Some(loc) = locations.objects.get(location.0 as usize) else {
            return;
        };
        let loc = Some(loc);
        unsafe {
            match value {
                UniformUpload::Int(v) => self.gl.uniform_1_i32(loc, v),
                UniformUpload::IntVec { components, values: [x, y, z, w] } => match components {
                    2 => self.gl.uniform_2_i32(loc, x, y),
                    3 => self.gl.uniform_3_i32(loc, x, y, z),
                    4 => self.gl.uniform_4_i32(loc, x, y, z, w),
                    _ => self.gl.uniform_1_i32(loc, x),
                },
                UniformUpload::IntArray { components, data } => match components {
                    2 => self.gl.uniform_2_i32_slice(loc, data),
                    3 => self.gl.uniform_3_i32_slice(loc, data),
                    4 => self.gl.uniform_4_i32_slice(loc, data),
                    _ => self.gl.uniform_1_i32_slice(loc, data),
                },
                UniformUpload::Float(v) => self.gl.uniform_1_f32(loc, v),
                UniformUpload::FloatVec { components, values: [x, y, z, w] } => match components {
                    2 => self.gl.uniform_2_f32(loc, x, y),
                    3 => self.gl.uniform_3_f32(loc, x, y, z),
                    4 => self.gl.uniform_4_f32(loc, x, y, z, w),
                    _ => self.gl.uniform_1_f32(loc, x),
                },
                UniformUpload::FloatArray { components, data } => match components {
                    2 => self.gl.uniform_2_f32_slice(loc, data),
                    3 => self.gl.uniform_3_f32_slice(loc, data),
                    4 => self.gl.uniform_4_f32_slice(loc, data),
                    _ => self.gl.uniform_1_f32_slice(loc, data),
                },
                UniformUpload::Matrix2(data) => self.gl.uniform_matrix_2_f32_slice(loc, false, data),
                UniformUpload::Matrix3(data) => self.gl.uniform_matrix_3_f32_slice(loc, false, data),
                UniformUpload::Matrix4(data) => self.gl.uniform_matrix_4_f32_slice(loc, false, data),
            }
        }
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.enable_vertex_attrib_array(index) };
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        unsafe { self.gl.disable_vertex_attrib_array(index) };
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, normalized: bool, stride: i32, offset: i32) {
        unsafe {
            self.gl
                .vertex_attrib_pointer_f32(index, size, glow::FLOAT, normalized, stride, offset)
        };
    }

    fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32) {
        unsafe { self.gl.draw_arrays(draw_mode(mode), first, count) };
    }

    fn draw_elements(&self, mode: DrawMode, count: i32, index_type: IndexType, offset: i32) {
        let element = match index_type {
            IndexType::U16 => glow::UNSIGNED_SHORT,
            IndexType::U32 => glow::UNSIGNED_INT,
        };
        unsafe { self.gl.draw_elements(draw_mode(mode), count, element, offset) };
    }

    fn create_texture(&self) -> Result<GlTexture, GlError> {
        let texture = unsafe { self.gl.create_texture() }.map_err(GlError)?;
        Ok(GlTexture(self.textures.lock().insert(texture)))
    }

    fn delete_texture(&self, texture: GlTexture) {
        if let Some(texture) = self.textures.lock().remove(texture.0) {
            unsafe { self.gl.delete_texture(texture) };
        }
    }

    fn active_texture(&self, unit: u32) {
        unsafe { self.gl.active_texture(glow::TEXTURE0 + unit) };
    }

    fn bind_texture_2d(&self, texture: Option<GlTexture>) {
        let texture = texture.and_then(|t| self.texture(t));
        unsafe { self.gl.bind_texture(glow::TEXTURE_2D, texture) };
    }

    fn tex_image_2d_rgba(&self, width: u32, height: u32, pixels: &[u8]) {
        unsafe {
            self.gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::RGBA as i32,
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(pixels)),
            )
        };
    }

    fn tex_parameters(&self, filter: TextureFilter, wrap: TextureWrap) {
        let filter = match filter {
            TextureFilter::Nearest => glow::NEAREST,
            TextureFilter::Linear => glow::LINEAR,
        } as i32;
        let wrap = match wrap {
            TextureWrap::ClampToEdge => glow::CLAMP_TO_EDGE,
            TextureWrap::Repeat => glow::REPEAT,
            TextureWrap::MirroredRepeat => glow::MIRRORED_REPEAT,
        } as i32;
        unsafe {
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, filter);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, filter);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, wrap);
            self.gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, wrap);
        }
    }

    fn pixel_store_unpack_alignment(&self, alignment: i32) {
        unsafe { self.gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, alignment) };
    }

    fn enable(&self, cap: Capability) {
        unsafe { self.gl.enable(capability(cap)) };
    }

    fn disable(&self, cap: Capability) {
        unsafe { self.gl.disable(capability(cap)) };
    }

    fn is_enabled(&self, cap: Capability) -> bool {
        unsafe { self.gl.is_enabled(capability(cap)) }
    }

    fn depth_func(&self, func: DepthFunc) {
        let func = match func {
            DepthFunc::Less => glow::LESS,
            DepthFunc::LessEqual => glow::LEQUAL,
            DepthFunc::Always => glow::ALWAYS,
        };
        unsafe { self.gl.depth_func(func) };
    }

    fn depth_mask(&self, write: bool) {
        unsafe { self.gl.depth_mask(write) };
    }

    fn blend_equation_separate(&self, rgb: BlendEquation, alpha: BlendEquation) {
        unsafe {
            self.gl
                .blend_equation_separate(blend_equation(rgb), blend_equation(alpha))
        };
    }

    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        unsafe {
            self.gl.blend_func_separate(
                blend_factor(src_rgb),
                blend_factor(dst_rgb),
                blend_factor(src_alpha),
                blend_factor(dst_alpha),
            )
        };
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        unsafe { self.gl.viewport(x, y, width, height) };
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        unsafe { self.gl.clear_color(r, g, b, a) };
    }

    fn clear(&self, mask: ClearMask) {
        let mut bits = 0;
        if mask.contains(ClearMask::COLOR) {
            bits |= glow::COLOR_BUFFER_BIT;
        }
        if mask.contains(ClearMask::DEPTH) {
            bits |= glow::DEPTH_BUFFER_BIT;
        }
        if mask.contains(ClearMask::STENCIL) {
            bits |= glow::STENCIL_BUFFER_BIT;
        }
        unsafe { self.gl.clear(bits) };
    }

    fn supports_extension(&self, name: &str) -> bool {
        let extensions = self.gl.supported_extensions();
        // desktop GL reports extensions with a GL_ prefix
        extensions.contains(name) || extensions.contains(&format!("GL_{name}"))
    }

    fn is_context_lost(&self) -> bool {
        self.lost.load(Ordering::Relaxed)
    }
}
