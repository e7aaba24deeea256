//! The WebGL-style 3D renderer.
//!
//! A [`Renderer`] owns everything tied to one GL context: the retained
//! geometry cache, built-in and user shaders, textures and streaming buffers
//! for immediate mode. Drawing state lives in a [`RenderState`] stack; every
//! draw reads the current state, picks its programs through the selector,
//! and leaves no program bound when it returns.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lumen_render::{Color, Renderer, RendererDescriptor};
//! use lumen_test_utils::MockGlContext;
//!
//! let gl = Arc::new(MockGlContext::new());
//! let mut renderer = Renderer::new(gl.clone(), RendererDescriptor::new().with_size(200, 200)).unwrap();
//!
//! renderer.begin_frame();
//! renderer.background(Color::gray(200.0));
//! renderer.fill(Color::RED);
//! renderer.draw_box(50.0, 50.0, 50.0).unwrap();
//! assert_eq!(gl.count_draw_calls(), 2); // stroke, then fill
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use lumen_core::alloc::HashMap;
use lumen_core::math::{Matrix3, Matrix4, Vector3};
use lumen_core::profiling::profile_function;
use lumen_geometry::{ArcMode, Geometry, Primitive, ShapeVertex, Tessellator, triangle_transform};
use lumen_test_utils::{BufferTarget, Capability, ClearMask, DepthFunc, DrawMode, GlContext};

use crate::blend::{BlendController, BlendMode};
use crate::builtin::BuiltinShader;
use crate::camera::{Camera, Projection};
use crate::color::Color;
use crate::config::{ContextAttributes, RendererDescriptor};
use crate::error::{RenderError, Result};
use crate::geometry_cache::{CachedGeometry, GeometryCache};
use crate::immediate::{EndMode, FillData, ImmediateBuffers, ShapeBuilder, ShapeMode, VertexArrays};
use crate::render_state::{
    HorizontalAlign, RenderState, RenderTargetState, TextureMode, VerticalAlign,
};
use crate::selector::{
    DrawPath, SelectorInput, ShaderChoice, ShaderId, select_fill, select_point, select_stroke,
};
use crate::shader::Shader;
use crate::texture::{TextureId, TextureOptions, TextureRegistry, TextureSource};

/// Textures and sizes of the packed glyph atlases a glyph reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphAtlas {
    pub strokes: TextureId,
    pub row_strokes: TextureId,
    pub rows: TextureId,
    pub col_strokes: TextureId,
    pub cols: TextureId,
    pub stroke_image_size: [i32; 2],
    pub cells_image_size: [i32; 2],
    pub grid_image_size: [i32; 2],
}

/// One glyph drawn with analytic coverage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphQuad {
    pub atlas: GlyphAtlas,
    /// Glyph bounds in text space: `x1, y1, x2, y2`.
    pub rect: [f32; 4],
    /// Horizontal pen offset.
    pub offset: f32,
    /// Column and row of the glyph's first grid texel.
    pub grid_offset: [i32; 2],
    pub grid_size: [i32; 2],
}

/// Retained and immediate mode 3D renderer over one GL context.
pub struct Renderer {
    gl: Arc<dyn GlContext>,
    attributes: ContextAttributes,
    target: RenderTargetState<RenderState>,
    blend: BlendController,
    cache: GeometryCache,
    textures: TextureRegistry,
    builtins: HashMap<BuiltinShader, Shader>,
    shaders: Vec<Shader>,
    immediate: ImmediateBuffers,
    tessellator: Tessellator,
    shape: Option<ShapeBuilder>,
}

impl Renderer {
    /// Sets up depth testing, the viewport and blending on `gl`.
    pub fn new(gl: Arc<dyn GlContext>, descriptor: RendererDescriptor) -> Result<Self> {
        if gl.is_context_lost() {
            tracing::error!("cannot create a renderer on a lost GL context");
            return Err(RenderError::ContextLost);
        }
        let RendererDescriptor {
            width,
            height,
            pixel_density,
            attributes,
            geometry_cache_capacity,
        } = descriptor;

        let blend = BlendController::new(gl.as_ref());
        if !gl.supports_extension("OES_standard_derivatives") {
            tracing::warn!("OES_standard_derivatives unavailable; text edges will not be antialiased");
        }

        let renderer = Self {
            attributes,
            target: RenderTargetState::new(
                width,
                height,
                pixel_density,
                RenderState::new(width, height),
            ),
            blend,
            cache: GeometryCache::new(Arc::clone(&gl), geometry_cache_capacity),
            textures: TextureRegistry::new(Arc::clone(&gl)),
            builtins: HashMap::new(),
            shaders: Vec::new(),
            immediate: ImmediateBuffers::new(Arc::clone(&gl)),
            tessellator: Tessellator::new(),
            shape: None,
            gl,
        };

        renderer.gl.enable(Capability::DepthTest);
        renderer.gl.depth_func(DepthFunc::LessEqual);
        renderer.apply_viewport();
        renderer.blend.apply(renderer.gl.as_ref());
        tracing::debug!(
            "created renderer {}x{} at density {}",
            width,
            height,
            pixel_density
        );
        Ok(renderer)
    }

    pub fn gl(&self) -> &Arc<dyn GlContext> {
        &self.gl
    }

    pub fn attributes(&self) -> &ContextAttributes {
        &self.attributes
    }

    pub fn width(&self) -> u32 {
        self.target.width()
    }

    pub fn height(&self) -> u32 {
        self.target.height()
    }

    pub fn pixel_density(&self) -> f32 {
        self.target.pixel_density()
    }

    pub fn state(&self) -> &RenderState {
        self.target.current()
    }

    pub fn state_mut(&mut self) -> &mut RenderState {
        self.target.current_mut()
    }

    pub fn geometry_cache(&self) -> &GeometryCache {
        &self.cache
    }

    fn apply_viewport(&self) {
        let (w, h) = self.target.physical_size();
        self.gl.viewport(0, 0, w as i32, h as i32);
    }

    fn viewport(&self) -> [f32; 4] {
        let (w, h) = self.target.physical_size();
        [0.0, 0.0, w as f32, h as f32]
    }

    // Lifecycle

    /// Resizes the surface. The current camera keeps its view and gets a
    /// projection for the new aspect ratio.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.target.resize(width, height);
        self.target.current_mut().camera.resize(width, height);
        self.apply_viewport();
    }

    pub fn set_pixel_density(&mut self, density: f32) {
        self.target.set_pixel_density(density);
        self.apply_viewport();
    }

    /// Starts a frame: resets the model matrix, lights, tint and texture and
    /// clears depth.
    pub fn begin_frame(&mut self) {
        lumen_core::profiling::new_frame();
        if self.shape.take().is_some() {
            tracing::warn!("a shape was still open at the start of the frame; discarding it");
        }
        self.target.current_mut().reset_for_frame();
        self.gl.clear(ClearMask::DEPTH);
        self.blend.apply(self.gl.as_ref());
    }

    /// Clears color and depth to `color`.
    pub fn background(&mut self, color: Color) {
        self.clear(color);
    }

    pub fn clear(&mut self, color: Color) {
        // the surface holds premultiplied alpha
        let [r, g, b, a] = color.to_array();
        self.gl.clear_color(r * a, g * a, b * a, a);
        self.gl.clear(ClearMask::COLOR | ClearMask::DEPTH);
    }

    /// Saves the drawing state.
    pub fn push(&mut self) {
        self.target.push();
    }

    /// Restores the last saved drawing state.
    pub fn pop(&mut self) {
        if self.target.pop() {
            let mode = self.target.current().blend_mode;
            self.blend.set(mode);
        }
    }

    /// Pushes the state and returns a guard that pops it when dropped.
    pub fn push_scope(&mut self) -> PushScope<'_> {
        self.push();
        PushScope { renderer: self }
    }

    // Cameras

    /// A camera with the default view and projection for this surface.
    pub fn create_camera(&self) -> Camera {
        Camera::new(self.width(), self.height())
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.target.current_mut().camera = camera;
    }

    pub fn camera(&self) -> &Camera {
        &self.target.current().camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.target.current_mut().camera
    }

    pub fn orbit(&mut self, d_theta: f32, d_phi: f32, d_radius: f32) {
        self.camera_mut().orbit(d_theta, d_phi, d_radius);
    }

    pub fn pan(&mut self, angle: f32) {
        self.camera_mut().pan(angle);
    }

    pub fn tilt(&mut self, angle: f32) {
        self.camera_mut().tilt(angle);
    }

    pub fn perspective(&mut self, fovy: f32, aspect: f32, near: f32, far: f32) {
        self.camera_mut().perspective(fovy, aspect, near, far);
    }

    pub fn ortho(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.camera_mut().ortho(left, right, bottom, top, near, far);
    }

    pub fn frustum(&mut self, left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) {
        self.camera_mut().frustum(left, right, bottom, top, near, far);
    }

    // Model transforms

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.target.current_mut().model.translate(Vector3::new(x, y, z));
    }

    /// Rotates `angle` radians about `axis`.
    pub fn rotate(&mut self, angle: f32, axis: Vector3) {
        self.target.current_mut().model.rotate(angle, axis);
    }

    pub fn rotate_x(&mut self, angle: f32) {
        self.rotate(angle, Vector3::X);
    }

    pub fn rotate_y(&mut self, angle: f32) {
        self.rotate(angle, Vector3::Y);
    }

    pub fn rotate_z(&mut self, angle: f32) {
        self.rotate(angle, Vector3::Z);
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.target.current_mut().model.scale(Vector3::new(x, y, z));
    }

    /// Applies `matrix` before the current model transform.
    pub fn apply_matrix(&mut self, matrix: &Matrix4) {
        let state = self.target.current_mut();
        state.model = *matrix * state.model;
    }

    pub fn reset_matrix(&mut self) {
        self.target.current_mut().model = Matrix4::IDENTITY;
    }

    // Style

    pub fn fill(&mut self, color: Color) {
        let state = self.target.current_mut();
        state.fill = Some(color);
        state.normal_material = false;
        state.texture = None;
    }

    pub fn no_fill(&mut self) {
        self.target.current_mut().fill = None;
    }

    pub fn stroke(&mut self, color: Color) {
        self.target.current_mut().stroke = Some(color);
    }

    pub fn no_stroke(&mut self) {
        self.target.current_mut().stroke = None;
    }

    pub fn stroke_weight(&mut self, weight: f32) {
        self.target.current_mut().stroke_weight = weight.max(0.0);
    }

    /// Switches blending. A mode the context cannot do is refused with a
    /// warning and the previous mode stays.
    pub fn blend_mode(&mut self, mode: BlendMode) {
        let mode = self.blend.set(mode);
        self.target.current_mut().blend_mode = mode;
    }

    pub fn bezier_detail(&mut self, detail: u32) {
        self.target.current_mut().bezier_detail = detail.max(1);
    }

    pub fn curve_detail(&mut self, detail: u32) {
        self.target.current_mut().curve_detail = detail.max(1);
    }

    pub fn curve_tightness(&mut self, tightness: f32) {
        self.target.current_mut().curve_tightness = tightness;
    }

    pub fn texture_mode(&mut self, mode: TextureMode) {
        self.target.current_mut().texture_mode = mode;
    }

    /// Text size in pixels. Clears an explicit leading so it follows the size.
    pub fn text_size(&mut self, size: f32) {
        let state = self.target.current_mut();
        state.text_size = size.max(0.0);
        state.text_leading = None;
    }

    pub fn text_leading(&mut self, leading: f32) {
        self.target.current_mut().text_leading = Some(leading);
    }

    pub fn text_align(&mut self, horizontal: HorizontalAlign, vertical: VerticalAlign) {
        let state = self.target.current_mut();
        state.text_align = horizontal;
        state.text_baseline = vertical;
    }

    // Lights and materials

    pub fn ambient_light(&mut self, color: Color) {
        self.target.current_mut().lights.ambient_light(color);
    }

    pub fn directional_light(&mut self, color: Color, direction: Vector3) {
        self.target.current_mut().lights.directional_light(color, direction);
    }

    pub fn point_light(&mut self, color: Color, position: Vector3) {
        self.target.current_mut().lights.point_light(color, position);
    }

    pub fn spot_light(
        &mut self,
        color: Color,
        position: Vector3,
        direction: Vector3,
        angle: f32,
        concentration: f32,
    ) {
        self.target
            .current_mut()
            .lights
            .spot_light(color, position, direction, angle, concentration);
    }

    pub fn lights(&mut self) {
        self.target.current_mut().lights.lights();
    }

    pub fn no_lights(&mut self) {
        self.target.current_mut().lights.no_lights();
    }

    pub fn light_falloff(&mut self, constant: f32, linear: f32, quadratic: f32) {
        self.target
            .current_mut()
            .lights
            .light_falloff(constant, linear, quadratic);
    }

    pub fn specular_color(&mut self, color: Color) {
        self.target.current_mut().lights.specular_color(color);
    }

    pub fn ambient_material(&mut self, color: Color) {
        let state = self.target.current_mut();
        state.material.ambient = Some(color);
        state.normal_material = false;
    }

    pub fn specular_material(&mut self, color: Color) {
        let state = self.target.current_mut();
        state.material.specular = Some(color);
        state.normal_material = false;
    }

    pub fn emissive_material(&mut self, color: Color) {
        let state = self.target.current_mut();
        state.material.emissive = color;
        state.normal_material = false;
    }

    pub fn shininess(&mut self, shininess: f32) {
        self.target.current_mut().material.set_shininess(shininess);
    }

    /// Colors fills by their eye-space normals.
    pub fn normal_material(&mut self) {
        let state = self.target.current_mut();
        state.normal_material = true;
        state.texture = None;
    }

    /// Textures subsequent fills.
    pub fn texture(&mut self, id: TextureId) -> Result<()> {
        if !self.textures.contains(id) {
            return Err(RenderError::UnknownTexture(id.index()));
        }
        let state = self.target.current_mut();
        state.texture = Some(id);
        state.normal_material = false;
        Ok(())
    }

    pub fn tint(&mut self, color: Color) {
        self.target.current_mut().material.tint = color;
    }

    pub fn no_tint(&mut self) {
        self.target.current_mut().material.tint = Color::WHITE;
    }

    // Textures

    pub fn create_texture(&mut self, source: Box<dyn TextureSource>, options: TextureOptions) -> TextureId {
        self.textures.create(source, options)
    }

    /// Replaces a texture's pixels; they are uploaded at the next bind.
    pub fn update_texture(&mut self, id: TextureId, source: Box<dyn TextureSource>) -> Result<()> {
        self.textures.replace(id, source)
    }

    pub fn remove_texture(&mut self, id: TextureId) {
        self.textures.remove(id);
    }

    pub fn textures(&self) -> &TextureRegistry {
        &self.textures
    }

    // Shaders

    /// Compiles and links a user program.
    pub fn create_shader(
        &mut self,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Result<ShaderId> {
        let mut shader = Shader::new(Arc::clone(&self.gl), vertex_source, fragment_source);
        shader.init()?;
        self.shaders.push(shader);
        Ok(ShaderId(self.shaders.len() - 1))
    }

    /// Uses a user shader for later draws. Shaders that size strokes or
    /// points replace the stroke or point program; any other replaces the
    /// fill program.
    pub fn shader(&mut self, id: ShaderId) -> Result<()> {
        let shader = self
            .shaders
            .get(id.0)
            .ok_or(RenderError::UnknownShader(id.0))?;
        let (stroke, point) = (shader.is_stroke_shader(), shader.is_point_shader());
        let state = self.target.current_mut();
        if stroke {
            state.stroke_shader = Some(id);
        } else if point {
            state.point_shader = Some(id);
        } else {
            state.fill_shader = Some(id);
        }
        Ok(())
    }

    /// Back to the built-in programs.
    pub fn reset_shader(&mut self) {
        let state = self.target.current_mut();
        state.fill_shader = None;
        state.stroke_shader = None;
        state.point_shader = None;
    }

    /// A user shader, for setting its uniforms.
    pub fn shader_mut(&mut self, id: ShaderId) -> Option<&mut Shader> {
        self.shaders.get_mut(id.0)
    }

    fn selector_input(&self, path: DrawPath) -> SelectorInput {
        let state = self.target.current();
        let user = |id: Option<ShaderId>| {
            id.and_then(|id| self.shaders.get(id.0).map(|s| (id, s.capabilities())))
        };
        SelectorInput {
            path,
            lighting: state.lights.enabled(),
            textured: state.texture.is_some(),
            normal_material: state.normal_material,
            per_pixel_lighting: self.attributes.per_pixel_lighting,
            user_fill: user(state.fill_shader),
            user_stroke: user(state.stroke_shader),
            user_point: user(state.point_shader),
        }
    }

    // Retained primitives

    /// Draws a unit primitive scaled by `size`.
    pub fn primitive(&mut self, primitive: Primitive, size: Vector3) -> Result<()> {
        let mut local = Matrix4::IDENTITY;
        local.scale(size);
        self.draw_primitive(primitive, local)
    }

    pub fn plane(&mut self, width: f32, height: f32) -> Result<()> {
        self.primitive(Primitive::plane(), Vector3::new(width, height, 1.0))
    }

    pub fn draw_box(&mut self, width: f32, height: f32, depth: f32) -> Result<()> {
        self.primitive(Primitive::cube(), Vector3::new(width, height, depth))
    }

    pub fn sphere(&mut self, radius: f32) -> Result<()> {
        self.ellipsoid(radius, radius, radius)
    }

    pub fn ellipsoid(&mut self, rx: f32, ry: f32, rz: f32) -> Result<()> {
        self.primitive(Primitive::sphere(), Vector3::new(rx, ry, rz))
    }

    pub fn cylinder(&mut self, radius: f32, height: f32) -> Result<()> {
        self.primitive(Primitive::cylinder(), Vector3::new(radius, height, radius))
    }

    pub fn cone(&mut self, radius: f32, height: f32) -> Result<()> {
        self.primitive(Primitive::cone(), Vector3::new(radius, height, radius))
    }

    /// Torus with ring radius `radius` and tube radius `tube_radius`.
    pub fn torus(&mut self, radius: f32, tube_radius: f32) -> Result<()> {
        if radius == 0.0 {
            return Ok(());
        }
        self.primitive(
            Primitive::torus(tube_radius / radius),
            Vector3::new(radius, radius, radius),
        )
    }

    pub fn ellipse(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        self.flat(Primitive::ellipse(), x, y, width, height)
    }

    pub fn arc(
        &mut self,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        start: f32,
        stop: f32,
        mode: ArcMode,
    ) -> Result<()> {
        let arc = Primitive::Arc {
            start,
            stop,
            mode,
            detail: 25,
        };
        self.flat(arc, x, y, width, height)
    }

    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        self.flat(Primitive::rect(), x, y, width, height)
    }

    pub fn triangle(&mut self, p1: [f32; 2], p2: [f32; 2], p3: [f32; 2]) -> Result<()> {
        self.draw_primitive(Primitive::Triangle, triangle_transform(p1, p2, p3))
    }

    fn flat(&mut self, primitive: Primitive, x: f32, y: f32, width: f32, height: f32) -> Result<()> {
        let mut local = Matrix4::IDENTITY;
        local.translate(Vector3::new(x, y, 0.0));
        local.scale(Vector3::new(width, height, 1.0));
        self.draw_primitive(primitive, local)
    }

    fn draw_primitive(&mut self, primitive: Primitive, local: Matrix4) -> Result<()> {
        profile_function!();
        let key = primitive.key();
        let entry = self.cache.get_or_create(&key, || primitive.build())?.clone();
        let model = local * self.target.current().model;
        self.draw_cached(&entry, &model)
    }

    /// Draws any geometry through the cache. Its buffers are re-uploaded
    /// whenever the geometry changed since the last draw.
    pub fn model(&mut self, geometry: &Geometry) -> Result<()> {
        let key = format!("model|{}", geometry.id());
        let entry = self.cache.sync(&key, geometry)?.clone();
        let model = self.target.current().model;
        self.draw_cached(&entry, &model)
    }

    fn draw_cached(&mut self, entry: &CachedGeometry, model: &Matrix4) -> Result<()> {
        profile_function!();
        let input = self.selector_input(DrawPath::Retained);
        let viewport = self.viewport();
        let density = self.target.pixel_density();
        self.blend.apply(self.gl.as_ref());

        let gl = self.gl.as_ref();
        let state = self.target.current();

        if let Some(stroke) = state.stroke
            && entry.has_stroke()
            && let (Some(positions), Some(directions)) = (entry.line_positions, entry.line_directions)
        {
            let shader = program(&self.gl, &mut self.builtins, &mut self.shaders, select_stroke(&input))?;
            set_matrices(shader, state, model, viewport);
            set_stroke_uniforms(shader, stroke, state.stroke_weight * density);
            let bound = shader.bind()?;
            bound.enable_attribute("aPosition", positions.handle, 3);
            bound.enable_attribute("aDirection", directions.handle, 4);
            gl.draw_arrays(DrawMode::Triangles, 0, entry.line_vertex_count as i32);
        }

        if wants_fill(state) && entry.has_fill() {
            let shader = program(&self.gl, &mut self.builtins, &mut self.shaders, select_fill(&input))?;
            set_matrices(shader, state, model, viewport);
            set_fill_uniforms(shader, state, entry.colors.is_some());
            let bound = shader.bind()?;
            bound.bind_textures(&mut self.textures)?;
            for (name, buffer, components) in [
                ("aPosition", entry.positions, 3),
                ("aNormal", entry.normals, 3),
                ("aTexCoord", entry.uvs, 2),
                ("aVertexColor", entry.colors, 4),
            ] {
                if let Some(buffer) = buffer {
                    bound.enable_attribute(name, buffer.handle, components);
                }
            }
            match (entry.indices, entry.index_type) {
                (Some(indices), Some(index_type)) => {
                    gl.bind_buffer(BufferTarget::ElementArray, Some(indices.handle));
                    gl.draw_elements(DrawMode::Triangles, indices.len as i32, index_type, 0);
                }
                _ => gl.draw_arrays(DrawMode::Triangles, 0, entry.vertex_count as i32),
            }
            bound.unbind_textures(&self.textures);
        }
        Ok(())
    }

    // Immediate mode

    /// Starts recording a shape.
    pub fn begin_shape(&mut self, mode: ShapeMode) {
        if self.shape.is_some() {
            tracing::warn!("begin_shape() called before end_shape(); discarding the open shape");
        }
        self.shape = Some(ShapeBuilder::new(mode));
    }

    fn record(&mut self, op: &str, f: impl FnOnce(&mut ShapeBuilder, &RenderState)) {
        let state = self.target.current();
        match self.shape.as_mut() {
            Some(shape) => f(shape, state),
            None => tracing::warn!("{}() called outside begin_shape()/end_shape()", op),
        }
    }

    fn shape_vertex(&self, position: Vector3, uv: Option<[f32; 2]>) -> ShapeVertex {
        let state = self.target.current();
        let mut vertex = ShapeVertex::new(position);
        vertex.color = state.fill.unwrap_or(Color::WHITE).to_array();
        if let Some([u, v]) = uv {
            vertex.uv = match (state.texture_mode, state.texture.and_then(|id| self.textures.source(id))) {
                (TextureMode::Image, Some(source)) if source.width() > 0 && source.height() > 0 => {
                    [u / source.width() as f32, v / source.height() as f32]
                }
                _ => [u, v],
            };
        }
        vertex
    }

    pub fn vertex(&mut self, x: f32, y: f32, z: f32) {
        let vertex = self.shape_vertex(Vector3::new(x, y, z), None);
        self.record("vertex", |shape, _| shape.vertex(vertex));
    }

    /// A vertex with texture coordinates, read according to the texture
    /// mode.
    pub fn vertex_uv(&mut self, x: f32, y: f32, z: f32, u: f32, v: f32) {
        let vertex = self.shape_vertex(Vector3::new(x, y, z), Some([u, v]));
        self.record("vertex", |shape, _| shape.vertex(vertex));
    }

    /// Normal for the vertices that follow.
    pub fn normal(&mut self, x: f32, y: f32, z: f32) {
        self.record("normal", |shape, _| shape.normal(Vector3::new(x, y, z)));
    }

    pub fn bezier_vertex(&mut self, control1: Vector3, control2: Vector3, end: Vector3) {
        let end = self.shape_vertex(end, None);
        self.record("bezier_vertex", |shape, state| {
            shape.bezier_vertex(control1, control2, end, state.bezier_detail)
        });
    }

    pub fn quadratic_vertex(&mut self, control: Vector3, end: Vector3) {
        let end = self.shape_vertex(end, None);
        self.record("quadratic_vertex", |shape, state| {
            shape.quadratic_vertex(control, end, state.bezier_detail)
        });
    }

    pub fn curve_vertex(&mut self, x: f32, y: f32, z: f32) {
        let vertex = self.shape_vertex(Vector3::new(x, y, z), None);
        self.record("curve_vertex", |shape, state| {
            shape.curve_vertex(vertex, state.curve_detail, state.curve_tightness)
        });
    }

    pub fn begin_contour(&mut self) {
        self.record("begin_contour", |shape, _| shape.begin_contour());
    }

    pub fn end_contour(&mut self) {
        self.record("end_contour", |shape, _| shape.end_contour());
    }

    /// Finishes the shape and draws it: stroke first, then fill, then
    /// points.
    pub fn end_shape(&mut self, end: EndMode) -> Result<()> {
        profile_function!();
        let Some(shape) = self.shape.take() else {
            tracing::warn!("end_shape() called without begin_shape()");
            return Ok(());
        };
        let state = self.target.current();
        let data = shape.finish(
            end,
            wants_fill(state),
            state.stroke.is_some(),
            &mut self.tessellator,
        )?;
        self.blend.apply(self.gl.as_ref());
        if let Some(stroke) = &data.stroke {
            self.draw_immediate_stroke(stroke)?;
        }
        if let Some(fill) = &data.fill {
            self.draw_immediate_fill(fill)?;
        }
        if !data.points.is_empty() {
            self.draw_points(&data.points)?;
        }
        Ok(())
    }

    fn draw_immediate_stroke(&mut self, line: &Geometry) -> Result<()> {
        let input = self.selector_input(DrawPath::Immediate);
        let viewport = self.viewport();
        let density = self.target.pixel_density();
        let gl = self.gl.as_ref();
        let state = self.target.current();
        let Some(stroke) = state.stroke else {
            return Ok(());
        };

        let positions = ImmediateBuffers::stream(gl, &mut self.immediate.line_positions, line.line_vertex_data())?;
        let directions =
            ImmediateBuffers::stream(gl, &mut self.immediate.line_directions, line.line_normal_data())?;

        let shader = program(&self.gl, &mut self.builtins, &mut self.shaders, select_stroke(&input))?;
        set_matrices(shader, state, &state.model, viewport);
        set_stroke_uniforms(shader, stroke, state.stroke_weight * density);
        let bound = shader.bind()?;
        bound.enable_attribute("aPosition", positions, 3);
        bound.enable_attribute("aDirection", directions, 4);

        let culling = gl.is_enabled(Capability::CullFace);
        if culling {
            gl.disable(Capability::CullFace);
        }
        gl.draw_arrays(DrawMode::Triangles, 0, line.line_vertices().len() as i32);
        if culling {
            gl.enable(Capability::CullFace);
        }
        Ok(())
    }

    fn draw_immediate_fill(&mut self, fill: &FillData) -> Result<()> {
        let input = self.selector_input(DrawPath::Immediate);
        let viewport = self.viewport();
        let gl = self.gl.as_ref();
        let state = self.target.current();

        let arrays = VertexArrays::from_vertices(&fill.vertices);
        let buffers = &mut self.immediate;
        let attributes = [
            ("aPosition", ImmediateBuffers::stream(gl, &mut buffers.positions, &arrays.positions)?, 3),
            ("aNormal", ImmediateBuffers::stream(gl, &mut buffers.normals, &arrays.normals)?, 3),
            ("aTexCoord", ImmediateBuffers::stream(gl, &mut buffers.uvs, &arrays.uvs)?, 2),
            ("aVertexColor", ImmediateBuffers::stream(gl, &mut buffers.colors, &arrays.colors)?, 4),
        ];

        let shader = program(&self.gl, &mut self.builtins, &mut self.shaders, select_fill(&input))?;
        set_matrices(shader, state, &state.model, viewport);
        set_fill_uniforms(shader, state, true);
        let bound = shader.bind()?;
        bound.bind_textures(&mut self.textures)?;
        for (name, buffer, components) in attributes {
            bound.enable_attribute(name, buffer, components);
        }
        gl.draw_arrays(fill.draw_mode, 0, fill.vertices.len() as i32);
        bound.unbind_textures(&self.textures);
        Ok(())
    }

    fn draw_points(&mut self, points: &[Vector3]) -> Result<()> {
        let input = self.selector_input(DrawPath::Immediate);
        let viewport = self.viewport();
        let density = self.target.pixel_density();
        let gl = self.gl.as_ref();
        let state = self.target.current();
        let Some(stroke) = state.stroke else {
            return Ok(());
        };

        let data: Vec<f32> = points.iter().flat_map(|p| p.to_array()).collect();
        let positions = ImmediateBuffers::stream(gl, &mut self.immediate.positions, &data)?;

        let shader = program(&self.gl, &mut self.builtins, &mut self.shaders, select_point(&input))?;
        set_matrices(shader, state, &state.model, viewport);
        shader.set_uniform("uMaterialColor", stroke);
        shader.set_uniform("uPointSize", state.stroke_weight * density);
        let bound = shader.bind()?;
        bound.enable_attribute("aPosition", positions, 3);
        gl.draw_arrays(DrawMode::Points, 0, points.len() as i32);
        Ok(())
    }

    pub fn line(&mut self, from: Vector3, to: Vector3) -> Result<()> {
        self.begin_shape(ShapeMode::Lines);
        self.vertex(from.x, from.y, from.z);
        self.vertex(to.x, to.y, to.z);
        self.end_shape(EndMode::Open)
    }

    pub fn point(&mut self, x: f32, y: f32, z: f32) -> Result<()> {
        self.begin_shape(ShapeMode::Points);
        self.vertex(x, y, z);
        self.end_shape(EndMode::Open)
    }

    pub fn quad(&mut self, corners: [Vector3; 4]) -> Result<()> {
        self.begin_shape(ShapeMode::Tess);
        for p in corners {
            self.vertex(p.x, p.y, p.z);
        }
        self.end_shape(EndMode::Close)
    }

    pub fn bezier(&mut self, p0: Vector3, p1: Vector3, p2: Vector3, p3: Vector3) -> Result<()> {
        self.begin_shape(ShapeMode::Tess);
        self.vertex(p0.x, p0.y, p0.z);
        self.bezier_vertex(p1, p2, p3);
        self.end_shape(EndMode::Open)
    }

    /// Catmull-Rom span from `p1` to `p2`.
    pub fn curve(&mut self, p0: Vector3, p1: Vector3, p2: Vector3, p3: Vector3) -> Result<()> {
        self.begin_shape(ShapeMode::Tess);
        for p in [p0, p1, p2, p3] {
            self.curve_vertex(p.x, p.y, p.z);
        }
        self.end_shape(EndMode::Open)
    }

    // Text

    /// Draws one glyph with the fill color. Does nothing without a fill.
    pub fn draw_glyph(&mut self, glyph: &GlyphQuad) -> Result<()> {
        profile_function!();
        let quad = Primitive::rect();
        let entry = self.cache.get_or_create(&quad.key(), || quad.build())?.clone();
        let viewport = self.viewport();
        self.blend.apply(self.gl.as_ref());
        let gl = self.gl.as_ref();
        let state = self.target.current();
        let Some(fill) = state.fill else {
            return Ok(());
        };
        let (Some(positions), Some(uvs), Some(indices), Some(index_type)) =
            (entry.positions, entry.uvs, entry.indices, entry.index_type)
        else {
            return Ok(());
        };

        let shader = program(
            &self.gl,
            &mut self.builtins,
            &mut self.shaders,
            ShaderChoice::Builtin(BuiltinShader::Font),
        )?;
        set_matrices(shader, state, &state.model, viewport);
        shader.set_uniform("uMaterialColor", fill);
        shader.set_uniform("uGlyphRect", glyph.rect);
        shader.set_uniform("uGlyphOffset", glyph.offset);
        shader.set_uniform("uGridOffset", glyph.grid_offset);
        shader.set_uniform("uGridSize", glyph.grid_size);
        let atlas = &glyph.atlas;
        shader.set_uniform("uStrokeImageSize", atlas.stroke_image_size);
        shader.set_uniform("uCellsImageSize", atlas.cells_image_size);
        shader.set_uniform("uGridImageSize", atlas.grid_image_size);
        shader.set_uniform("uSamplerStrokes", atlas.strokes);
        shader.set_uniform("uSamplerRowStrokes", atlas.row_strokes);
        shader.set_uniform("uSamplerRows", atlas.rows);
        shader.set_uniform("uSamplerColStrokes", atlas.col_strokes);
        shader.set_uniform("uSamplerCols", atlas.cols);

        let bound = shader.bind()?;
        bound.bind_textures(&mut self.textures)?;
        bound.enable_attribute("aPosition", positions.handle, 3);
        bound.enable_attribute("aTexCoord", uvs.handle, 2);
        gl.bind_buffer(BufferTarget::ElementArray, Some(indices.handle));
        gl.draw_elements(DrawMode::Triangles, indices.len as i32, index_type, 0);
        bound.unbind_textures(&self.textures);
        Ok(())
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("pixel_density", &self.pixel_density())
            .field("cached_geometries", &self.cache.len())
            .field("shaders", &self.shaders.len())
            .field("textures", &self.textures.len())
            .finish()
    }
}

/// Saved state that is restored when the guard drops.
pub struct PushScope<'a> {
    renderer: &'a mut Renderer,
}

impl Deref for PushScope<'_> {
    type Target = Renderer;

    fn deref(&self) -> &Renderer {
        self.renderer
    }
}

impl DerefMut for PushScope<'_> {
    fn deref_mut(&mut self) -> &mut Renderer {
        self.renderer
    }
}

impl Drop for PushScope<'_> {
    fn drop(&mut self) {
        self.renderer.pop();
    }
}

fn wants_fill(state: &RenderState) -> bool {
    state.fill.is_some() || state.texture.is_some() || state.normal_material
}

/// Resolves `choice` to a linked program, compiling built-ins on first use.
fn program<'a>(
    gl: &Arc<dyn GlContext>,
    builtins: &'a mut HashMap<BuiltinShader, Shader>,
    shaders: &'a mut [Shader],
    choice: ShaderChoice,
) -> Result<&'a mut Shader> {
    match choice {
        ShaderChoice::Builtin(builtin) => {
            let shader = builtins.entry(builtin).or_insert_with(|| {
                tracing::debug!("compiling built-in {} shader", builtin);
                Shader::new(
                    Arc::clone(gl),
                    builtin.vertex_source(),
                    builtin.fragment_source(),
                )
            });
            shader.init()?;
            Ok(shader)
        }
        ShaderChoice::User(id) => shaders.get_mut(id.0).ok_or(RenderError::UnknownShader(id.0)),
    }
}

fn set_matrices(shader: &mut Shader, state: &RenderState, model: &Matrix4, viewport: [f32; 4]) {
    let view = state.camera.view_matrix();
    let model_view = *model * *view;
    shader.set_uniform("uModelViewMatrix", &model_view);
    shader.set_uniform("uProjectionMatrix", state.camera.projection_matrix());
    shader.set_uniform("uViewMatrix", view);
    shader.set_uniform("uNormalMatrix", &Matrix3::inverse_transpose(&model_view));
    shader.set_uniform("uViewport", viewport);
    shader.set_uniform(
        "uPerspective",
        matches!(state.camera.projection(), Projection::Perspective { .. }),
    );
}

fn set_stroke_uniforms(shader: &mut Shader, color: Color, weight: f32) {
    shader.set_uniform("uMaterialColor", color);
    shader.set_uniform("uStrokeWeight", weight);
}

fn set_fill_uniforms(shader: &mut Shader, state: &RenderState, vertex_colors: bool) {
    let fill = state.fill.unwrap_or(Color::WHITE);
    state.lights.upload(shader);
    state.material.upload(shader, fill, state.texture);
    shader.set_uniform("uUseVertexColor", vertex_colors);
}

#[cfg(test)]
mod tests {
    use lumen_test_utils::{GlCall, MockGlContext, RecordedUniform};

    use super::*;

    fn renderer() -> (Arc<MockGlContext>, Renderer) {
        let gl = Arc::new(MockGlContext::new());
        let renderer = Renderer::new(gl.clone(), RendererDescriptor::new().with_size(100, 100)).unwrap();
        (gl, renderer)
    }

    #[test]
    fn test_new_sets_depth_and_viewport() {
        let gl = Arc::new(MockGlContext::new());
        let _renderer = Renderer::new(
            gl.clone(),
            RendererDescriptor::new().with_size(100, 50).with_pixel_density(2.0),
        )
        .unwrap();
        let calls = gl.calls();
        assert!(calls.contains(&GlCall::Enable(Capability::DepthTest)));
        assert!(calls.contains(&GlCall::DepthFunc(DepthFunc::LessEqual)));
        assert!(calls.contains(&GlCall::Viewport(0, 0, 200, 100)));
    }

    #[test]
    fn test_lost_context_is_an_error() {
        let gl = Arc::new(MockGlContext::new());
        gl.lose_context();
        let err = Renderer::new(gl, RendererDescriptor::new()).unwrap_err();
        assert_eq!(err, RenderError::ContextLost);
    }

    #[test]
    fn test_push_scope_pops_on_drop() {
        let (_gl, mut renderer) = renderer();
        {
            let mut scope = renderer.push_scope();
            scope.translate(10.0, 0.0, 0.0);
            scope.no_fill();
            assert_eq!(scope.state().fill, None);
        }
        assert_eq!(renderer.state().model, Matrix4::IDENTITY);
        assert_eq!(renderer.state().fill, Some(Color::WHITE));
    }

    #[test]
    fn test_pop_restores_blend_mode() {
        let (_gl, mut renderer) = renderer();
        renderer.push();
        renderer.blend_mode(BlendMode::Add);
        renderer.pop();
        assert_eq!(renderer.state().blend_mode, BlendMode::Blend);
        assert_eq!(renderer.blend.current(), BlendMode::Blend);
    }

    #[test]
    fn test_stroke_drawn_before_fill() {
        let (gl, mut renderer) = renderer();
        renderer.draw_box(10.0, 10.0, 10.0).unwrap();
        let draws = gl.draw_calls();
        assert_eq!(draws.len(), 2);
        assert!(matches!(draws[0], GlCall::DrawArrays { mode: DrawMode::Triangles, .. }));
        assert!(matches!(draws[1], GlCall::DrawElements { .. }));
        assert_eq!(gl.current_program(), None);
    }

    #[test]
    fn test_no_fill_no_stroke_draws_nothing() {
        let (gl, mut renderer) = renderer();
        renderer.no_fill();
        renderer.no_stroke();
        renderer.sphere(20.0).unwrap();
        assert_eq!(gl.count_draw_calls(), 0);
        assert_eq!(renderer.geometry_cache().len(), 1);
    }

    #[test]
    fn test_unknown_shader_and_texture() {
        let (_gl, mut renderer) = renderer();
        assert_eq!(
            renderer.shader(ShaderId(3)),
            Err(RenderError::UnknownShader(3))
        );
        assert_eq!(
            renderer.texture(TextureId(1)),
            Err(RenderError::UnknownTexture(1))
        );
    }

    #[test]
    fn test_stroke_weight_scaled_by_density() {
        let gl = Arc::new(MockGlContext::new());
        let mut renderer = Renderer::new(
            gl.clone(),
            RendererDescriptor::new().with_pixel_density(2.0),
        )
        .unwrap();
        renderer.stroke_weight(3.0);
        renderer.no_fill();
        renderer.plane(10.0, 10.0).unwrap();
        assert_eq!(
            gl.uniform_uploads("uStrokeWeight"),
            vec![RecordedUniform::Float(6.0)]
        );
    }

    #[test]
    fn test_vertex_outside_shape_is_ignored() {
        let (gl, mut renderer) = renderer();
        renderer.vertex(1.0, 2.0, 3.0);
        renderer.end_shape(EndMode::Close).unwrap();
        assert_eq!(gl.count_draw_calls(), 0);
    }

    #[test]
    fn test_image_texture_mode_normalizes_uvs() {
        let (_gl, mut renderer) = renderer();
        let id = renderer.create_texture(
            Box::new(crate::texture::ImageData::new(64, 32)),
            TextureOptions::default(),
        );
        renderer.texture(id).unwrap();
        let vertex = renderer.shape_vertex(Vector3::ZERO, Some([32.0, 16.0]));
        assert_eq!(vertex.uv, [0.5, 0.5]);

        renderer.texture_mode(TextureMode::Normal);
        let vertex = renderer.shape_vertex(Vector3::ZERO, Some([0.25, 0.75]));
        assert_eq!(vertex.uv, [0.25, 0.75]);
    }
}
