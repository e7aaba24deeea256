//! Mock implementation of [`GlContext`] for testing.
//!
//! The mock keeps just enough state to behave like a driver: it "compiles"
//! GLSL by scanning its declarations, so programs report realistic active
//! attributes and uniforms, and it records every call for assertions.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

use crate::gl_context::GlContext;
use crate::gl_types::*;

/// Owned copy of a uniform upload.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedUniform {
    Int(i32),
    Ints(Vec<i32>),
    Float(f32),
    Floats(Vec<f32>),
    Matrix2(Vec<f32>),
    Matrix3(Vec<f32>),
    Matrix4(Vec<f32>),
}

impl RecordedUniform {
    fn from_upload(value: &UniformUpload<'_>) -> Self {
        match *value {
            UniformUpload::Int(v) => RecordedUniform::Int(v),
            UniformUpload::IntVec { components, values } => {
                RecordedUniform::Ints(values[..components as usize].to_vec())
            }
            UniformUpload::IntArray { data, .. } => RecordedUniform::Ints(data.to_vec()),
            UniformUpload::Float(v) => RecordedUniform::Float(v),
            UniformUpload::FloatVec { components, values } => {
                RecordedUniform::Floats(values[..components as usize].to_vec())
            }
            UniformUpload::FloatArray { data, .. } => RecordedUniform::Floats(data.to_vec()),
            UniformUpload::Matrix2(data) => RecordedUniform::Matrix2(data.to_vec()),
            UniformUpload::Matrix3(data) => RecordedUniform::Matrix3(data.to_vec()),
            UniformUpload::Matrix4(data) => RecordedUniform::Matrix4(data.to_vec()),
        }
    }
}

/// Records a GL call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum GlCall {
    CreateBuffer(GlBuffer),
    DeleteBuffer(GlBuffer),
    BindBuffer {
        target: BufferTarget,
        buffer: Option<GlBuffer>,
    },
    BufferData {
        target: BufferTarget,
        buffer: Option<GlBuffer>,
        bytes: usize,
        usage: BufferUsage,
    },
    CreateShader(GlShader, ShaderStage),
    CompileShader(GlShader),
    CreateProgram(GlProgram),
    LinkProgram(GlProgram),
    UseProgram(Option<GlProgram>),
    DeleteProgram(GlProgram),
    Uniform {
        program: Option<GlProgram>,
        name: String,
        value: RecordedUniform,
    },
    EnableVertexAttribArray(u32),
    DisableVertexAttribArray(u32),
    VertexAttribPointer {
        index: u32,
        size: i32,
    },
    DrawArrays {
        mode: DrawMode,
        first: i32,
        count: i32,
    },
    DrawElements {
        mode: DrawMode,
        count: i32,
        index_type: IndexType,
    },
    CreateTexture(GlTexture),
    DeleteTexture(GlTexture),
    ActiveTexture(u32),
    BindTexture(Option<GlTexture>),
    TexImage2D {
        texture: Option<GlTexture>,
        width: u32,
        height: u32,
        bytes: usize,
    },
    TexParameters(TextureFilter, TextureWrap),
    PixelStore(i32),
    Enable(Capability),
    Disable(Capability),
    DepthFunc(DepthFunc),
    DepthMask(bool),
    BlendEquation {
        rgb: BlendEquation,
        alpha: BlendEquation,
    },
    BlendFunc {
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    },
    Viewport(i32, i32, i32, i32),
    ClearColor([f32; 4]),
    Clear(ClearMask),
}

#[derive(Debug, Clone)]
struct MockShader {
    stage: ShaderStage,
    source: String,
    compiled: bool,
    log: String,
}

#[derive(Debug, Clone, Default)]
struct MockProgram {
    shaders: Vec<GlShader>,
    linked: bool,
    log: String,
    attributes: Vec<ActiveInfo>,
    uniforms: Vec<ActiveInfo>,
}

#[derive(Debug, Default)]
struct MockState {
    next_id: u32,
    buffers: BTreeSet<u32>,
    textures: BTreeSet<u32>,
    shaders: BTreeMap<u32, MockShader>,
    programs: BTreeMap<u32, MockProgram>,
    /// location id -> (program, base name)
    locations: Vec<(GlProgram, String)>,
    array_buffer: Option<GlBuffer>,
    element_buffer: Option<GlBuffer>,
    current_program: Option<GlProgram>,
    active_unit: u32,
    bound_textures: BTreeMap<u32, GlTexture>,
    enabled: BTreeSet<CapabilityKey>,
    fail_next_link: Option<String>,
    /// Buffers that may still be created before `create_buffer` fails.
    buffer_budget: Option<usize>,
    context_lost: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CapabilityKey(u8);

impl From<Capability> for CapabilityKey {
    fn from(c: Capability) -> Self {
        CapabilityKey(match c {
            Capability::Blend => 0,
            Capability::DepthTest => 1,
            Capability::CullFace => 2,
        })
    }
}

impl MockState {
    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mock implementation of [`GlContext`] for testing.
///
/// # Example
///
/// ```rust
/// use lumen_test_utils::{BufferTarget, BufferUsage, GlContext, MockGlContext};
///
/// let mock = MockGlContext::new();
/// let buffer = mock.create_buffer().unwrap();
/// mock.bind_buffer(BufferTarget::Array, Some(buffer));
/// mock.buffer_data(BufferTarget::Array, &[0u8; 64], BufferUsage::StaticDraw);
///
/// assert_eq!(mock.count_buffer_creates(), 1);
/// assert_eq!(mock.bytes_uploaded(), 64);
/// ```
pub struct MockGlContext {
    calls: Mutex<Vec<GlCall>>,
    state: Mutex<MockState>,
    extensions: Mutex<BTreeSet<String>>,
}

impl MockGlContext {
    /// Extensions a fresh mock advertises.
    pub const DEFAULT_EXTENSIONS: &'static [&'static str] = &[
        "EXT_blend_minmax",
        "OES_element_index_uint",
        "OES_standard_derivatives",
    ];

    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            state: Mutex::new(MockState::default()),
            extensions: Mutex::new(
                Self::DEFAULT_EXTENSIONS
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            ),
        }
    }

    /// A mock without any extensions.
    pub fn without_extensions() -> Self {
        let mock = Self::new();
        mock.extensions.lock().clear();
        mock
    }

    /// Makes the next `link_program` fail with `log`.
    pub fn fail_next_link(&self, log: impl Into<String>) {
        self.state.lock().fail_next_link = Some(log.into());
    }

    /// Lets `allowed` more buffers be created, then fails every later
    /// `create_buffer`.
    pub fn fail_buffer_creates_after(&self, allowed: usize) {
        self.state.lock().buffer_budget = Some(allowed);
    }

    /// Simulates a lost context.
    pub fn lose_context(&self) {
        self.state.lock().context_lost = true;
    }

    fn record(&self, call: GlCall) {
        self.calls.lock().push(call);
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<GlCall> {
        self.calls.lock().clone()
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn count(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count(|c| matches!(c, GlCall::CreateBuffer(_)))
    }

    pub fn count_buffer_deletes(&self) -> usize {
        self.count(|c| matches!(c, GlCall::DeleteBuffer(_)))
    }

    pub fn count_buffer_uploads(&self) -> usize {
        self.count(|c| matches!(c, GlCall::BufferData { .. }))
    }

    /// Total bytes passed to `buffer_data`.
    pub fn bytes_uploaded(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .map(|c| match c {
                GlCall::BufferData { bytes, .. } => *bytes,
                _ => 0,
            })
            .sum()
    }

    pub fn count_texture_creates(&self) -> usize {
        self.count(|c| matches!(c, GlCall::CreateTexture(_)))
    }

    pub fn count_texture_uploads(&self) -> usize {
        self.count(|c| matches!(c, GlCall::TexImage2D { .. }))
    }

    pub fn count_program_links(&self) -> usize {
        self.count(|c| matches!(c, GlCall::LinkProgram(_)))
    }

    /// All `draw_arrays` / `draw_elements` calls in order.
    pub fn draw_calls(&self) -> Vec<GlCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. }))
            .cloned()
            .collect()
    }

    pub fn count_draw_calls(&self) -> usize {
        self.count(|c| matches!(c, GlCall::DrawArrays { .. } | GlCall::DrawElements { .. }))
    }

    /// Every value uploaded to uniforms named `name` (array suffix stripped).
    pub fn uniform_uploads(&self, name: &str) -> Vec<RecordedUniform> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                GlCall::Uniform { name: n, value, .. } if n == name => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    /// The buffer most recently bound to `target`.
    pub fn bound_buffer(&self, target: BufferTarget) -> Option<GlBuffer> {
        let state = self.state.lock();
        match target {
            BufferTarget::Array => state.array_buffer,
            BufferTarget::ElementArray => state.element_buffer,
        }
    }

    pub fn current_program(&self) -> Option<GlProgram> {
        self.state.lock().current_program
    }

    /// Texture bound to `unit`, if any.
    pub fn bound_texture(&self, unit: u32) -> Option<GlTexture> {
        self.state.lock().bound_textures.get(&unit).copied()
    }

    /// Number of live (created and not deleted) buffers.
    pub fn live_buffers(&self) -> usize {
        self.state.lock().buffers.len()
    }
}

impl Default for MockGlContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GlContext for MockGlContext {
    fn create_buffer(&self) -> Result<GlBuffer, GlError> {
        let mut state = self.state.lock();
        if state.context_lost {
            return Err(GlError("context lost".into()));
        }
        if let Some(left) = state.buffer_budget.as_mut() {
            if *left == 0 {
                return Err(GlError("out of buffer objects".into()));
            }
            *left -= 1;
        }
        let buffer = GlBuffer(state.next());
        state.buffers.insert(buffer.0);
        drop(state);
        self.record(GlCall::CreateBuffer(buffer));
        Ok(buffer)
    }

    fn delete_buffer(&self, buffer: GlBuffer) {
        let mut state = self.state.lock();
        state.buffers.remove(&buffer.0);
        if state.array_buffer == Some(buffer) {
            state.array_buffer = None;
        }
        if state.element_buffer == Some(buffer) {
            state.element_buffer = None;
        }
        drop(state);
        self.record(GlCall::DeleteBuffer(buffer));
    }

    fn bind_buffer(&self, target: BufferTarget, buffer: Option<GlBuffer>) {
        {
            let mut state = self.state.lock();
            match target {
                BufferTarget::Array => state.array_buffer = buffer,
                BufferTarget::ElementArray => state.element_buffer = buffer,
            }
        }
        self.record(GlCall::BindBuffer { target, buffer });
    }

    fn buffer_data(&self, target: BufferTarget, data: &[u8], usage: BufferUsage) {
        let buffer = self.bound_buffer(target);
        self.record(GlCall::BufferData {
            target,
            buffer,
            bytes: data.len(),
            usage,
        });
    }

    fn create_shader(&self, stage: ShaderStage) -> Result<GlShader, GlError> {
        let mut state = self.state.lock();
        let shader = GlShader(state.next());
        state.shaders.insert(
            shader.0,
            MockShader {
                stage,
                source: String::new(),
                compiled: false,
                log: String::new(),
            },
        );
        drop(state);
        self.record(GlCall::CreateShader(shader, stage));
        Ok(shader)
    }

    fn shader_source(&self, shader: GlShader, source: &str) {
        if let Some(s) = self.state.lock().shaders.get_mut(&shader.0) {
            s.source = source.to_string();
        }
    }

    fn compile_shader(&self, shader: GlShader) {
        if let Some(s) = self.state.lock().shaders.get_mut(&shader.0) {
            match s.source.lines().position(|l| l.trim_start().starts_with("#error")) {
                Some(line) => {
                    s.compiled = false;
                    s.log = format!("ERROR: 0:{}: '#error' : {}", line + 1, s.stage);
                }
                None => {
                    s.compiled = true;
                    s.log.clear();
                }
            }
        }
        self.record(GlCall::CompileShader(shader));
    }

    fn shader_compile_status(&self, shader: GlShader) -> bool {
        self.state
            .lock()
            .shaders
            .get(&shader.0)
            .is_some_and(|s| s.compiled)
    }

    fn shader_info_log(&self, shader: GlShader) -> String {
        self.state
            .lock()
            .shaders
            .get(&shader.0)
            .map(|s| s.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&self, shader: GlShader) {
        self.state.lock().shaders.remove(&shader.0);
    }

    fn create_program(&self) -> Result<GlProgram, GlError> {
        let mut state = self.state.lock();
        let program = GlProgram(state.next());
        state.programs.insert(program.0, MockProgram::default());
        drop(state);
        self.record(GlCall::CreateProgram(program));
        Ok(program)
    }

    fn attach_shader(&self, program: GlProgram, shader: GlShader) {
        if let Some(p) = self.state.lock().programs.get_mut(&program.0) {
            p.shaders.push(shader);
        }
    }

    fn link_program(&self, program: GlProgram) {
        let mut state = self.state.lock();
        let forced_failure = state.fail_next_link.take();
        let attached: Vec<MockShader> = state
            .programs
            .get(&program.0)
            .map(|p| {
                p.shaders
                    .iter()
                    .filter_map(|s| state.shaders.get(&s.0).cloned())
                    .collect()
            })
            .unwrap_or_default();

        let vertex = attached.iter().find(|s| s.stage == ShaderStage::Vertex);
        let fragment = attached.iter().find(|s| s.stage == ShaderStage::Fragment);

        let result = match (forced_failure, vertex, fragment) {
            (Some(log), _, _) => Err(log),
            (None, Some(v), Some(f)) if v.compiled && f.compiled => Ok(introspect(v, f)),
            (None, Some(_), Some(_)) => Err("one or more attached shaders not compiled".to_string()),
            _ => Err("missing vertex or fragment shader".to_string()),
        };

        if let Some(p) = state.programs.get_mut(&program.0) {
            match result {
                Ok((attributes, uniforms)) => {
                    p.linked = true;
                    p.log.clear();
                    p.attributes = attributes;
                    p.uniforms = uniforms;
                }
                Err(log) => {
                    p.linked = false;
                    p.log = log;
                }
            }
        }
        drop(state);
        self.record(GlCall::LinkProgram(program));
    }

    fn program_link_status(&self, program: GlProgram) -> bool {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .is_some_and(|p| p.linked)
    }

    fn program_info_log(&self, program: GlProgram) -> String {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .map(|p| p.log.clone())
            .unwrap_or_default()
    }

    fn use_program(&self, program: Option<GlProgram>) {
        self.state.lock().current_program = program;
        self.record(GlCall::UseProgram(program));
    }

    fn delete_program(&self, program: GlProgram) {
        self.state.lock().programs.remove(&program.0);
        self.record(GlCall::DeleteProgram(program));
    }

    fn active_attribute_count(&self, program: GlProgram) -> u32 {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .map_or(0, |p| p.attributes.len() as u32)
    }

    fn active_attribute(&self, program: GlProgram, index: u32) -> Option<ActiveInfo> {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .and_then(|p| p.attributes.get(index as usize).cloned())
    }

    fn attrib_location(&self, program: GlProgram, name: &str) -> Option<u32> {
        self.state.lock().programs.get(&program.0).and_then(|p| {
            p.attributes
                .iter()
                .position(|a| a.name == name)
                .map(|i| i as u32)
        })
    }

    fn active_uniform_count(&self, program: GlProgram) -> u32 {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .map_or(0, |p| p.uniforms.len() as u32)
    }

    fn active_uniform(&self, program: GlProgram, index: u32) -> Option<ActiveInfo> {
        self.state
            .lock()
            .programs
            .get(&program.0)
            .and_then(|p| p.uniforms.get(index as usize).cloned())
    }

    fn uniform_location(&self, program: GlProgram, name: &str) -> Option<UniformLocation> {
        let base = name.strip_suffix("[0]").unwrap_or(name);
        let mut state = self.state.lock();
        let declared = state.programs.get(&program.0)?.uniforms.iter().any(|u| {
            u.name.strip_suffix("[0]").unwrap_or(&u.name) == base
        });
        if !declared {
            return None;
        }
        if let Some(existing) = state
            .locations
            .iter()
            .position(|(p, n)| *p == program && n == base)
        {
            return Some(UniformLocation(existing as u32));
        }
        state.locations.push((program, base.to_string()));
        Some(UniformLocation(state.locations.len() as u32 - 1))
    }

    fn uniform(&self, location: UniformLocation, value: UniformUpload<'_>) {
        let (program, name) = {
            let state = self.state.lock();
            let name = state
                .locations
                .get(location.0 as usize)
                .map(|(_, n)| n.clone())
                .unwrap_or_default();
            (state.current_program, name)
        };
        self.record(GlCall::Uniform {
            program,
            name,
            value: RecordedUniform::from_upload(&value),
        });
    }

    fn enable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::EnableVertexAttribArray(index));
    }

    fn disable_vertex_attrib_array(&self, index: u32) {
        self.record(GlCall::DisableVertexAttribArray(index));
    }

    fn vertex_attrib_pointer_f32(&self, index: u32, size: i32, _normalized: bool, _stride: i32, _offset: i32) {
        self.record(GlCall::VertexAttribPointer { index, size });
    }

    fn draw_arrays(&self, mode: DrawMode, first: i32, count: i32) {
        self.record(GlCall::DrawArrays { mode, first, count });
    }

    fn draw_elements(&self, mode: DrawMode, count: i32, index_type: IndexType, _offset: i32) {
        self.record(GlCall::DrawElements {
            mode,
            count,
            index_type,
        });
    }

    fn create_texture(&self) -> Result<GlTexture, GlError> {
        let mut state = self.state.lock();
        let texture = GlTexture(state.next());
        state.textures.insert(texture.0);
        drop(state);
        self.record(GlCall::CreateTexture(texture));
        Ok(texture)
    }

    fn delete_texture(&self, texture: GlTexture) {
        let mut state = self.state.lock();
        state.textures.remove(&texture.0);
        state.bound_textures.retain(|_, t| *t != texture);
        drop(state);
        self.record(GlCall::DeleteTexture(texture));
    }

    fn active_texture(&self, unit: u32) {
        self.state.lock().active_unit = unit;
        self.record(GlCall::ActiveTexture(unit));
    }

    fn bind_texture_2d(&self, texture: Option<GlTexture>) {
        {
            let mut state = self.state.lock();
            let unit = state.active_unit;
            match texture {
                Some(t) => {
                    state.bound_textures.insert(unit, t);
                }
                None => {
                    state.bound_textures.remove(&unit);
                }
            }
        }
        self.record(GlCall::BindTexture(texture));
    }

    fn tex_image_2d_rgba(&self, width: u32, height: u32, pixels: &[u8]) {
        let texture = {
            let state = self.state.lock();
            state.bound_textures.get(&state.active_unit).copied()
        };
        self.record(GlCall::TexImage2D {
            texture,
            width,
            height,
            bytes: pixels.len(),
        });
    }

    fn tex_parameters(&self, filter: TextureFilter, wrap: TextureWrap) {
        self.record(GlCall::TexParameters(filter, wrap));
    }

    fn pixel_store_unpack_alignment(&self, alignment: i32) {
        self.record(GlCall::PixelStore(alignment));
    }

    fn enable(&self, capability: Capability) {
        self.state.lock().enabled.insert(capability.into());
        self.record(GlCall::Enable(capability));
    }

    fn disable(&self, capability: Capability) {
        self.state.lock().enabled.remove(&capability.into());
        self.record(GlCall::Disable(capability));
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        self.state.lock().enabled.contains(&capability.into())
    }

    fn depth_func(&self, func: DepthFunc) {
        self.record(GlCall::DepthFunc(func));
    }

    fn depth_mask(&self, write: bool) {
        self.record(GlCall::DepthMask(write));
    }

    fn blend_equation_separate(&self, rgb: BlendEquation, alpha: BlendEquation) {
        self.record(GlCall::BlendEquation { rgb, alpha });
    }

    fn blend_func_separate(
        &self,
        src_rgb: BlendFactor,
        dst_rgb: BlendFactor,
        src_alpha: BlendFactor,
        dst_alpha: BlendFactor,
    ) {
        self.record(GlCall::BlendFunc {
            src_rgb,
            dst_rgb,
            src_alpha,
            dst_alpha,
        });
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.record(GlCall::Viewport(x, y, width, height));
    }

    fn clear_color(&self, r: f32, g: f32, b: f32, a: f32) {
        self.record(GlCall::ClearColor([r, g, b, a]));
    }

    fn clear(&self, mask: ClearMask) {
        self.record(GlCall::Clear(mask));
    }

    fn supports_extension(&self, name: &str) -> bool {
        self.extensions.lock().contains(name)
    }

    fn is_context_lost(&self) -> bool {
        self.state.lock().context_lost
    }
}

/// Collects active attributes (vertex stage) and uniforms (both stages) from
/// GLSL declarations, in declaration order.
fn introspect(vertex: &MockShader, fragment: &MockShader) -> (Vec<ActiveInfo>, Vec<ActiveInfo>) {
    let mut attributes = Vec::new();
    let mut uniforms: Vec<ActiveInfo> = Vec::new();

    for shader in [vertex, fragment] {
        for decl in declarations(&shader.source) {
            match decl.qualifier {
                Qualifier::Uniform => {
                    if !uniforms.iter().any(|u| u.name == decl.info.name) {
                        uniforms.push(decl.info);
                    }
                }
                Qualifier::Attribute if shader.stage == ShaderStage::Vertex => {
                    attributes.push(decl.info);
                }
                Qualifier::Attribute => {}
            }
        }
    }
    (attributes, uniforms)
}

enum Qualifier {
    Uniform,
    Attribute,
}

struct Declaration {
    qualifier: Qualifier,
    info: ActiveInfo,
}

fn declarations(source: &str) -> Vec<Declaration> {
    let mut defines: BTreeMap<String, i32> = BTreeMap::new();
    let mut body = String::new();

    for line in strip_comments(source).lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("#define") {
            let mut parts = rest.split_whitespace();
            if let (Some(name), Some(value)) = (parts.next(), parts.next())
                && let Ok(value) = value.parse()
            {
                defines.insert(name.to_string(), value);
            }
        } else if !trimmed.starts_with('#') {
            body.push_str(line);
            body.push('\n');
        }
    }

    body.split([';', '{', '}'])
        .filter_map(|statement| parse_declaration(statement, &defines))
        .collect()
}

fn parse_declaration(statement: &str, defines: &BTreeMap<String, i32>) -> Option<Declaration> {
    let mut tokens = statement
        .split_whitespace()
        .filter(|t| !matches!(*t, "lowp" | "mediump" | "highp"));
    let qualifier = match tokens.next()? {
        "uniform" => Qualifier::Uniform,
        "attribute" => Qualifier::Attribute,
        _ => return None,
    };
    let kind = gl_type(tokens.next()?)?;
    let declarator: String = tokens.collect();
    let (name, size) = match declarator.split_once('[') {
        Some((name, rest)) => {
            let len = rest.trim_end_matches(']').trim();
            let size = len
                .parse()
                .ok()
                .or_else(|| defines.get(len).copied())
                .unwrap_or(1);
            (format!("{name}[0]"), size)
        }
        None => (declarator, 1),
    };
    if name.is_empty() {
        return None;
    }
    Some(Declaration {
        qualifier,
        info: ActiveInfo { name, size, kind },
    })
}

fn strip_comments(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;
    loop {
        let line = rest.find("//");
        let block = rest.find("/*");
        match (line, block) {
            (Some(l), b) if b.is_none_or(|b| l < b) => {
                out.push_str(&rest[..l]);
                rest = &rest[l..];
                match rest.find('\n') {
                    Some(end) => rest = &rest[end..],
                    None => break,
                }
            }
            (_, Some(b)) => {
                out.push_str(&rest[..b]);
                match rest[b..].find("*/") {
                    Some(end) => rest = &rest[b + end + 2..],
                    None => break,
                }
            }
            _ => {
                out.push_str(rest);
                break;
            }
        }
    }
    out
}

fn gl_type(token: &str) -> Option<u32> {
    Some(match token {
        "float" => consts::FLOAT,
        "vec2" => consts::FLOAT_VEC2,
        "vec3" => consts::FLOAT_VEC3,
        "vec4" => consts::FLOAT_VEC4,
        "int" => consts::INT,
        "ivec2" => consts::INT_VEC2,
        "ivec3" => consts::INT_VEC3,
        "ivec4" => consts::INT_VEC4,
        "bool" => consts::BOOL,
        "bvec2" => consts::BOOL_VEC2,
        "bvec3" => consts::BOOL_VEC3,
        "bvec4" => consts::BOOL_VEC4,
        "mat2" => consts::FLOAT_MAT2,
        "mat3" => consts::FLOAT_MAT3,
        "mat4" => consts::FLOAT_MAT4,
        "sampler2D" => consts::SAMPLER_2D,
        "samplerCube" => consts::SAMPLER_CUBE,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERT: &str = "
        #define MAX_LIGHTS 5
        attribute vec3 aPosition;
        attribute vec2 aTexCoord; // trailing comment
        uniform mat4 uModelViewMatrix;
        uniform highp vec3 uPointLightLocation[MAX_LIGHTS];
        /* uniform float uCommentedOut; */
        void main() { gl_Position = vec4(aPosition, 1.0); }
    ";

    const FRAG: &str = "
        precision mediump float;
        uniform sampler2D uSampler;
        uniform mat4 uModelViewMatrix;
        void main() { gl_FragColor = vec4(1.0); }
    ";

    fn link(mock: &MockGlContext, vert: &str, frag: &str) -> GlProgram {
        let program = mock.create_program().unwrap();
        for (stage, src) in [(ShaderStage::Vertex, vert), (ShaderStage::Fragment, frag)] {
            let shader = mock.create_shader(stage).unwrap();
            mock.shader_source(shader, src);
            mock.compile_shader(shader);
            mock.attach_shader(program, shader);
        }
        mock.link_program(program);
        program
    }

    #[test]
    fn test_introspects_declarations() {
        let mock = MockGlContext::new();
        let program = link(&mock, VERT, FRAG);
        assert!(mock.program_link_status(program));

        assert_eq!(mock.active_attribute_count(program), 2);
        assert_eq!(mock.attrib_location(program, "aTexCoord"), Some(1));

        let names: Vec<_> = (0..mock.active_uniform_count(program))
            .filter_map(|i| mock.active_uniform(program, i))
            .map(|u| (u.name, u.size))
            .collect();
        assert_eq!(
            names,
            vec![
                ("uModelViewMatrix".to_string(), 1),
                ("uPointLightLocation[0]".to_string(), 5),
                ("uSampler".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_compile_error() {
        let mock = MockGlContext::new();
        let shader = mock.create_shader(ShaderStage::Fragment).unwrap();
        mock.shader_source(shader, "void main() {}\n#error broken\n");
        mock.compile_shader(shader);
        assert!(!mock.shader_compile_status(shader));
        assert!(mock.shader_info_log(shader).contains("#error"));
    }

    #[test]
    fn test_forced_link_failure() {
        let mock = MockGlContext::new();
        mock.fail_next_link("varying mismatch");
        let program = link(&mock, VERT, FRAG);
        assert!(!mock.program_link_status(program));
        assert_eq!(mock.program_info_log(program), "varying mismatch");
    }

    #[test]
    fn test_uniform_upload_is_recorded_by_name() {
        let mock = MockGlContext::new();
        let program = link(&mock, VERT, FRAG);
        mock.use_program(Some(program));
        let loc = mock.uniform_location(program, "uPointLightLocation").unwrap();
        assert_eq!(mock.uniform_location(program, "uPointLightLocation[0]"), Some(loc));
        assert!(mock.uniform_location(program, "uMissing").is_none());

        mock.uniform(
            loc,
            UniformUpload::FloatArray {
                components: 3,
                data: &[1.0, 2.0, 3.0],
            },
        );
        assert_eq!(
            mock.uniform_uploads("uPointLightLocation"),
            vec![RecordedUniform::Floats(vec![1.0, 2.0, 3.0])]
        );
    }

    #[test]
    fn test_buffer_upload_counts() {
        let mock = MockGlContext::new();
        let buffer = mock.create_buffer().unwrap();
        mock.bind_buffer(BufferTarget::Array, Some(buffer));
        mock.buffer_data(BufferTarget::Array, &[0; 12], BufferUsage::DynamicDraw);
        assert_eq!(mock.count_buffer_uploads(), 1);
        assert_eq!(mock.bytes_uploaded(), 12);

        mock.delete_buffer(buffer);
        assert_eq!(mock.live_buffers(), 0);
    }

    #[test]
    fn test_buffer_creates_fail_after_budget() {
        let mock = MockGlContext::new();
        mock.fail_buffer_creates_after(1);
        assert!(mock.create_buffer().is_ok());
        assert!(mock.create_buffer().is_err());
        assert_eq!(mock.live_buffers(), 1);
    }

    #[test]
    fn test_clear_calls() {
        let mock = MockGlContext::new();
        mock.create_buffer().unwrap();
        assert_eq!(mock.call_count(), 1);

        mock.clear_calls();
        assert_eq!(mock.call_count(), 0);
    }
}
