//! Compiled GL programs with introspected attributes and uniforms.
//!
//! A [`Shader`] compiles lazily on first use. Linking is followed by one pass
//! of program introspection that records every active attribute and uniform,
//! assigns texture units to samplers, and tags the shader with its
//! [`ShaderCapabilities`]. Nothing about a shader's role is assumed from how
//! it was created; the tags come only from what the program declares.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lumen_render::{Shader, ShaderCapabilities};
//! use lumen_test_utils::MockGlContext;
//!
//! let gl = Arc::new(MockGlContext::new());
//! let mut shader = Shader::new(
//!     gl,
//!     "attribute vec3 aPosition;\nuniform mat4 uModelViewMatrix;\nvoid main() {}",
//!     "precision mediump float;\nuniform vec4 uMaterialColor;\nvoid main() {}",
//! );
//! shader.init().unwrap();
//! assert!(shader.capabilities().contains(ShaderCapabilities::COLOR));
//!
//! // Unknown names are ignored.
//! shader.set_uniform("uDoesNotExist", 1.0);
//! ```

use std::borrow::Cow;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use indexmap::IndexMap;
use lumen_core::math::{Matrix3, Matrix4, Vector3};
use lumen_test_utils::{
    BufferTarget, GlBuffer, GlContext, GlProgram, GlShader, ShaderStage, UniformLocation,
    UniformUpload, consts,
};

use crate::color::Color;
use crate::error::{RenderError, Result};
use crate::texture::{TextureId, TextureRegistry};

bitflags::bitflags! {
    /// What a linked program can render, derived from its declarations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderCapabilities: u8 {
        /// Declares any lighting uniform.
        const LIGHT = 1 << 0;
        /// Declares at least one sampler.
        const TEXTURE = 1 << 1;
        /// Reads vertex normals (`aNormal`).
        const NORMAL = 1 << 2;
        /// Colors from `uMaterialColor` or `aVertexColor`.
        const COLOR = 1 << 3;
        /// Expands lines to screen-space width (`uStrokeWeight`).
        const STROKE = 1 << 4;
        /// Sizes points (`uPointSize`).
        const POINT = 1 << 5;
    }
}

const LIGHT_UNIFORMS: &[&str] = &[
    "uUseLighting",
    "uAmbientLightCount",
    "uDirectionalLightCount",
    "uPointLightCount",
    "uSpotLightCount",
    "uAmbientColor",
    "uDirectionalDiffuseColors",
    "uDirectionalSpecularColors",
    "uPointLightLocation",
    "uPointLightDiffuseColors",
    "uPointLightSpecularColors",
    "uLightingDirection",
    "uSpecular",
];

/// A value handed to [`Shader::set_uniform`]. The uniform's declared GL type
/// decides how it is uploaded.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Floats(Vec<f32>),
    Int(i32),
    Ints(Vec<i32>),
    Bool(bool),
    Texture(TextureId),
}

impl UniformValue {
    fn floats(&self) -> Option<Cow<'_, [f32]>> {
        Some(match self {
            UniformValue::Float(v) => Cow::Owned(vec![*v]),
            UniformValue::Floats(v) => Cow::Borrowed(v.as_slice()),
            UniformValue::Int(v) => Cow::Owned(vec![*v as f32]),
            UniformValue::Ints(v) => Cow::Owned(v.iter().map(|&i| i as f32).collect()),
            UniformValue::Bool(b) => Cow::Owned(vec![if *b { 1.0 } else { 0.0 }]),
            UniformValue::Texture(_) => return None,
        })
    }

    fn ints(&self) -> Option<Cow<'_, [i32]>> {
        Some(match self {
            UniformValue::Int(v) => Cow::Owned(vec![*v]),
            UniformValue::Ints(v) => Cow::Borrowed(v.as_slice()),
            UniformValue::Bool(b) => Cow::Owned(vec![i32::from(*b)]),
            UniformValue::Float(v) => Cow::Owned(vec![*v as i32]),
            UniformValue::Floats(v) => Cow::Owned(v.iter().map(|&f| f as i32).collect()),
            UniformValue::Texture(_) => return None,
        })
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Bool(v)
    }
}

impl<const N: usize> From<[f32; N]> for UniformValue {
    fn from(v: [f32; N]) -> Self {
        UniformValue::Floats(v.to_vec())
    }
}

impl<const N: usize> From<[i32; N]> for UniformValue {
    fn from(v: [i32; N]) -> Self {
        UniformValue::Ints(v.to_vec())
    }
}

impl From<&[f32]> for UniformValue {
    fn from(v: &[f32]) -> Self {
        UniformValue::Floats(v.to_vec())
    }
}

impl From<Vec<f32>> for UniformValue {
    fn from(v: Vec<f32>) -> Self {
        UniformValue::Floats(v)
    }
}

impl From<Vec<i32>> for UniformValue {
    fn from(v: Vec<i32>) -> Self {
        UniformValue::Ints(v)
    }
}

impl From<Vector3> for UniformValue {
    fn from(v: Vector3) -> Self {
        UniformValue::Floats(v.to_array().to_vec())
    }
}

impl From<Color> for UniformValue {
    fn from(c: Color) -> Self {
        UniformValue::Floats(c.to_array().to_vec())
    }
}

impl From<&Matrix4> for UniformValue {
    fn from(m: &Matrix4) -> Self {
        UniformValue::Floats(m.as_slice().to_vec())
    }
}

impl From<&Matrix3> for UniformValue {
    fn from(m: &Matrix3) -> Self {
        UniformValue::Floats(m.as_slice().to_vec())
    }
}

impl From<TextureId> for UniformValue {
    fn from(id: TextureId) -> Self {
        UniformValue::Texture(id)
    }
}

/// An active vertex attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeInfo {
    pub name: String,
    pub location: u32,
    /// GL type enum
    pub kind: u32,
    pub size: i32,
}

/// An active uniform and its cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformInfo {
    /// Name with any `[0]` array suffix stripped.
    pub name: String,
    pub location: UniformLocation,
    /// GL type enum
    pub kind: u32,
    /// Array length, `1` for plain uniforms.
    pub size: i32,
    /// Texture unit, for samplers.
    pub sampler_unit: Option<u32>,
    /// Texture waiting to be bound to `sampler_unit`.
    pub texture: Option<TextureId>,
    value: Option<UniformValue>,
    uploaded: bool,
}

impl UniformInfo {
    /// The last value set, whether or not it reached the program yet.
    pub fn value(&self) -> Option<&UniformValue> {
        self.value.as_ref()
    }

    pub fn is_sampler(&self) -> bool {
        self.sampler_unit.is_some()
    }
}

/// A vertex + fragment program.
pub struct Shader {
    gl: Arc<dyn GlContext>,
    vertex_source: String,
    fragment_source: String,
    program: Option<GlProgram>,
    attributes: IndexMap<String, AttributeInfo>,
    uniforms: IndexMap<String, UniformInfo>,
    /// Sampler uniform names in texture unit order.
    samplers: Vec<String>,
    capabilities: ShaderCapabilities,
    bound: bool,
}

impl Shader {
    pub fn new(
        gl: Arc<dyn GlContext>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
    ) -> Self {
        Self {
            gl,
            vertex_source: vertex_source.into(),
            fragment_source: fragment_source.into(),
            program: None,
            attributes: IndexMap::new(),
            uniforms: IndexMap::new(),
            samplers: Vec::new(),
            capabilities: ShaderCapabilities::empty(),
            bound: false,
        }
    }

    /// Compiles, links and introspects the program. Does nothing once it
    /// has succeeded.
    ///
    /// Compile and link failures are logged with the driver's diagnostics
    /// and returned; the shader stays uninitialized.
    pub fn init(&mut self) -> Result<()> {
        if self.program.is_some() {
            return Ok(());
        }
        let gl = Arc::clone(&self.gl);

        let vertex = compile(gl.as_ref(), ShaderStage::Vertex, &self.vertex_source)?;
        let fragment = match compile(gl.as_ref(), ShaderStage::Fragment, &self.fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                gl.delete_shader(vertex);
                return Err(err);
            }
        };

        let program = match gl.create_program() {
            Ok(program) => program,
            Err(err) => {
                gl.delete_shader(vertex);
                gl.delete_shader(fragment);
                return Err(err.into());
            }
        };
        gl.attach_shader(program, vertex);
        gl.attach_shader(program, fragment);
        gl.link_program(program);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        if !gl.program_link_status(program) {
            let log = gl.program_info_log(program);
            tracing::error!("failed to link shader program: {}", log);
            gl.delete_program(program);
            return Err(RenderError::ShaderLink { log });
        }

        self.program = Some(program);
        self.load_attributes(program);
        self.load_uniforms(program);
        self.capabilities = self.classify();
        tracing::debug!(
            "linked shader program {:?}: {} attributes, {} uniforms, {:?}",
            program,
            self.attributes.len(),
            self.uniforms.len(),
            self.capabilities
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.program.is_some()
    }

    pub fn program(&self) -> Option<GlProgram> {
        self.program
    }

    pub fn capabilities(&self) -> ShaderCapabilities {
        self.capabilities
    }

    pub fn is_light_shader(&self) -> bool {
        self.capabilities.contains(ShaderCapabilities::LIGHT)
    }

    pub fn is_texture_shader(&self) -> bool {
        self.capabilities.contains(ShaderCapabilities::TEXTURE)
    }

    pub fn is_normal_shader(&self) -> bool {
        self.capabilities.contains(ShaderCapabilities::NORMAL)
    }

    pub fn is_stroke_shader(&self) -> bool {
        self.capabilities.contains(ShaderCapabilities::STROKE)
    }

    pub fn is_point_shader(&self) -> bool {
        self.capabilities.contains(ShaderCapabilities::POINT)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> impl Iterator<Item = &AttributeInfo> {
        self.attributes.values()
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformInfo> {
        self.uniforms.get(name)
    }

    pub fn uniforms(&self) -> impl Iterator<Item = &UniformInfo> {
        self.uniforms.values()
    }

    pub fn has_uniform(&self, name: &str) -> bool {
        self.uniforms.contains_key(name)
    }

    pub fn samplers(&self) -> &[String] {
        &self.samplers
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    fn load_attributes(&mut self, program: GlProgram) {
        self.attributes.clear();
        for index in 0..self.gl.active_attribute_count(program) {
            let Some(info) = self.gl.active_attribute(program, index) else {
                continue;
            };
            let Some(location) = self.gl.attrib_location(program, &info.name) else {
                continue;
            };
            tracing::trace!("attribute {} at location {}", info.name, location);
            self.attributes.insert(
                info.name.clone(),
                AttributeInfo {
                    name: info.name,
                    location,
                    kind: info.kind,
                    size: info.size,
                },
            );
        }
    }

    fn load_uniforms(&mut self, program: GlProgram) {
        self.uniforms.clear();
        self.samplers.clear();
        let mut next_unit = 0;
        for index in 0..self.gl.active_uniform_count(program) {
            let Some(info) = self.gl.active_uniform(program, index) else {
                continue;
            };
            let Some(location) = self.gl.uniform_location(program, &info.name) else {
                continue;
            };
            let name = info
                .name
                .strip_suffix("[0]")
                .unwrap_or(&info.name)
                .to_string();
            let sampler_unit = (info.kind == consts::SAMPLER_2D).then(|| {
                let unit = next_unit;
                next_unit += 1;
                unit
            });
            if sampler_unit.is_some() {
                self.samplers.push(name.clone());
            }
            self.uniforms.insert(
                name.clone(),
                UniformInfo {
                    name,
                    location,
                    kind: info.kind,
                    size: info.size,
                    sampler_unit,
                    texture: None,
                    value: None,
                    uploaded: false,
                },
            );
        }
    }

    fn classify(&self) -> ShaderCapabilities {
        let mut caps = ShaderCapabilities::empty();
        if LIGHT_UNIFORMS.iter().any(|name| self.has_uniform(name)) {
            caps |= ShaderCapabilities::LIGHT;
        }
        if !self.samplers.is_empty() {
            caps |= ShaderCapabilities::TEXTURE;
        }
        if self.attributes.contains_key("aNormal") {
            caps |= ShaderCapabilities::NORMAL;
        }
        if self.attributes.contains_key("aVertexColor") || self.has_uniform("uMaterialColor") {
            caps |= ShaderCapabilities::COLOR;
        }
        if self.has_uniform("uStrokeWeight") {
            caps |= ShaderCapabilities::STROKE;
        }
        if self.has_uniform("uPointSize") {
            caps |= ShaderCapabilities::POINT;
        }
        caps
    }

    /// Sets a uniform by name.
    ///
    /// Names the program does not declare are ignored, so one set of
    /// uniforms can be pushed to every shader variant. Sampler uniforms take
    /// a [`TextureId`] that is bound by [`Shader::bind_textures`]. Other
    /// values are cached; an unchanged value is not uploaded again, and a
    /// value set while the shader is unbound is uploaded at the next bind.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) {
        let Some(uniform) = self.uniforms.get_mut(name) else {
            return;
        };
        let value = value.into();

        if uniform.is_sampler() {
            match value {
                UniformValue::Texture(id) => uniform.texture = Some(id),
                other => tracing::warn!(
                    "set_uniform: sampler {} needs a texture, got {:?}",
                    uniform.name,
                    other
                ),
            }
            return;
        }

        if uniform.uploaded && uniform.value.as_ref() == Some(&value) {
            return;
        }
        uniform.value = Some(value);
        uniform.uploaded = false;
        if self.bound {
            upload(self.gl.as_ref(), uniform);
        }
    }

    /// Makes this the current program and flushes pending uniforms.
    ///
    /// The returned guard unbinds on drop, unless the shader was already
    /// bound by an outer guard; only the binding guard releases the program.
    pub fn bind(&mut self) -> Result<BoundShader<'_>> {
        self.init()?;
        let owner = !self.bound;
        if owner {
            self.gl.use_program(self.program);
            self.bound = true;
            let gl = Arc::clone(&self.gl);
            for uniform in self.uniforms.values_mut() {
                if let Some(unit) = uniform.sampler_unit {
                    if !uniform.uploaded {
                        gl.uniform(uniform.location, UniformUpload::Int(unit as i32));
                        uniform.uploaded = true;
                    }
                } else if !uniform.uploaded && uniform.value.is_some() {
                    upload(gl.as_ref(), uniform);
                }
            }
        }
        Ok(BoundShader {
            shader: self,
            owner,
        })
    }

    /// Binds every sampler's texture to its unit. Samplers without a
    /// texture are left empty. When one texture fails to bind, the units
    /// bound before it are cleared again.
    pub fn bind_textures(&self, textures: &mut TextureRegistry) -> Result<()> {
        for name in &self.samplers {
            let Some(uniform) = self.uniforms.get(name) else {
                continue;
            };
            let (Some(unit), Some(texture)) = (uniform.sampler_unit, uniform.texture) else {
                continue;
            };
            if let Err(err) = textures.bind(texture, unit) {
                tracing::warn!("bind_textures: {} failed to bind: {}", name, err);
                self.unbind_textures(textures);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Clears the texture units this shader's samplers use.
    pub fn unbind_textures(&self, textures: &TextureRegistry) {
        for uniform in self.uniforms.values() {
            if let (Some(unit), Some(_)) = (uniform.sampler_unit, uniform.texture) {
                textures.unbind(unit);
            }
        }
    }

    /// Points attribute `name` at `buffer`, `components` floats per vertex.
    /// Returns `false` when the program does not read `name`.
    pub fn enable_attribute(&self, name: &str, buffer: GlBuffer, components: i32) -> bool {
        let Some(attribute) = self.attributes.get(name) else {
            return false;
        };
        self.gl.bind_buffer(BufferTarget::Array, Some(buffer));
        self.gl.enable_vertex_attrib_array(attribute.location);
        self.gl
            .vertex_attrib_pointer_f32(attribute.location, components, false, 0, 0);
        true
    }

    pub fn disable_attributes(&self) {
        for attribute in self.attributes.values() {
            self.gl.disable_vertex_attrib_array(attribute.location);
        }
    }

    fn unbind(&mut self) {
        if self.bound {
            self.disable_attributes();
            self.gl.use_program(None);
            self.bound = false;
        }
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        if let Some(program) = self.program.take() {
            self.gl.delete_program(program);
        }
    }
}

impl std::fmt::Debug for Shader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shader")
            .field("program", &self.program)
            .field("capabilities", &self.capabilities)
            .field("attributes", &self.attributes.keys().collect::<Vec<_>>())
            .field("uniforms", &self.uniforms.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A bound shader. Dereferences to the [`Shader`] so uniforms can be set.
pub struct BoundShader<'a> {
    shader: &'a mut Shader,
    owner: bool,
}

impl BoundShader<'_> {
    /// Whether dropping this guard releases the program.
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

impl Deref for BoundShader<'_> {
    type Target = Shader;

    fn deref(&self) -> &Shader {
        self.shader
    }
}

impl DerefMut for BoundShader<'_> {
    fn deref_mut(&mut self) -> &mut Shader {
        self.shader
    }
}

impl Drop for BoundShader<'_> {
    fn drop(&mut self) {
        if self.owner {
            self.shader.unbind();
        }
    }
}

fn compile(gl: &dyn GlContext, stage: ShaderStage, source: &str) -> Result<GlShader> {
    let shader = gl.create_shader(stage)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.shader_compile_status(shader) {
        let log = gl.shader_info_log(shader);
        tracing::error!("failed to compile {} shader: {}", stage, log);
        gl.delete_shader(shader);
        return Err(RenderError::ShaderCompile { stage, log });
    }
    Ok(shader)
}

/// Uploads a cached value with the entry point matching the declared type.
fn upload(gl: &dyn GlContext, uniform: &mut UniformInfo) {
    let Some(value) = &uniform.value else {
        return;
    };
    let size = uniform.size.max(1) as usize;
    let location = uniform.location;
    let ok = match uniform.kind {
        consts::FLOAT_MAT2 => upload_floats(value, 4, size, |f| {
            gl.uniform(location, UniformUpload::Matrix2(f))
        }),
        consts::FLOAT_MAT3 => upload_floats(value, 9, size, |f| {
            gl.uniform(location, UniformUpload::Matrix3(f))
        }),
        consts::FLOAT_MAT4 => upload_floats(value, 16, size, |f| {
            gl.uniform(location, UniformUpload::Matrix4(f))
        }),
        consts::FLOAT if size > 1 => upload_floats(value, 1, size, |data| {
            gl.uniform(location, UniformUpload::FloatArray { components: 1, data })
        }),
        consts::FLOAT => upload_floats(value, 1, 1, |f| gl.uniform(location, UniformUpload::Float(f[0]))),
        consts::FLOAT_VEC2 | consts::FLOAT_VEC3 | consts::FLOAT_VEC4 => {
            let components = vector_components(uniform.kind);
            if size > 1 {
                upload_floats(value, components, size, |data| {
                    gl.uniform(
                        location,
                        UniformUpload::FloatArray {
                            components: components as u8,
                            data,
                        },
                    )
                })
            } else {
                upload_floats(value, components, 1, |f| {
                    let mut values = [0.0; 4];
                    values[..components].copy_from_slice(f);
                    gl.uniform(
                        location,
                        UniformUpload::FloatVec {
                            components: components as u8,
                            values,
                        },
                    )
                })
            }
        }
        consts::INT | consts::BOOL if size > 1 => upload_ints(value, 1, size, |data| {
            gl.uniform(location, UniformUpload::IntArray { components: 1, data })
        }),
        consts::INT | consts::BOOL => upload_ints(value, 1, 1, |i| gl.uniform(location, UniformUpload::Int(i[0]))),
        consts::INT_VEC2
        | consts::INT_VEC3
        | consts::INT_VEC4
        | consts::BOOL_VEC2
        | consts::BOOL_VEC3
        | consts::BOOL_VEC4 => {
            let components = vector_components(uniform.kind);
            if size > 1 {
                upload_ints(value, components, size, |data| {
                    gl.uniform(
                        location,
                        UniformUpload::IntArray {
                            components: components as u8,
                            data,
                        },
                    )
                })
            } else {
                upload_ints(value, components, 1, |i| {
                    let mut values = [0; 4];
                    values[..components].copy_from_slice(i);
                    gl.uniform(
                        location,
                        UniformUpload::IntVec {
                            components: components as u8,
                            values,
                        },
                    )
                })
            }
        }
        other => {
            tracing::warn!("set_uniform: unsupported uniform type {:#x} for {}", other, uniform.name);
            false
        }
    };
    if ok {
        uniform.uploaded = true;
    } else {
        tracing::warn!(
            "set_uniform: value {:?} does not fit uniform {}",
            value,
            uniform.name
        );
    }
}

fn vector_components(kind: u32) -> usize {
    match kind {
        consts::FLOAT_VEC2 | consts::INT_VEC2 | consts::BOOL_VEC2 => 2,
        consts::FLOAT_VEC3 | consts::INT_VEC3 | consts::BOOL_VEC3 => 3,
        _ => 4,
    }
}

/// Calls `f` with whole `components`-sized elements, at most `count` of
/// them. Arrays may be set partially; a plain value needs one full element.
fn upload_floats(value: &UniformValue, components: usize, count: usize, f: impl FnOnce(&[f32])) -> bool {
    let Some(data) = value.floats() else {
        return false;
    };
    upload_slice(&data, components, count, f)
}

fn upload_ints(value: &UniformValue, components: usize, count: usize, f: impl FnOnce(&[i32])) -> bool {
    let Some(data) = value.ints() else {
        return false;
    };
    upload_slice(&data, components, count, f)
}

fn upload_slice<T>(data: &[T], components: usize, count: usize, f: impl FnOnce(&[T])) -> bool {
    if data.len() < components {
        return false;
    }
    let elements = (data.len() / components).min(count);
    f(&data[..elements * components]);
    true
}
