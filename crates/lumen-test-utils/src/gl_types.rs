//! Handle and enum types shared by every [`GlContext`](crate::GlContext) backend.
//!
//! Handles are small opaque ids. Backends map them to their native objects,
//! so the renderer never sees a backend-specific type.

use std::fmt;

/// GL type enums reported by active attribute/uniform introspection.
pub mod consts {
    pub const INT: u32 = 0x1404;
    pub const FLOAT: u32 = 0x1406;
    pub const FLOAT_VEC2: u32 = 0x8B50;
    pub const FLOAT_VEC3: u32 = 0x8B51;
    pub const FLOAT_VEC4: u32 = 0x8B52;
    pub const INT_VEC2: u32 = 0x8B53;
    pub const INT_VEC3: u32 = 0x8B54;
    pub const INT_VEC4: u32 = 0x8B55;
    pub const BOOL: u32 = 0x8B56;
    pub const BOOL_VEC2: u32 = 0x8B57;
    pub const BOOL_VEC3: u32 = 0x8B58;
    pub const BOOL_VEC4: u32 = 0x8B59;
    pub const FLOAT_MAT2: u32 = 0x8B5A;
    pub const FLOAT_MAT3: u32 = 0x8B5B;
    pub const FLOAT_MAT4: u32 = 0x8B5C;
    pub const SAMPLER_2D: u32 = 0x8B5E;
    pub const SAMPLER_CUBE: u32 = 0x8B60;
}

macro_rules! gl_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

gl_handle!(
    /// A vertex or index buffer object.
    GlBuffer
);
gl_handle!(
    /// A single compiled shader stage.
    GlShader
);
gl_handle!(
    /// A linked program.
    GlProgram
);
gl_handle!(
    /// A 2D texture object.
    GlTexture
);
gl_handle!(
    /// A uniform location inside one program.
    UniformLocation
);

/// Failure reported by a backend when it cannot create an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlError(pub String);

impl fmt::Display for GlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GL error: {}", self.0)
    }
}

impl std::error::Error for GlError {}

/// One active attribute or uniform as reported by the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveInfo {
    /// Name as GL reports it; arrays carry a `[0]` suffix.
    pub name: String,
    /// Array length, `1` for non-arrays.
    pub size: i32,
    /// GL type enum, see [`consts`].
    pub kind: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
}

/// Primitive topology of a draw call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DrawMode {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

impl IndexType {
    pub fn byte_size(self) -> usize {
        match self {
            IndexType::U16 => 2,
            IndexType::U32 => 4,
        }
    }
}

/// Toggleable server-side capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Blend,
    DepthTest,
    CullFace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthFunc {
    Less,
    LessEqual,
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendEquation {
    Add,
    Subtract,
    ReverseSubtract,
    /// Requires `EXT_blend_minmax` on WebGL 1.
    Min,
    /// Requires `EXT_blend_minmax` on WebGL 1.
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureWrap {
    ClampToEdge,
    Repeat,
    MirroredRepeat,
}

bitflags::bitflags! {
    /// Buffers cleared by [`GlContext::clear`](crate::GlContext::clear).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// A typed uniform upload, mirroring the `glUniform*` entry points.
///
/// Single values (`uniform2f`) and arrays (`uniform2fv`) are distinct
/// variants, as they are distinct GL calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformUpload<'a> {
    Int(i32),
    IntVec { components: u8, values: [i32; 4] },
    IntArray { components: u8, data: &'a [i32] },
    Float(f32),
    FloatVec { components: u8, values: [f32; 4] },
    FloatArray { components: u8, data: &'a [f32] },
    Matrix2(&'a [f32]),
    Matrix3(&'a [f32]),
    Matrix4(&'a [f32]),
}
