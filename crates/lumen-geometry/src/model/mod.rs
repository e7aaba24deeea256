//! 3D model loading from already fetched file contents.

mod obj;
mod stl;

pub use obj::parse_obj;
pub use stl::{
    is_binary as is_binary_stl, parse_ascii as parse_ascii_stl, parse_binary as parse_binary_stl,
    parse_stl,
};

use crate::Geometry;
use crate::error::Result;

/// Supported model file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Obj,
    Stl,
}

impl ModelFormat {
    /// Format for a file extension, case-insensitive, without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "obj" => Some(ModelFormat::Obj),
            "stl" => Some(ModelFormat::Stl),
            _ => None,
        }
    }
}

/// Options applied after parsing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelOptions {
    /// Center and rescale into a ±100 cube, see [`Geometry::normalize`].
    pub normalize: bool,
    pub flip_u: bool,
    pub flip_v: bool,
}

/// Parses a model and prepares its stroke geometry.
pub fn load_model(bytes: &[u8], format: ModelFormat, options: ModelOptions) -> Result<Geometry> {
    let mut geometry = match format {
        ModelFormat::Obj => parse_obj(&String::from_utf8_lossy(bytes))?,
        ModelFormat::Stl => parse_stl(bytes)?,
    };
    if options.normalize {
        geometry.normalize();
    }
    if options.flip_u {
        geometry.flip_u();
    }
    if options.flip_v {
        geometry.flip_v();
    }
    geometry.make_triangle_edges().edges_to_vertices();
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ModelFormat::from_extension("OBJ"), Some(ModelFormat::Obj));
        assert_eq!(ModelFormat::from_extension("stl"), Some(ModelFormat::Stl));
        assert_eq!(ModelFormat::from_extension("fbx"), None);
    }

    #[test]
    fn test_load_model_normalizes_and_builds_edges() {
        let src = b"v 0 0 0\nv 10 0 0\nv 0 5 0\nf 1 2 3\n";
        let options = ModelOptions {
            normalize: true,
            ..Default::default()
        };
        let g = load_model(src, ModelFormat::Obj, options).unwrap();
        assert_eq!(g.edges().len(), 3);
        assert_eq!(g.line_vertices().len(), 18);
        let max_x = g.vertices().iter().map(|v| v.x).fold(f32::MIN, f32::max);
        assert!((max_x - 100.0).abs() < 1e-3);
    }
}
