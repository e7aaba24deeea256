//! Wavefront OBJ parsing.

use lumen_core::alloc::HashMap;
use lumen_core::math::Vector3;

use crate::error::{ModelError, Result};
use crate::Geometry;

/// Parses OBJ text into a geometry.
///
/// Supports `v`, `vt`, `vn` and `f` statements. Face corners may be written
/// as `v`, `v/vt`, `v//vn` or `v/vt/vn`, with 1-based or negative (relative)
/// indices. Polygons are fan-triangulated; corners that resolve to the same
/// position, texture and normal entries share one vertex, and triangles that collapse onto a shared vertex are
/// dropped. Texture `v` is flipped so that image row 0 is at the top.
///
/// When the file has no normals for every vertex, smooth normals are
/// computed.
pub fn parse_obj(source: &str) -> Result<Geometry> {
    let mut positions: Vec<Vector3> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<Vector3> = Vec::new();

    let mut vertices = Vec::new();
    let mut vertex_normals = Vec::new();
    let mut uvs = Vec::new();
    let mut faces = Vec::new();
    let mut indexed: HashMap<Corner, u32> = HashMap::default();

    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let mut tokens = line.split_whitespace();
        let Some(keyword) = tokens.next() else { continue };
        let tokens: Vec<&str> = tokens.collect();

        match keyword {
            "v" => positions.push(parse_vector(&tokens, line_no)?),
            "vn" => normals.push(parse_vector(&tokens, line_no)?),
            "vt" => {
                let u = parse_float(tokens.first(), line_no)?;
                let v = match tokens.get(1) {
                    Some(_) => parse_float(tokens.get(1), line_no)?,
                    None => 0.0,
                };
                tex_coords.push([u, 1.0 - v]);
            }
            "f" => {
                if tokens.len() < 3 {
                    return Err(obj_error(line_no, "face needs at least 3 corners"));
                }
                let mut corners = Vec::with_capacity(tokens.len());
                for &token in &tokens {
                    // relative indices resolve against the counts seen so far
                    let corner = parse_corner(token, &positions, &tex_coords, &normals, line_no)?;
                    let index = match indexed.get(&corner) {
                        Some(&index) => index,
                        None => {
                            let index = vertices.len() as u32;
                            vertices.push(positions[corner.position]);
                            uvs.extend_from_slice(&corner.uv.map_or([0.0, 0.0], |t| tex_coords[t]));
                            if let Some(n) = corner.normal {
                                vertex_normals.push(normals[n]);
                            }
                            indexed.insert(corner, index);
                            index
                        }
                    };
                    corners.push(index);
                }
                for tri in 2..corners.len() {
                    let face = [corners[0], corners[tri - 1], corners[tri]];
                    if face[0] != face[1] && face[0] != face[2] && face[1] != face[2] {
                        faces.push(face);
                    }
                }
            }
            _ => {}
        }
    }

    let has_all_normals = vertex_normals.len() == vertices.len();
    if !has_all_normals {
        vertex_normals.clear();
    }
    let mut geometry = Geometry::from_parts(1, 1, vertices, vertex_normals, uvs, faces);
    if !has_all_normals {
        geometry.compute_normals();
    }
    tracing::debug!(
        "parsed OBJ: {} vertices, {} faces",
        geometry.vertices().len(),
        geometry.faces().len()
    );
    Ok(geometry)
}

/// Resolved zero-based indices of one face corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Corner {
    position: usize,
    uv: Option<usize>,
    normal: Option<usize>,
}

fn parse_corner(
    token: &str,
    positions: &[Vector3],
    tex_coords: &[[f32; 2]],
    normals: &[Vector3],
    line: usize,
) -> Result<Corner> {
    let mut parts = token.split('/');
    let position = match parts.next() {
        Some(p) if !p.is_empty() => lookup(positions.len(), p, line)?,
        _ => return Err(obj_error(line, format!("face corner {token:?} has no vertex index"))),
    };
    let uv = match parts.next() {
        Some(t) if !t.is_empty() => Some(lookup(tex_coords.len(), t, line)?),
        _ => None,
    };
    let normal = match parts.next() {
        Some(n) if !n.is_empty() => Some(lookup(normals.len(), n, line)?),
        _ => None,
    };
    Ok(Corner {
        position,
        uv,
        normal,
    })
}

/// Resolves a 1-based or negative OBJ index against `len` entries.
fn lookup(len: usize, token: &str, line: usize) -> Result<usize> {
    let raw: i64 = token
        .parse()
        .map_err(|_| obj_error(line, format!("invalid index {token:?}")))?;
    let index = if raw < 0 { len as i64 + raw } else { raw - 1 };
    usize::try_from(index)
        .ok()
        .filter(|&i| i < len)
        .ok_or_else(|| obj_error(line, format!("index {raw} out of range (have {len})")))
}

fn parse_float(token: Option<&&str>, line: usize) -> Result<f32> {
    let token = token.ok_or_else(|| obj_error(line, "missing coordinate"))?;
    token
        .parse()
        .map_err(|_| obj_error(line, format!("invalid number {token:?}")))
}

fn parse_vector(tokens: &[&str], line: usize) -> Result<Vector3> {
    Ok(Vector3::new(
        parse_float(tokens.first(), line)?,
        parse_float(tokens.get(1), line)?,
        parse_float(tokens.get(2), line)?,
    ))
}

fn obj_error(line: usize, message: impl Into<String>) -> ModelError {
    ModelError::Obj {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# a unit quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_quad_is_fan_triangulated() {
        let g = parse_obj(QUAD).unwrap();
        assert_eq!(g.vertices().len(), 4);
        assert_eq!(g.faces(), &[[0, 1, 2], [0, 2, 3]]);
        // vt v flipped
        assert_eq!(&g.uvs()[..4], &[0.0, 1.0, 1.0, 1.0]);
        // no vn: normals computed
        assert!(g.vertex_normals()[0].abs_diff_eq(Vector3::Z, 1e-5));
    }

    #[test]
    fn test_negative_indices_and_normals() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 -1\nf -3//1 -2//1 -1//1\n";
        let g = parse_obj(src).unwrap();
        assert_eq!(g.faces(), &[[0, 1, 2]]);
        assert_eq!(g.vertex_normals()[0], Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_relative_indices_resolve_per_face() {
        let src = "\
v 0 0 0
v 1 0 0
v 0 1 0
f -3 -2 -1
v 5 0 0
v 6 0 0
v 5 1 0
f -3 -2 -1
f 1 2 3
";
        let g = parse_obj(src).unwrap();
        assert_eq!(g.vertices().len(), 6);
        assert_eq!(g.faces(), &[[0, 1, 2], [3, 4, 5], [0, 1, 2]]);
        assert_eq!(g.vertices()[3], Vector3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_repeated_corner_is_shared_and_degenerate_dropped() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 2\nf 1 2 3\n";
        let g = parse_obj(src).unwrap();
        assert_eq!(g.vertices().len(), 3);
        assert_eq!(g.faces(), &[[0, 1, 2]]);
    }

    #[test]
    fn test_out_of_range_index_reports_line() {
        let err = parse_obj("v 0 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, ModelError::Obj { line: 2, .. }), "{err}");
    }

    #[test]
    fn test_bad_number() {
        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, ModelError::Obj { line: 1, .. }));
    }
}
