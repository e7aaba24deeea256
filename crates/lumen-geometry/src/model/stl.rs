//! Binary and ASCII STL parsing.

use lumen_core::math::Vector3;

use crate::error::{ModelError, Result};
use crate::Geometry;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// Parses STL data, detecting binary vs ASCII encoding.
pub fn parse_stl(bytes: &[u8]) -> Result<Geometry> {
    if is_binary(bytes) {
        parse_binary(bytes)
    } else {
        parse_ascii(&String::from_utf8_lossy(bytes))
    }
}

/// Binary when the size matches the facet count in the header exactly, or
/// when the data does not start with `solid` (after up to five BOM bytes).
pub fn is_binary(bytes: &[u8]) -> bool {
    if let Some(count) = read_u32(bytes, HEADER_LEN) {
        let expected = HEADER_LEN + 4 + count as usize * FACET_LEN;
        if expected == bytes.len() {
            return true;
        }
    }
    !(0..5).any(|offset| bytes.get(offset..offset + 5) == Some(b"solid".as_slice()))
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw: [u8; 4] = bytes.get(at..at + 4)?.try_into().ok()?;
    Some(u32::from_le_bytes(raw))
}

fn read_u16(bytes: &[u8], at: usize) -> Option<u16> {
    let raw: [u8; 2] = bytes.get(at..at + 2)?.try_into().ok()?;
    Some(u16::from_le_bytes(raw))
}

fn read_f32(bytes: &[u8], at: usize) -> Option<f32> {
    read_u32(bytes, at).map(f32::from_bits)
}

fn read_vector(bytes: &[u8], at: usize) -> Option<Vector3> {
    Some(Vector3::new(
        read_f32(bytes, at)?,
        read_f32(bytes, at + 4)?,
        read_f32(bytes, at + 8)?,
    ))
}

/// Default RGBA from a `COLOR=rgba` sequence in the header, if present.
fn header_color(bytes: &[u8]) -> Option<[f32; 4]> {
    let header = bytes.get(..HEADER_LEN)?;
    header
        .windows(10)
        .rev()
        .find(|w| w.starts_with(b"COLOR="))
        .map(|w| {
            [
                w[6] as f32 / 255.0,
                w[7] as f32 / 255.0,
                w[8] as f32 / 255.0,
                w[9] as f32 / 255.0,
            ]
        })
}

/// Parses binary STL. When the header carries a default color, per-facet
/// 15-bit colors (bit 15 clear) override it and vertex colors are emitted.
pub fn parse_binary(bytes: &[u8]) -> Result<Geometry> {
    let facets = read_u32(bytes, HEADER_LEN).ok_or(ModelError::TruncatedStl {
        expected: HEADER_LEN + 4,
        actual: bytes.len(),
    })? as usize;
    let expected = HEADER_LEN + 4 + facets * FACET_LEN;
    if bytes.len() < expected {
        return Err(ModelError::TruncatedStl {
            expected,
            actual: bytes.len(),
        });
    }

    let default_color = header_color(bytes);
    let mut vertices = Vec::with_capacity(facets * 3);
    let mut normals = Vec::with_capacity(facets * 3);
    let mut colors = Vec::new();
    let mut faces = Vec::with_capacity(facets);
    let truncated = || ModelError::TruncatedStl {
        expected,
        actual: bytes.len(),
    };

    for facet in 0..facets {
        let start = HEADER_LEN + 4 + facet * FACET_LEN;
        let normal = read_vector(bytes, start).ok_or_else(truncated)?;
        for corner in 1..=3 {
            vertices.push(read_vector(bytes, start + corner * 12).ok_or_else(truncated)?);
            normals.push(normal);
        }
        if let Some(default) = default_color {
            let packed = read_u16(bytes, start + 48).ok_or_else(truncated)?;
            let color = if packed & 0x8000 == 0 {
                [
                    (packed & 0x1f) as f32 / 31.0,
                    ((packed >> 5) & 0x1f) as f32 / 31.0,
                    ((packed >> 10) & 0x1f) as f32 / 31.0,
                    1.0,
                ]
            } else {
                default
            };
            for _ in 0..3 {
                colors.extend_from_slice(&color);
            }
        }
        let base = facet as u32 * 3;
        faces.push([base, base + 1, base + 2]);
    }

    let uvs = vec![0.0; vertices.len() * 2];
    let mut geometry = Geometry::from_parts(1, 1, vertices, normals, uvs, faces);
    if !colors.is_empty() {
        *geometry.vertex_colors_mut() = colors;
    }
    tracing::debug!("parsed binary STL: {} facets", facets);
    Ok(geometry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AsciiState {
    Start,
    Solid,
    FacetNormal,
    Vertex,
    EndLoop,
    EndFacet,
    EndSolid,
}

/// Parses ASCII STL with a `solid` / `facet normal` / `outer loop` /
/// `vertex` / `endloop` / `endfacet` / `endsolid` state machine.
pub fn parse_ascii(source: &str) -> Result<Geometry> {
    let mut state = AsciiState::Start;
    let mut vertices = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();
    let mut normal = Vector3::ZERO;
    let mut loop_start = 0u32;

    for (line_no, line) in source.lines().enumerate() {
        let line_no = line_no + 1;
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&keyword) = parts.first() else { continue };
        let second = parts.get(1).copied();

        state = match state {
            AsciiState::Start if keyword == "solid" => AsciiState::Solid,
            AsciiState::Start => return Err(unexpected(line_no, keyword, "solid")),
            AsciiState::Solid | AsciiState::EndFacet
                if keyword == "facet" && second == Some("normal") =>
            {
                normal = parse_coords(&parts[2..], line_no)?;
                AsciiState::FacetNormal
            }
            AsciiState::EndFacet if keyword == "endsolid" => AsciiState::EndSolid,
            AsciiState::Solid | AsciiState::EndFacet => {
                return Err(unexpected(line_no, keyword, "facet normal"));
            }
            AsciiState::FacetNormal if keyword == "outer" && second == Some("loop") => {
                loop_start = vertices.len() as u32;
                AsciiState::Vertex
            }
            AsciiState::FacetNormal => return Err(unexpected(line_no, keyword, "outer loop")),
            AsciiState::Vertex if keyword == "vertex" => {
                vertices.push(parse_coords(&parts[1..], line_no)?);
                normals.push(normal);
                AsciiState::Vertex
            }
            AsciiState::Vertex if keyword == "endloop" => {
                let end = vertices.len() as u32;
                if end - loop_start < 3 {
                    return Err(ModelError::Stl {
                        line: line_no,
                        message: format!("loop has {} vertices, need 3", end - loop_start),
                    });
                }
                for i in loop_start + 2..end {
                    faces.push([loop_start, i - 1, i]);
                }
                AsciiState::EndLoop
            }
            AsciiState::Vertex => return Err(unexpected(line_no, keyword, "vertex or endloop")),
            AsciiState::EndLoop if keyword == "endfacet" => AsciiState::EndFacet,
            AsciiState::EndLoop => return Err(unexpected(line_no, keyword, "endfacet")),
            AsciiState::EndSolid => break,
        };
    }

    let uvs = vec![0.0; vertices.len() * 2];
    tracing::debug!("parsed ASCII STL: {} faces", faces.len());
    Ok(Geometry::from_parts(1, 1, vertices, normals, uvs, faces))
}

fn parse_coords(parts: &[&str], line: usize) -> Result<Vector3> {
    let mut coords = [0.0f32; 3];
    for (i, c) in coords.iter_mut().enumerate() {
        let token = parts.get(i).ok_or_else(|| ModelError::Stl {
            line,
            message: "expected 3 coordinates".to_string(),
        })?;
        *c = token.parse().map_err(|_| ModelError::Stl {
            line,
            message: format!("invalid number {token:?}"),
        })?;
    }
    Ok(Vector3::from(coords))
}

fn unexpected(line: usize, found: &str, wanted: &str) -> ModelError {
    ModelError::Stl {
        line,
        message: format!("unexpected {found:?}, expected \"{wanted}\""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASCII: &str = "\
solid cube
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 0 0
      vertex 1 1 0
    endloop
  endfacet
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 1 1 0
      vertex 0 1 0
    endloop
  endfacet
endsolid cube
";

    fn binary(facets: &[([f32; 3], [[f32; 3]; 3], u16)], header: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; HEADER_LEN];
        out[..header.len()].copy_from_slice(header);
        out.extend_from_slice(&(facets.len() as u32).to_le_bytes());
        for (normal, corners, attr) in facets {
            for v in std::iter::once(normal).chain(corners.iter()) {
                for c in v {
                    out.extend_from_slice(&c.to_le_bytes());
                }
            }
            out.extend_from_slice(&attr.to_le_bytes());
        }
        out
    }

    #[test]
    fn test_ascii() {
        let bytes = ASCII.as_bytes();
        assert!(!is_binary(bytes));
        let g = parse_stl(bytes).unwrap();
        assert_eq!(g.vertices().len(), 6);
        assert_eq!(g.faces(), &[[0, 1, 2], [3, 4, 5]]);
        assert_eq!(g.vertex_normals()[5], Vector3::Z);
    }

    #[test]
    fn test_ascii_bad_state() {
        let err = parse_ascii("solid x\nvertex 0 0 0\n").unwrap_err();
        assert!(matches!(err, ModelError::Stl { line: 2, .. }), "{err}");
    }

    #[test]
    fn test_binary() {
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let bytes = binary(&[([0.0, 0.0, 1.0], tri, 0)], b"binary stl");
        assert!(is_binary(&bytes));
        let g = parse_stl(&bytes).unwrap();
        assert_eq!(g.vertices()[1], Vector3::X);
        assert_eq!(g.faces(), &[[0, 1, 2]]);
        assert!(g.vertex_colors().is_empty());
    }

    #[test]
    fn test_binary_colors() {
        let tri = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let header = b"COLOR=\xff\x00\x00\xff";
        // facet 0: own color, pure blue (b = 31); facet 1: default (bit 15 set)
        let bytes = binary(&[([0.0; 3], tri, 31 << 10), ([0.0; 3], tri, 0x8000)], header);
        let g = parse_binary(&bytes).unwrap();
        let colors = g.vertex_colors();
        assert_eq!(colors.len(), 6 * 4);
        assert_eq!(&colors[..4], &[0.0, 0.0, 1.0, 1.0]);
        assert_eq!(&colors[12..16], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_binary_truncated() {
        let tri = [[0.0; 3]; 3];
        let mut bytes = binary(&[([0.0; 3], tri, 0)], b"x");
        bytes.truncate(100);
        assert!(matches!(
            parse_binary(&bytes),
            Err(ModelError::TruncatedStl { expected: 134, actual: 100 })
        ));
    }
}
