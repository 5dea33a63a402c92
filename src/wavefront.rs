use crate::Mesh;
use crate::error::{BakeError, Result};
use rustc_hash::FxHashMap;
use std::path::Path;
use vek::{Vec2, Vec3};

/// Parse an OBJ file from a given file path.
pub fn parse_file(path: impl AsRef<Path>) -> Result<Mesh> {
    let contents = std::fs::read_to_string(path)?;
    parse_obj(&contents)
}

/// Parse an OBJ document into a [`Mesh`].
///
/// Only `v`, `vt` and `f` records are read. Polygons are triangulated as fans and
/// every distinct position/uv pair becomes one vertex of the shared index stream.
/// Corners without a texture coordinate use the position's x and y as UV.
pub fn parse_obj(contents: &str) -> Result<Mesh> {
    let mut vertices: Vec<Vec3<f32>> = Vec::new();
    let mut texture_coords: Vec<Vec2<f32>> = Vec::new();

    let mut mesh = Mesh::default();
    let mut corners: FxHashMap<(usize, Option<usize>), u32> = FxHashMap::default();

    for (number, line) in contents.lines().enumerate() {
        let line_number = number + 1;
        let trimmed = line.trim();

        if trimmed.starts_with('#') || trimmed.is_empty() {
            continue;
        }

        let mut items = trimmed.split_ascii_whitespace();
        match items.next() {
            Some("v") => {
                let x = parse_float(items.next(), line_number)?;
                let y = parse_float(items.next(), line_number)?;
                let z = parse_float(items.next(), line_number)?;
                vertices.push(Vec3::new(x, y, z));
            }
            Some("vt") => {
                let u = parse_float(items.next(), line_number)?;
                let v = parse_float(items.next(), line_number)?;
                texture_coords.push(Vec2::new(u, v));
            }
            Some("f") => {
                let mut face = Vec::new();
                for item in items {
                    let (v, vt) =
                        parse_corner(item, vertices.len(), texture_coords.len(), line_number)?;

                    let index = *corners.entry((v, vt)).or_insert_with(|| {
                        let p = vertices[v];
                        let uv = vt.map_or(Vec2::new(p.x, p.y), |t| texture_coords[t]);
                        mesh.positions.extend_from_slice(&[p.x, p.y, p.z]);
                        mesh.uvs.extend_from_slice(&[uv.x, uv.y]);
                        (mesh.positions.len() / 3 - 1) as u32
                    });
                    face.push(index);
                }

                if face.len() < 3 {
                    return Err(BakeError::Parse {
                        line: line_number,
                        message: format!("face has {} corners", face.len()),
                    });
                }
                for i in 1..face.len() - 1 {
                    mesh.indices
                        .extend_from_slice(&[face[0], face[i], face[i + 1]]);
                }
            }
            // Normals, groups, materials and smoothing are not needed for baking
            _ => {}
        }
    }

    Ok(mesh)
}

fn parse_float(item: Option<&str>, line: usize) -> Result<f32> {
    let item = item.ok_or_else(|| BakeError::Parse {
        line,
        message: "missing coordinate".into(),
    })?;
    item.parse().map_err(|_| BakeError::Parse {
        line,
        message: format!("invalid number '{item}'"),
    })
}

/// Resolves a `v`, `v/vt`, `v//vn` or `v/vt/vn` corner into zero based indices.
fn parse_corner(
    item: &str,
    vertex_count: usize,
    uv_count: usize,
    line: usize,
) -> Result<(usize, Option<usize>)> {
    let mut parts = item.split('/');
    let v = resolve_index(parts.next(), vertex_count, line)?.ok_or_else(|| BakeError::Parse {
        line,
        message: format!("face corner '{item}' has no vertex"),
    })?;
    let vt = resolve_index(parts.next(), uv_count, line)?;
    Ok((v, vt))
}

/// OBJ indices are one based, negative values count back from the last element.
fn resolve_index(part: Option<&str>, count: usize, line: usize) -> Result<Option<usize>> {
    let Some(part) = part.filter(|p| !p.is_empty()) else {
        return Ok(None);
    };
    let index: i64 = part.parse().map_err(|_| BakeError::Parse {
        line,
        message: format!("invalid index '{part}'"),
    })?;

    let resolved = if index < 0 {
        count as i64 + index
    } else {
        index - 1
    };
    if resolved < 0 || resolved as usize >= count {
        return Err(BakeError::Parse {
            line,
            message: format!("index {index} out of range for {count} elements"),
        });
    }
    Ok(Some(resolved as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = r#"
# unit quad
v 0 0 0
v 1 0 0
v 1 0 -1
v 0 0 -1
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 1 0
f 1/1/1 2/2/1 3/3/1 4/4/1
"#;

    #[test]
    fn quad_is_fan_triangulated() {
        let mesh = parse_obj(QUAD).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.uv(2), Vec2::new(1.0, 1.0));
        assert_eq!(mesh.position(3), Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn seams_split_shared_positions() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\nvt 1 0\nvt 0 1\nvt 0.5 0.5\n\
                   f 1/1 2/2 3/3\nf 1/4 3/3 2/2\n";
        let mesh = parse_obj(obj).unwrap();
        // Vertex 1 appears with two different UVs
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.uv(3), Vec2::new(0.5, 0.5));
    }

    #[test]
    fn missing_uvs_fall_back_to_planar() {
        let mesh = parse_obj("v 0.25 0.5 3\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n").unwrap();
        assert_eq!(mesh.uv(0), Vec2::new(0.25, 0.5));
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn reports_the_failing_line() {
        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert!(matches!(err, BakeError::Parse { line: 3, .. }));

        let err = parse_obj("v 0 zero 0\n").unwrap_err();
        assert!(matches!(err, BakeError::Parse { line: 1, .. }));

        assert!(parse_obj("v 0 0 0\nf 1 1\n").is_err());
    }
}
