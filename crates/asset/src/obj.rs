//! OBJ parser supporting positions, normals, texture coordinates,
//! objects/groups (`o`/`g`), material runs (`usemtl`) and `mtllib` references.
//!
//! Every object, group or material run becomes its own [`MeshNode`]. Vertices
//! without an explicit normal get an area-weighted normal from their faces.

use std::{
    collections::HashMap,
    io::{self, BufRead},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use corelib::Vec3;

use crate::mesh::{MeshAsset, MeshData, MeshNode, MeshVertex};

/// Load an OBJ mesh from a [`BufRead`] implementation.
pub fn load_obj_from_reader<R: BufRead>(reader: R) -> Result<MeshAsset> {
    parse_obj(reader)
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str) -> Result<MeshAsset> {
    parse_obj(io::Cursor::new(contents))
}

pub(crate) fn asset_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "model".to_string())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

/// Node under construction; dedupes vertices within the node.
#[derive(Default)]
struct NodeBuilder {
    name: String,
    material: Option<String>,
    unique: HashMap<Key, u32>,
    vertices: Vec<MeshVertex>,
    missing_normal: Vec<bool>,
    indices: Vec<u32>,
}

impl NodeBuilder {
    fn named(name: String, material: Option<String>) -> Self {
        Self {
            name,
            material,
            ..Self::default()
        }
    }

    fn has_triangles(&self) -> bool {
        !self.indices.is_empty()
    }

    fn finish(mut self) -> MeshNode {
        if self.missing_normal.iter().any(|m| *m) {
            fill_missing_normals(&mut self.vertices, &self.indices, &self.missing_normal);
        }
        MeshNode {
            name: self.name,
            material: self.material,
            data: MeshData::new(self.vertices, self.indices),
        }
    }
}

fn parse_obj<R: BufRead>(reader: R) -> Result<MeshAsset> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();

    let mut nodes: Vec<MeshNode> = Vec::new();
    let mut material_libs: Vec<String> = Vec::new();
    let mut current = NodeBuilder::named("default".to_string(), None);

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                // v is optional and defaults to 0.
                let v = match parts.next() {
                    Some(tok) => parse_f32(Some(tok), line_no, "v coordinate")?,
                    None => 0.0,
                };
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                let material = current.material.clone();
                let next = NodeBuilder::named(
                    if name.is_empty() { "default".to_string() } else { name },
                    material,
                );
                let prev = std::mem::replace(&mut current, next);
                if prev.has_triangles() {
                    nodes.push(prev.finish());
                }
            }
            "usemtl" => {
                let material = parts.next().map(str::to_string);
                if current.has_triangles() {
                    let next = NodeBuilder::named(current.name.clone(), material);
                    nodes.push(std::mem::replace(&mut current, next).finish());
                } else {
                    current.material = material;
                }
            }
            "mtllib" => {
                let lib = parts.collect::<Vec<_>>().join(" ");
                if !lib.is_empty() {
                    material_libs.push(lib);
                }
            }
            "f" => {
                let mut face_indices: Vec<u32> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?;
                    let key = Key(vi, vti, vni);
                    let index = match current.unique.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let position = positions.get(vi).copied().ok_or_else(|| {
                                anyhow!("Position index out of bounds on line {}", line_no + 1)
                            })?;
                            let uv = vti
                                .and_then(|i| texcoords.get(i).copied())
                                .unwrap_or([0.0, 0.0]);
                            let normal = vni.and_then(|i| normals.get(i).copied());

                            let idx = u32::try_from(current.vertices.len())
                                .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                            current.vertices.push(MeshVertex::new(
                                position,
                                normal.unwrap_or([0.0, 0.0, 0.0]),
                                uv,
                            ));
                            current.missing_normal.push(normal.is_none());
                            current.unique.insert(key, idx);
                            idx
                        }
                    };
                    face_indices.push(index);
                }

                if face_indices.len() < 3 {
                    continue;
                }
                // Triangulate fan
                for tri in 1..(face_indices.len() - 1) {
                    current.indices.push(face_indices[0]);
                    current.indices.push(face_indices[tri]);
                    current.indices.push(face_indices[tri + 1]);
                }
            }
            _ => {
                // Ignore other directives (s/l/p/etc.)
            }
        }
    }

    if current.has_triangles() {
        nodes.push(current.finish());
    }

    if nodes.is_empty() {
        anyhow::bail!("OBJ contained no triangles");
    }

    Ok(MeshAsset {
        name: "model".to_string(),
        nodes,
        material_libs,
    })
}

/// Area-weighted face normals accumulated into vertices that had none.
fn fill_missing_normals(vertices: &mut [MeshVertex], indices: &[u32], missing: &[bool]) {
    let mut acc = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        let pa = Vec3::from(vertices[a].position);
        let pb = Vec3::from(vertices[b].position);
        let pc = Vec3::from(vertices[c].position);
        // Not normalized: length is twice the triangle area.
        let n = (pb - pa).cross(pc - pa);
        acc[a] += n;
        acc[b] += n;
        acc[c] += n;
    }
    for ((vertex, n), missing) in vertices.iter_mut().zip(acc).zip(missing) {
        if *missing {
            vertex.normal = n.try_normalize().unwrap_or(Vec3::Z).to_array();
        }
    }
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i64>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 { raw - 1 } else { len as i64 + raw };

    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let mesh = load_obj_from_str(src).expect("parse triangle");
        assert_eq!(mesh.nodes.len(), 1);
        let node = &mesh.nodes[0];
        assert_eq!(node.data.vertices.len(), 3);
        assert_eq!(node.data.indices.len(), 3);
        assert!(node.data.is_valid());
    }

    #[test]
    fn groups_and_materials_split_nodes() {
        let src = r#"
            mtllib male02.mtl
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            o body
            usemtl skin
            f 1 2 3
            usemtl cloth
            f 1 3 4
            g head
            f -4 -3 -2
        "#;
        let mesh = load_obj_from_str(src).expect("parse groups");
        assert_eq!(mesh.material_libs, vec!["male02.mtl".to_string()]);
        let summary: Vec<(&str, Option<&str>)> = mesh
            .nodes
            .iter()
            .map(|n| (n.name.as_str(), n.material.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("body", Some("skin")),
                ("body", Some("cloth")),
                ("head", Some("cloth")),
            ]
        );
        assert_eq!(mesh.triangle_count(), 3);
    }

    #[test]
    fn quad_is_fan_triangulated() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = load_obj_from_str(src).unwrap();
        assert_eq!(mesh.nodes[0].data.indices, vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn missing_normals_are_generated() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_obj_from_str(src).unwrap();
        for v in &mesh.nodes[0].data.vertices {
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn single_component_texcoord_defaults_v() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25\nvt 0.5 0.75\nf 1/1 2/2 3/1\n";
        let mesh = load_obj_from_str(src).expect("1D texcoords");
        let uvs: Vec<[f32; 2]> = mesh.nodes[0].data.vertices.iter().map(|v| v.uv).collect();
        assert_eq!(uvs, vec![[0.25, 0.0], [0.5, 0.75], [0.25, 0.0]]);
        assert!(load_obj_from_str("v 0 0 0\nvt\n").is_err());
    }

    #[test]
    fn rejects_out_of_range_and_empty() {
        assert!(load_obj_from_str("v 0 0 0\nf 1 2 3\n").is_err());
        assert!(load_obj_from_str("v 0 0 0\nf 0 1 1\n").is_err());
        assert!(load_obj_from_str("# nothing here\n").is_err());
    }
}
