//! CPU-side mesh representation used by loaders.

use corelib::{Vec3, bounds::Aabb};

/// Vertex with position/normal/uv. Values are in object space.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }
}

/// Indexed triangle mesh with tightly-packed vertices.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Returns `true` if both vertex and index buffers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.vertices.iter().map(|v| Vec3::from(v.position)))
    }
}

/// One drawable part of a model (an OBJ object/group/material run).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshNode {
    pub name: String,
    /// Material requested via `usemtl`, if any.
    pub material: Option<String>,
    pub data: MeshData,
}

/// Loaded model: a named list of drawable nodes sharing one root transform.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAsset {
    pub name: String,
    pub nodes: Vec<MeshNode>,
    /// Material libraries referenced via `mtllib`.
    pub material_libs: Vec<String>,
}

impl MeshAsset {
    /// Union bounding box over every node's geometry.
    pub fn bounds(&self) -> Aabb {
        self.nodes
            .iter()
            .fold(Aabb::EMPTY, |acc, node| acc.union(&node.data.bounds()))
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.iter().map(|n| n.data.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(|n| n.data.indices.len() / 3).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_data_validity() {
        let data = MeshData::new(vec![MeshVertex::default()], vec![0]);
        assert!(data.is_valid());
        assert!(!MeshData::default().is_valid());
    }

    #[test]
    fn asset_bounds_span_all_nodes() {
        let node = |p: [f32; 3]| MeshNode {
            name: "n".into(),
            material: None,
            data: MeshData::new(vec![MeshVertex::new(p, [0.0, 0.0, 1.0], [0.0, 0.0])], vec![0]),
        };
        let asset = MeshAsset {
            name: "pair".into(),
            nodes: vec![node([-1.0, 0.0, 0.0]), node([3.0, 2.0, 1.0])],
            material_libs: Vec::new(),
        };
        let b = asset.bounds();
        assert_eq!(b.min, Vec3::new(-1.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(3.0, 2.0, 1.0));
        assert_eq!(asset.vertex_count(), 2);
    }
}
