//! Unit sphere meshes for instanced node drawing

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Subdivision level of the leaf mesh (42 vertices)
pub const LEAF_SUBDIVISIONS: u32 = 1;

/// Subdivision level of the hub mesh (162 vertices)
pub const HUB_SUBDIVISIONS: u32 = 2;

/// A mesh vertex with position and normal.
///
/// Layout matches the WGSL `MeshVertex` input.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Vertex on the unit sphere, whose normal is its position
    fn on_sphere(p: Vec3) -> Self {
        let p = p.normalize_or(Vec3::Z).to_array();
        Self {
            position: p,
            normal: p,
        }
    }
}

/// Indexed triangle mesh.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Unit icosphere with `subdivisions` rounds of 4-way triangle splitting.
///
/// ```
/// use graphscape::gpu::geometry::icosphere;
///
/// let mesh = icosphere(2);
/// assert_eq!(mesh.vertices.len(), 162);
/// assert_eq!(mesh.indices.len(), 320 * 3);
/// ```
pub fn icosphere(subdivisions: u32) -> Mesh {
    let phi = (1.0 + 5.0_f32.sqrt()) / 2.0;

    let mut points: Vec<Vec3> = [
        (-1.0, phi, 0.0),
        (1.0, phi, 0.0),
        (-1.0, -phi, 0.0),
        (1.0, -phi, 0.0),
        (0.0, -1.0, phi),
        (0.0, 1.0, phi),
        (0.0, -1.0, -phi),
        (0.0, 1.0, -phi),
        (phi, 0.0, -1.0),
        (phi, 0.0, 1.0),
        (-phi, 0.0, -1.0),
        (-phi, 0.0, 1.0),
    ]
    .into_iter()
    .map(|(x, y, z)| Vec3::new(x, y, z).normalize())
    .collect();

    let mut faces: Vec<[u32; 3]> = vec![
        [0, 11, 5],
        [0, 5, 1],
        [0, 1, 7],
        [0, 7, 10],
        [0, 10, 11],
        [1, 5, 9],
        [5, 11, 4],
        [11, 10, 2],
        [10, 7, 6],
        [7, 1, 8],
        [3, 9, 4],
        [3, 4, 2],
        [3, 2, 6],
        [3, 6, 8],
        [3, 8, 9],
        [4, 9, 5],
        [2, 4, 11],
        [6, 2, 10],
        [8, 6, 7],
        [9, 8, 1],
    ];

    for _ in 0..subdivisions {
        let mut midpoints: HashMap<(u32, u32), u32> = HashMap::new();
        let mut split = |a: u32, b: u32, points: &mut Vec<Vec3>| -> u32 {
            let key = (a.min(b), a.max(b));
            *midpoints.entry(key).or_insert_with(|| {
                let mid = (points[a as usize] + points[b as usize]).normalize();
                points.push(mid);
                (points.len() - 1) as u32
            })
        };

        faces = faces
            .iter()
            .flat_map(|&[v1, v2, v3]| {
                let a = split(v1, v2, &mut points);
                let b = split(v2, v3, &mut points);
                let c = split(v3, v1, &mut points);
                [[v1, a, c], [v2, b, a], [v3, c, b], [a, b, c]]
            })
            .collect();
    }

    Mesh {
        vertices: points.into_iter().map(MeshVertex::on_sphere).collect(),
        indices: faces.into_iter().flatten().collect(),
    }
}
