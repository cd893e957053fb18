use bevy::{
    asset::RenderAssetUsages,
    prelude::*,
    render::{mesh::Indices, primitives::Aabb, render_resource::PrimitiveTopology},
};
use std::collections::BTreeMap;

use crate::model::document::VoxelChunk;

/// Outward normal and the four corners of each cube face, counter-clockwise
/// seen from outside.
const FACES: [([i32; 3], [[f32; 3]; 4]); 6] = [
    ([1, 0, 0], [[1., 0., 0.], [1., 1., 0.], [1., 1., 1.], [1., 0., 1.]]),
    ([-1, 0, 0], [[0., 0., 0.], [0., 0., 1.], [0., 1., 1.], [0., 1., 0.]]),
    ([0, 1, 0], [[0., 1., 0.], [0., 1., 1.], [1., 1., 1.], [1., 1., 0.]]),
    ([0, -1, 0], [[0., 0., 0.], [1., 0., 0.], [1., 0., 1.], [0., 0., 1.]]),
    ([0, 0, 1], [[0., 0., 1.], [1., 0., 1.], [1., 1., 1.], [0., 1., 1.]]),
    ([0, 0, -1], [[0., 0., 0.], [0., 1., 0.], [1., 1., 0.], [1., 0., 0.]]),
];

/// Triangle mesh of a chunk's exposed faces, centered on the chunk center.
pub struct ChunkMesh {
    pub mesh: Mesh,
    /// `None` when the chunk has no voxels.
    pub aabb: Option<Aabb>,
    pub faces: usize,
}

/// Build the mesh for one chunk. Palette entries are sRGBA; the vertex colors
/// are linear. Duplicate voxel positions keep the last color.
pub fn chunk_mesh(chunk: &VoxelChunk, palette: &[[u8; 4]]) -> ChunkMesh {
    let cells: BTreeMap<[i32; 3], u32> = chunk
        .voxels
        .iter()
        .map(|&[x, y, z, c]| ([x as i32, y as i32, z as i32], c))
        .collect();
    let half = Vec3::from_array(chunk.size.map(|s| s as f32)) * 0.5;

    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut colors: Vec<[f32; 4]> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);

    for (&[x, y, z], &c) in &cells {
        let color = palette
            .get(c as usize)
            .map(|&[r, g, b, a]| Color::srgba_u8(r, g, b, a).to_linear().to_f32_array())
            .unwrap_or([1.0; 4]);
        let cell = Vec3::new(x as f32, y as f32, z as f32) - half;
        min = min.min(cell);
        max = max.max(cell + Vec3::ONE);

        for (normal, corners) in FACES {
            let neighbour = [x + normal[0], y + normal[1], z + normal[2]];
            if cells.contains_key(&neighbour) {
                continue;
            }
            let base = positions.len() as u32;
            for corner in corners {
                positions.push((cell + Vec3::from_array(corner)).to_array());
                normals.push(normal.map(|n| n as f32));
                colors.push(color);
            }
            indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
        }
    }

    let faces = indices.len() / 6;
    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_COLOR, colors);
    mesh.insert_indices(Indices::U32(indices));

    ChunkMesh {
        mesh,
        aabb: (!cells.is_empty()).then(|| Aabb::from_min_max(min, max)),
        faces,
    }
}

/// Where the part of a chunk sits: its center in model space.
pub fn chunk_center(chunk: &VoxelChunk) -> Vec3 {
    Vec3::from_array(chunk.origin) + Vec3::from_array(chunk.size.map(|s| s as f32)) * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::document::MAX_CHUNK_SIZE;

    fn chunk(size: [u32; 3], voxels: &[[u32; 4]]) -> VoxelChunk {
        VoxelChunk {
            name: None,
            origin: [0.0, 10.0, 0.0],
            size,
            voxels: voxels.to_vec(),
            unlit: false,
        }
    }

    #[test]
    fn lone_voxel_has_six_faces() {
        let built = chunk_mesh(&chunk([1, 1, 1], &[[0, 0, 0, 0]]), &[[255, 255, 255, 255]]);
        assert_eq!(built.faces, 6);
        assert_eq!(built.mesh.count_vertices(), 24);
        let aabb = built.aabb.unwrap();
        assert!(Vec3::from(aabb.min()).abs_diff_eq(Vec3::splat(-0.5), 1e-6));
        assert!(Vec3::from(aabb.max()).abs_diff_eq(Vec3::splat(0.5), 1e-6));
    }

    #[test]
    fn touching_voxels_hide_shared_faces() {
        let built = chunk_mesh(
            &chunk([2, 1, 1], &[[0, 0, 0, 0], [1, 0, 0, 0]]),
            &[[10, 20, 30, 255]],
        );
        assert_eq!(built.faces, 10);
    }

    #[test]
    fn bounds_are_relative_to_the_chunk_center() {
        let c = chunk([4, 2, 2], &[[0, 0, 0, 0]]);
        let built = chunk_mesh(&c, &[[0, 0, 0, 255]]);
        let aabb = built.aabb.unwrap();
        assert!(Vec3::from(aabb.min()).abs_diff_eq(Vec3::new(-2.0, -1.0, -1.0), 1e-6));
        assert_eq!(chunk_center(&c), Vec3::new(2.0, 11.0, 1.0));
    }

    #[test]
    fn far_edge_of_the_widest_chunk_meshes() {
        let edge = MAX_CHUNK_SIZE - 1;
        let c = chunk([MAX_CHUNK_SIZE, 1, 1], &[[edge, 0, 0, 0]]);
        let built = chunk_mesh(&c, &[[9, 9, 9, 255]]);
        assert_eq!(built.faces, 6);
    }

    #[test]
    fn empty_chunk_has_no_bounds() {
        let built = chunk_mesh(&chunk([3, 3, 3], &[]), &[]);
        assert_eq!(built.faces, 0);
        assert!(built.aabb.is_none());
    }
}
