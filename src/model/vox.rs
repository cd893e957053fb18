//! MagicaVoxel scenes mapped onto voxel documents. MagicaVoxel is Z-up and
//! the viewer is Y-up, so file (x, y, z) lands at viewer (x, z, -y).

use bevy::math::Vec3;
use dot_vox::{DotVoxData, Model, SceneNode};
use std::collections::HashSet;

use crate::model::document::{VoxelChunk, VoxelModel};

/// Deeper scene graphs are treated as cyclic and cut off.
const MAX_DEPTH: usize = 64;

/// One model instance in the scene graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub model: usize,
    /// Center of the model in file space.
    pub translation: Vec3,
    /// `_name` of the transform directly above the shape.
    pub name: Option<String>,
}

/// Every model instance reachable from the root node. Files without a scene
/// graph place each model once, at the origin.
pub fn placements(data: &DotVoxData) -> Vec<Placement> {
    let mut found = Vec::new();
    walk(&data.scenes, 0, Vec3::ZERO, None, 0, &mut found);
    if found.is_empty() {
        found = (0..data.models.len())
            .map(|model| Placement {
                model,
                translation: Vec3::ZERO,
                name: None,
            })
            .collect();
    }
    found
}

fn walk(
    scenes: &[SceneNode],
    node: u32,
    translation: Vec3,
    name: Option<&str>,
    depth: usize,
    found: &mut Vec<Placement>,
) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(scene) = scenes.get(node as usize) else {
        return;
    };
    match scene {
        SceneNode::Transform {
            attributes,
            frames,
            child,
            ..
        } => {
            let offset = frames
                .first()
                .and_then(|frame| frame.attributes.get("_t"))
                .and_then(|t| parse_translation(t))
                .unwrap_or(Vec3::ZERO);
            let name = attributes.get("_name").map(String::as_str);
            walk(scenes, *child, translation + offset, name, depth + 1, found);
        }
        SceneNode::Group { children, .. } => {
            for &child in children {
                walk(scenes, child, translation, None, depth + 1, found);
            }
        }
        SceneNode::Shape { models, .. } => {
            found.extend(models.iter().map(|shape| Placement {
                model: shape.model_id as usize,
                translation,
                name: name.map(str::to_string),
            }));
        }
    }
}

/// `_t` is "x y z" in whole voxels.
fn parse_translation(text: &str) -> Option<Vec3> {
    let mut parts = text.split_whitespace().map(|p| p.parse::<i32>().ok());
    let (x, y, z) = (parts.next()??, parts.next()??, parts.next()??);
    Some(Vec3::new(x as f32, y as f32, z as f32))
}

/// Palette indices whose material is emissive. MagicaVoxel numbers
/// materials like colors, starting at 1.
fn emissive_colors(data: &DotVoxData) -> HashSet<u32> {
    data.materials
        .iter()
        .filter(|m| m.properties.get("_type").is_some_and(|t| t == "_emit"))
        .filter_map(|m| m.id.checked_sub(1))
        .collect()
}

/// One chunk per placed model. A chunk whose every voxel is emissive is
/// rendered unlit.
pub fn to_model(data: &DotVoxData) -> VoxelModel {
    let emissive = emissive_colors(data);
    let chunks = placements(data)
        .into_iter()
        .filter_map(|placement| {
            let model = data.models.get(placement.model)?;
            Some(chunk(model, placement, &emissive))
        })
        .collect();
    VoxelModel {
        palette: data.palette.iter().map(|c| [c.r, c.g, c.b, c.a]).collect(),
        chunks,
    }
}

fn chunk(model: &Model, placement: Placement, emissive: &HashSet<u32>) -> VoxelChunk {
    let (sx, sy, sz) = (model.size.x, model.size.y, model.size.z);
    // MagicaVoxel centers a model on voxel floor(size / 2)
    let half = Vec3::new((sx / 2) as f32, (sy / 2) as f32, (sz / 2) as f32);
    let min = placement.translation - half;

    let voxels: Vec<[u32; 4]> = model
        .voxels
        .iter()
        .map(|v| {
            // out-of-range rows stay out of range so validation rejects them
            let row = sy.checked_sub(v.y as u32 + 1).unwrap_or(sy);
            [v.x as u32, v.z as u32, row, v.i as u32]
        })
        .collect();
    let unlit = !voxels.is_empty() && voxels.iter().all(|v| emissive.contains(&v[3]));

    VoxelChunk {
        name: placement.name,
        origin: [min.x, min.z, -min.y - sy as f32],
        size: [sx, sz, sy],
        voxels,
        unlit,
    }
}
