//! Re-posing a freshly loaded asset: centered on X/Z, standing on Y = 0 and
//! uniformly scaled so its largest extent is the configured target size.

use bevy::ecs::query::QueryFilter;
use bevy::math::Affine3A;
use bevy::prelude::*;
use bevy::render::mesh::MeshAabb;
use bevy::render::primitives::Aabb;

use crate::bounds::{aabb_world, size, union};
use crate::config::ViewerConfig;
use crate::scene::{AssetRoot, Surface, subtree};

/// One surface as seen from the asset root: its mesh bounds in its own space
/// plus the transform chain between it and the root (root excluded).
#[derive(Clone, Copy, Debug)]
pub struct SurfaceBounds {
    pub root_relative: Affine3A,
    pub local: Aabb,
}

/// Post-normalization measurements of the asset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizationResult {
    /// Center of the normalized bounds; the camera looks here.
    pub center: Vec3,
    pub min_y: f32,
    pub max_dimension: f32,
    pub scale_factor: f32,
}

impl NormalizationResult {
    fn empty() -> Self {
        Self {
            center: Vec3::ZERO,
            min_y: 0.0,
            max_dimension: 0.0,
            scale_factor: 1.0,
        }
    }
}

/// Published whenever the camera should look at a new point.
#[derive(Event, Clone, Copy, Debug)]
pub struct CameraFocus(pub Vec3);

/// Combined world bounds of the surfaces if the root were posed by `root`.
pub fn measure(root: &Transform, surfaces: &[SurfaceBounds]) -> Option<Aabb> {
    let root = root.compute_affine();
    surfaces
        .iter()
        .map(|s| aabb_world(&s.local, &(root * s.root_relative)))
        .reduce(|a, b| union(&a, &b))
}

/// Reset `root` and pose it canonically. Repeated calls on an unchanged
/// asset give the same transform and result.
pub fn normalize(
    root: &mut Transform,
    surfaces: &[SurfaceBounds],
    target_size: f32,
) -> NormalizationResult {
    // earlier loads must not compound
    *root = Transform::IDENTITY;
    let Some(raw) = measure(root, surfaces) else {
        return NormalizationResult::empty();
    };

    let center: Vec3 = raw.center.into();
    root.translation = -center;

    if let Some(centered) = measure(root, surfaces) {
        root.translation.y -= centered.min().y;
    }

    let extent = size(&raw).max_element();
    let max_dimension = if extent > 0.0 && extent.is_finite() { extent } else { 1.0 };
    let scale_factor = target_size / max_dimension;
    // scale about the world origin so grounding and centering survive
    root.scale = Vec3::splat(scale_factor);
    root.translation *= scale_factor;

    match measure(root, surfaces) {
        Some(posed) => NormalizationResult {
            center: posed.center.into(),
            min_y: posed.min().y,
            max_dimension: size(&posed).max_element(),
            scale_factor,
        },
        None => NormalizationResult::empty(),
    }
}

/// Transform chain from `entity` up to, but not including, `root`.
pub fn root_relative<F: QueryFilter>(
    entity: Entity,
    root: Entity,
    transforms: &Query<(&Transform, Option<&ChildOf>), F>,
) -> Option<Affine3A> {
    let mut affine = Affine3A::IDENTITY;
    let mut current = entity;
    loop {
        let (transform, parent) = transforms.get(current).ok()?;
        affine = transform.compute_affine() * affine;
        let parent = parent?.parent();
        if parent == root {
            return Some(affine);
        }
        current = parent;
    }
}

/// Bounds of every surface under `root`. The mesh bounds come from the
/// surface's `Aabb`, or from its mesh when that has not been computed yet.
pub fn collect_surface_bounds<F: QueryFilter>(
    root: Entity,
    children: &Query<&Children>,
    transforms: &Query<(&Transform, Option<&ChildOf>), F>,
    surfaces: &Query<(Option<&Aabb>, Option<&Mesh3d>), With<Surface>>,
    meshes: &Assets<Mesh>,
) -> Vec<SurfaceBounds> {
    subtree(root, children)
        .into_iter()
        .filter_map(|entity| {
            let (aabb, mesh) = surfaces.get(entity).ok()?;
            let local = match aabb {
                Some(aabb) => *aabb,
                None => meshes.get(&mesh?.0)?.compute_aabb()?,
            };
            Some(SurfaceBounds {
                root_relative: root_relative(entity, root, transforms)?,
                local,
            })
        })
        .collect()
}

pub struct NormalizePlugin;
impl Plugin for NormalizePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<CameraFocus>()
            .add_systems(Update, renormalize_hotkey);
    }
}

/// F: re-pose the asset around its current parts.
fn renormalize_hotkey(
    keys: Res<ButtonInput<KeyCode>>,
    config: Res<ViewerConfig>,
    meshes: Res<Assets<Mesh>>,
    mut roots: Query<(Entity, &mut Transform), With<AssetRoot>>,
    children: Query<&Children>,
    transforms: Query<(&Transform, Option<&ChildOf>), Without<AssetRoot>>,
    surfaces: Query<(Option<&Aabb>, Option<&Mesh3d>), With<Surface>>,
    mut focus: EventWriter<CameraFocus>,
) {
    if !keys.just_pressed(KeyCode::KeyF) {
        return;
    }
    let Ok((root, mut root_transform)) = roots.single_mut() else {
        return;
    };
    let bounds = collect_surface_bounds(root, &children, &transforms, &surfaces, &meshes);
    let result = normalize(&mut root_transform, &bounds, config.target_size);
    info!(
        "re-normalized: scale {:.3}, focus {:?}",
        result.scale_factor, result.center
    );
    focus.write(CameraFocus(result.center));
}
