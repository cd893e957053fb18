use bevy::prelude::*;

/// Container of every loaded part. Exactly one exists for the app's lifetime.
#[derive(Component)]
pub struct AssetRoot;

/// Direct child of [`AssetRoot`]: the unit of selection and manipulation.
#[derive(Component)]
pub struct Part;

/// Renderable leaf under a [`Part`] that carries a mesh and a material.
#[derive(Component)]
pub struct Surface;

pub fn spawn_asset_root(mut commands: Commands) {
    commands.spawn((
        AssetRoot,
        Transform::IDENTITY,
        Visibility::default(),
        Name::new("AssetRoot"),
    ));
}

/// True when `entity` sits strictly below `root` in the hierarchy.
pub fn is_under(
    entity: Entity,
    root: Entity,
    parent_of: impl Fn(Entity) -> Option<Entity>,
) -> bool {
    let mut current = entity;
    while let Some(parent) = parent_of(current) {
        if parent == root {
            return true;
        }
        current = parent;
    }
    false
}

/// Depth-first walk of `root` and everything below it.
pub fn subtree(root: Entity, children: &Query<&Children>) -> Vec<Entity> {
    let mut out = vec![root];
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        if let Ok(kids) = children.get(entity) {
            for child in kids.iter() {
                out.push(child);
                stack.push(child);
            }
        }
    }
    out
}
