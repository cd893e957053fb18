use bevy::pbr::NotShadowCaster;
use bevy::prelude::*;
use bevy::render::render_resource::Face;

use crate::config::{ViewerConfig, hex_color};
use crate::scene::{Surface, subtree};

/// Tag on the outline child entity so we can update it en masse.
#[derive(Component)]
pub struct OutlineShell;

/// Outline settings (shared across all outlines).
#[derive(Resource)]
pub struct OutlineParams {
    pub enabled: bool,
    pub width: f32,   // uniform scale delta (0.0 => off, ~0.02–0.06 good)
    pub color: Color, // outline color
    pub material: Handle<StandardMaterial>,
}

impl OutlineParams {
    fn shell_scale(&self) -> Vec3 {
        if self.enabled {
            Vec3::splat(1.0 + self.width.max(0.0))
        } else {
            // effectively hides the shell without touching visibility
            Vec3::ZERO
        }
    }
}

/// Objects currently emphasized by an outline. Written only by the selection
/// state machine.
#[derive(Resource, Default, Debug)]
pub struct OutlineOverlay {
    objects: Vec<Entity>,
}

impl OutlineOverlay {
    pub fn set(&mut self, objects: impl IntoIterator<Item = Entity>) {
        self.objects = objects.into_iter().collect();
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn objects(&self) -> &[Entity] {
        &self.objects
    }
}

pub fn setup_outline_params(
    mut commands: Commands,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<ViewerConfig>,
) {
    let color = hex_color(config.outline.color);
    // Slightly larger backfaces-only, unlit
    let material = materials.add(StandardMaterial {
        base_color: color,
        unlit: true,
        cull_mode: Some(Face::Front),
        ..default()
    });
    commands.insert_resource(OutlineParams {
        enabled: config.outline.enabled,
        width: config.outline.width,
        color,
        material,
    });
}

/// Rebuild shells whenever the overlay list changes: one shell per surface
/// under each emphasized object.
pub fn sync_outline_shells(
    mut commands: Commands,
    overlay: Res<OutlineOverlay>,
    params: Res<OutlineParams>,
    shells: Query<Entity, With<OutlineShell>>,
    children: Query<&Children>,
    surfaces: Query<(&Mesh3d, Option<&Name>), With<Surface>>,
) {
    if !overlay.is_changed() {
        return;
    }
    for shell in &shells {
        commands.entity(shell).try_despawn();
    }
    for &object in overlay.objects() {
        for entity in subtree(object, &children) {
            let Ok((mesh, name)) = surfaces.get(entity) else {
                continue;
            };
            let name = name.map_or("surface", |n| n.as_str());
            commands.entity(entity).with_children(|c| {
                c.spawn((
                    Mesh3d(mesh.0.clone()),
                    MeshMaterial3d(params.material.clone()),
                    Transform::from_scale(params.shell_scale()),
                    NotShadowCaster,
                    OutlineShell,
                    Name::new(format!("{name}_Outline")),
                ));
            });
        }
    }
}

/// Push width / enabled / color edits to existing shells.
pub fn update_outlines(
    outline: Res<OutlineParams>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut q_shells: Query<&mut Transform, With<OutlineShell>>,
) {
    if !outline.is_changed() {
        return;
    }
    let scale = outline.shell_scale();
    for mut t in &mut q_shells {
        t.scale = scale;
    }
    if let Some(material) = materials.get_mut(&outline.material) {
        if material.base_color != outline.color {
            material.base_color = outline.color;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_replaces_its_list() {
        let mut overlay = OutlineOverlay::default();
        let a = Entity::from_raw(1);
        let b = Entity::from_raw(2);
        overlay.set([a]);
        overlay.set([b]);
        assert_eq!(overlay.objects(), &[b]);
        overlay.clear();
        assert!(overlay.objects().is_empty());
    }

    #[test]
    fn disabled_outline_collapses_shells() {
        let mut params = OutlineParams {
            enabled: true,
            width: 0.04,
            color: Color::WHITE,
            material: Handle::default(),
        };
        assert!(params.shell_scale().abs_diff_eq(Vec3::splat(1.04), 1e-6));
        params.enabled = false;
        assert_eq!(params.shell_scale(), Vec3::ZERO);
    }
}
