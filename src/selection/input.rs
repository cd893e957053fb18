use bevy::input::mouse::MouseButtonInput;
use bevy::prelude::*;
use bevy::render::primitives::Aabb;
use bevy_egui::EguiContexts;

use crate::bounds::{aabb_world, ray_aabb_intersection};
use crate::camera::{OrbitCamera, cursor_ray};
use crate::gizmo::TransformGizmo;
use crate::post::ui::pointer_over_ui;
use crate::scene::{Surface, is_under};
use crate::selection::machine::SelectionDriver;
use crate::selection::resolve::resolve_part;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerAction {
    Ignore,
    Pick,
}

/// Decide what a pointer press means. The gizmo always wins over picking.
pub fn arbitrate(gizmo: &TransformGizmo, button: MouseButton) -> PointerAction {
    if gizmo.is_dragging() || gizmo.active_axis().is_some() || button != MouseButton::Left {
        PointerAction::Ignore
    } else {
        PointerAction::Pick
    }
}

/// Nearest surface under `root` hit by the ray, resolved to its part.
pub fn pick_part<'a>(
    ray: Ray3d,
    root: Entity,
    surfaces: impl IntoIterator<Item = (Entity, &'a GlobalTransform, &'a Aabb)>,
    parent_of: impl Fn(Entity) -> Option<Entity>,
) -> Option<Entity> {
    let mut best_hit: Option<(Entity, f32)> = None;
    for (entity, global, aabb) in surfaces {
        if !is_under(entity, root, &parent_of) {
            continue;
        }
        let world = aabb_world(aabb, &global.affine());
        let hit = ray_aabb_intersection(
            ray.origin,
            *ray.direction,
            world.min().into(),
            world.max().into(),
        );
        if let Some(t) = hit {
            // Keep the nearest hit
            if best_hit.is_none_or(|(_, best_t)| t < best_t) {
                best_hit = Some((entity, t));
            }
        }
    }
    best_hit.map(|(hit, _)| resolve_part(hit, root, &parent_of))
}

/// One pointer press: arbitrate it, then select whatever `ray` hits under
/// the root. Without a ray (cursor outside the viewport) nothing changes.
pub fn press<'a>(
    driver: &mut SelectionDriver,
    button: MouseButton,
    ray: Option<Ray3d>,
    surfaces: impl IntoIterator<Item = (Entity, &'a GlobalTransform, &'a Aabb)>,
) -> PointerAction {
    let action = arbitrate(driver.gizmo(), button);
    if action == PointerAction::Ignore {
        return action;
    }
    let (Some(ray), Some(root)) = (ray, driver.root()) else {
        return action;
    };
    let target = pick_part(ray, root, surfaces, |e| driver.parent_of(e));
    driver.select(target);
    action
}

/// On left press in the viewport, pick the part under the cursor (or nothing).
pub fn pick_on_click(
    mut ev_mousebtn: EventReader<MouseButtonInput>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    surfaces: Query<(Entity, &GlobalTransform, &Aabb), With<Surface>>,
    mut egui_ctxs: EguiContexts,
    mut driver: SelectionDriver,
) {
    let presses: Vec<MouseButton> = ev_mousebtn
        .read()
        .filter(|e| e.state.is_pressed())
        .map(|e| e.button)
        .collect();
    if presses.is_empty() {
        return;
    }

    // clicks on egui windows never reach the scene
    if pointer_over_ui(&mut egui_ctxs) {
        return;
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let ray = cursor_ray(window, &cameras).map(|(ray, _, _)| ray);
    for button in presses {
        press(&mut driver, button, ray, surfaces.iter());
    }
}
