//! Part selection: picking, the selection state machine and the visual
//! feedback (highlight, outline, gizmo) it keeps consistent.

pub mod highlight;
pub mod input;
pub mod machine;
pub mod resolve;
pub mod snapshot;

use bevy::prelude::*;

use crate::config::ViewerConfig;
use crate::gizmo::{
    GizmoSnap, TransformGizmo, begin_gizmo_drag, drive_gizmo_drag, update_gizmo_hover,
};
use crate::post::outlines::OutlineOverlay;
use highlight::HighlightStyle;
use input::pick_on_click;
use machine::{Selection, SelectionDriver};
use snapshot::{MaterialSnapshots, forget_removed_materials};

pub struct SelectionPlugin;
impl Plugin for SelectionPlugin {
    fn build(&self, app: &mut App) {
        let config = app
            .world()
            .get_resource::<ViewerConfig>()
            .cloned()
            .unwrap_or_default();
        app.insert_resource(HighlightStyle::from(&config.highlight))
            .insert_resource(TransformGizmo::with_snap(GizmoSnap::from(&config.snap)))
            .init_resource::<Selection>()
            .init_resource::<OutlineOverlay>()
            .init_resource::<MaterialSnapshots<StandardMaterial>>()
            .add_systems(
                Update,
                (
                    update_gizmo_hover,
                    pick_on_click,
                    begin_gizmo_drag,
                    drive_gizmo_drag,
                    deselect_on_escape,
                )
                    .chain(),
            )
            .add_systems(Last, forget_removed_materials);
    }
}

fn deselect_on_escape(keys: Res<ButtonInput<KeyCode>>, mut driver: SelectionDriver) {
    if keys.just_pressed(KeyCode::Escape) && !driver.gizmo().is_dragging() {
        driver.select(None);
    }
}
