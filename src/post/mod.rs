//! Everything drawn on top of the scene: selection outlines and the egui HUD.

pub mod outlines;
pub mod ui;

use bevy::prelude::*;
use bevy_egui::EguiPrimaryContextPass;

use outlines::{setup_outline_params, sync_outline_shells, update_outlines};
use ui::{
    FpsUpdate, HelpVisible, help_window, selection_style_panel, status_bar, toggle_help, update_fps,
};

pub struct OverlayPlugin;
impl Plugin for OverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<HelpVisible>()
            .init_resource::<FpsUpdate>()
            .add_systems(Startup, setup_outline_params)
            .add_systems(
                PostUpdate,
                (sync_outline_shells, update_outlines).chain(),
            )
            .add_systems(Update, (toggle_help, update_fps))
            .add_systems(
                EguiPrimaryContextPass,
                (status_bar, help_window, selection_style_panel),
            );
    }
}
