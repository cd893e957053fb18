mod bounds;
mod camera;
mod config;
mod gizmo;
mod model;
mod normalize;
mod post;
mod scene;
mod selection;

use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use std::path::PathBuf;

use camera::OrbitCameraPlugin;
use config::{ConfigFallback, ViewerConfig, hex_color, warn_config_fallback};
use gizmo::GizmoPlugin;
use model::ModelLoaderPlugin;
use normalize::NormalizePlugin;
use post::OverlayPlugin;
use selection::SelectionPlugin;

const GRID_MAJOR: u32 = 0xaaaaaa;
const AXES_LENGTH: f32 = 30.0;

fn main() {
    let model_arg = std::env::args_os().nth(1).map(PathBuf::from);
    let (config, config_error) = ViewerConfig::load(model_arg);

    let mut app = App::new();
    if let Some(err) = config_error {
        app.insert_resource(ConfigFallback(err));
    }
    app.insert_resource(ClearColor(hex_color(config.background)))
        .insert_resource(config)
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Voxel part viewer".into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        // UI plugin (egui)
        .add_plugins(EguiPlugin::default())
        .add_plugins((
            GizmoPlugin,
            SelectionPlugin,
            NormalizePlugin,
            OrbitCameraPlugin,
            ModelLoaderPlugin,
            OverlayPlugin,
        ))
        .add_systems(
            Startup,
            (warn_config_fallback, scene::spawn_asset_root, spawn_light),
        )
        .add_systems(Update, draw_reference_grid)
        .run();
}

/// Soft white ambient, a key light from above and a dimmer rim light behind.
fn spawn_light(mut commands: Commands) {
    commands.insert_resource(AmbientLight {
        color: Color::WHITE,
        brightness: 400.0,
        ..default()
    });

    commands.spawn((
        DirectionalLight {
            illuminance: 9_000.0,
            shadows_enabled: true,
            shadow_depth_bias: 0.02,
            ..default()
        },
        Transform::from_xyz(80.0, 120.0, 40.0).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("KeyLight"),
    ));

    commands.spawn((
        DirectionalLight {
            illuminance: 3_500.0,
            ..default()
        },
        Transform::from_xyz(-60.0, 40.0, -80.0).looking_at(Vec3::ZERO, Vec3::Y),
        Name::new("RimLight"),
    ));
}

/// 200 x 200 ground grid with 20 cells and the world axes.
fn draw_reference_grid(mut gizmos: Gizmos) {
    gizmos.grid(
        Isometry3d::from_rotation(Quat::from_rotation_x(std::f32::consts::FRAC_PI_2)),
        UVec2::splat(20),
        Vec2::splat(10.0),
        hex_color(GRID_MAJOR).with_alpha(0.5),
    );
    gizmos.line(Vec3::ZERO, Vec3::X * AXES_LENGTH, Color::srgb(1.0, 0.2, 0.2));
    gizmos.line(Vec3::ZERO, Vec3::Y * AXES_LENGTH, Color::srgb(0.2, 1.0, 0.2));
    gizmos.line(Vec3::ZERO, Vec3::Z * AXES_LENGTH, Color::srgb(0.2, 0.4, 1.0));
}
