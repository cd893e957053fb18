use bevy::{
    core_pipeline::tonemapping::Tonemapping,
    input::mouse::{MouseScrollUnit, MouseWheel},
    prelude::*,
};
use bevy_egui::EguiContexts;

use crate::config::ViewerConfig;
use crate::gizmo::TransformGizmo;
use crate::normalize::CameraFocus;
use crate::post::ui::pointer_over_ui;

// Rotation speed (radians per second). ~0.8 rad/s ≈ 45.8°/s.
const ANGULAR_SPEED: f32 = 0.8;
// Fraction of the distance covered per wheel line.
const ZOOM_STEP: f32 = 0.1;
const MIN_DISTANCE: f32 = 2.0;
const MAX_DISTANCE: f32 = 2000.0;
// Camera distance after a load, in multiples of the target size.
const FRAMING: f32 = 1.6;

/// Tag the camera we want to orbit around the target.
#[derive(Component)]
pub struct OrbitCamera {
    // Point the camera looks at
    pub target: Vec3,
    // Keep track of which preset we snapped to, 0 => 1:30, 1 => 4:30, 2 => 7:30, 3 => 10:30
    index_4: i32,
    // Base yaw offset; use PI/4 for isometric diagonals
    yaw_offset_rad: f32,
    // Continuous offset modified by A/D
    yaw_extra_rad: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            index_4: 0,
            yaw_offset_rad: std::f32::consts::FRAC_PI_4, // 45°
            yaw_extra_rad: 0.0,
        }
    }
}

impl OrbitCamera {
    /// Diagonal base + 90° steps + continuous extra.
    fn yaw(&self) -> f32 {
        self.yaw_offset_rad
            + (self.index_4.rem_euclid(4) as f32) * std::f32::consts::FRAC_PI_2
            + self.yaw_extra_rad
    }

    /// Place the camera on the ring at the current yaw, keeping the distance and
    /// the height of `offset` (camera position relative to the target).
    pub fn pose(&self, offset: Vec3) -> Transform {
        let dist = offset.length().max(0.0001);
        let y = offset.y;
        // radial distance in XZ required to preserve the same 3D distance
        let r_xz = (dist * dist - y * y).max(0.0).sqrt();
        let angle = self.yaw();
        let pos = Vec3::new(r_xz * angle.cos(), y, r_xz * angle.sin()) + self.target;
        Transform::from_translation(pos).looking_at(self.target, Vec3::Y)
    }
}

pub struct OrbitCameraPlugin;
impl Plugin for OrbitCameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_camera).add_systems(
            Update,
            (
                focus_camera,
                (
                    orbit_camera_hotkeys,
                    orbit_camera_rotate_continuous,
                    orbit_camera_zoom,
                )
                    .run_if(gizmo_idle),
            )
                .chain(),
        );
    }
}

fn gizmo_idle(gizmo: Res<TransformGizmo>) -> bool {
    !gizmo.is_dragging()
}

pub fn spawn_camera(mut commands: Commands, config: Res<ViewerConfig>) {
    let ocam = OrbitCamera::default();
    let height = config.target_size * 0.6;
    let start = ocam.pose(Vec3::new(config.target_size * FRAMING, height, 0.0));
    commands.spawn((
        Camera3d::default(),
        start,
        Tonemapping::AcesFitted, // nice highlight rolloff
        ocam,
        Name::new("MainCamera"),
    ));
}

/// World ray under the cursor, the cursor position, and the camera transform.
pub fn cursor_ray<'a>(
    window: &Window,
    cameras: &'a Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
) -> Option<(Ray3d, Vec2, &'a GlobalTransform)> {
    let cursor = window.cursor_position()?;
    let (camera, camera_transform) = cameras.single().ok()?;
    let ray = camera.viewport_to_world(camera_transform, cursor).ok()?;
    Some((ray, cursor, camera_transform))
}

/// Retarget on a new focus point and frame the normalized model.
pub fn focus_camera(
    mut events: EventReader<CameraFocus>,
    config: Res<ViewerConfig>,
    mut q_cam: Query<(&mut Transform, &mut OrbitCamera), With<Camera3d>>,
) {
    let Some(CameraFocus(focus)) = events.read().last().copied() else {
        return;
    };
    for (mut tf, mut ocam) in &mut q_cam {
        ocam.target = focus;
        let dist = config.target_size * FRAMING;
        let offset = Vec3::new(dist * 0.85, dist * 0.5, 0.0);
        *tf = ocam.pose(offset);
    }
}

/// Hotkeys to snap the camera:
/// 1 / 2 / 3 / 4  => 1:30 / 4:30 / 7:30 / 10:30
/// Z / C          => rotate left / right by 90 degrees
pub fn orbit_camera_hotkeys(
    keys: Res<ButtonInput<KeyCode>>,
    mut q_cam: Query<(&mut Transform, &mut OrbitCamera), With<Camera3d>>,
) {
    let preset = [
        KeyCode::Digit1,
        KeyCode::Digit2,
        KeyCode::Digit3,
        KeyCode::Digit4,
    ]
    .iter()
    .position(|k| keys.just_pressed(*k));
    let step = keys.just_pressed(KeyCode::KeyC) as i32 - keys.just_pressed(KeyCode::KeyZ) as i32;
    if preset.is_none() && step == 0 {
        return;
    }

    for (mut tf, mut ocam) in &mut q_cam {
        let offset = tf.translation - ocam.target;
        if let Some(index) = preset {
            ocam.index_4 = index as i32;
        }
        ocam.index_4 += step;
        ocam.yaw_extra_rad = 0.0;
        *tf = ocam.pose(offset);
    }
}

pub fn orbit_camera_rotate_continuous(
    keys: Res<ButtonInput<KeyCode>>,
    time: Res<Time>,
    mut q_cam: Query<(&mut Transform, &mut OrbitCamera), With<Camera3d>>,
) {
    let left = keys.pressed(KeyCode::KeyA);
    let right = keys.pressed(KeyCode::KeyD);
    if !(left || right) {
        return;
    }

    let dt = time.delta_secs();
    let dir = (right as i32 - left as i32) as f32; // right = +1, left = -1

    for (mut tf, mut ocam) in &mut q_cam {
        // wrap around TAU just to keep it bounded
        ocam.yaw_extra_rad =
            (ocam.yaw_extra_rad + dir * ANGULAR_SPEED * dt) % std::f32::consts::TAU;
        let offset = tf.translation - ocam.target;
        *tf = ocam.pose(offset);
    }
}

/// Wheel zoom toward the target. Scrolling over egui is left to egui.
pub fn orbit_camera_zoom(
    mut wheel: EventReader<MouseWheel>,
    mut egui_ctxs: EguiContexts,
    mut q_cam: Query<(&mut Transform, &OrbitCamera), With<Camera3d>>,
) {
    let lines: f32 = wheel
        .read()
        .map(|e| match e.unit {
            MouseScrollUnit::Line => e.y,
            MouseScrollUnit::Pixel => e.y / 40.0,
        })
        .sum();
    if lines == 0.0 {
        return;
    }
    if pointer_over_ui(&mut egui_ctxs) {
        return;
    }
    for (mut tf, ocam) in &mut q_cam {
        let offset = tf.translation - ocam.target;
        *tf = ocam.pose(zoomed(offset, lines));
    }
}

/// Offset after zooming by `lines` wheel lines (positive = closer).
fn zoomed(offset: Vec3, lines: f32) -> Vec3 {
    let dist = offset.length().max(0.0001);
    let next = (dist * (1.0 - ZOOM_STEP).powf(lines)).clamp(MIN_DISTANCE, MAX_DISTANCE);
    offset * (next / dist)
}
