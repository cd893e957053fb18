//! Move / rotate / scale handle bound to the selected part.
//!
//! Hotkeys:
//! - W = translate
//! - E = rotate
//! - R = scale
//!
//! Handles are world-axis aligned and sized relative to the camera distance so
//! they stay grabbable at any zoom. Hovering a handle makes it the active axis;
//! pressing the left button on it starts a drag.

use bevy::math::Affine3A;
use bevy::prelude::*;
use bevy_egui::EguiContexts;

use crate::camera::{OrbitCamera, cursor_ray};
use crate::config::SnapConfig;
use crate::post::ui::pointer_over_ui;

/// Handle length as a fraction of the camera-to-target distance.
const HANDLE_SCALE: f32 = 0.15;
/// Hover tolerance as a fraction of the handle length.
const HOVER_TOLERANCE: f32 = 0.08;
/// Radians of rotation per pixel of horizontal cursor travel.
const ROTATE_PER_PIXEL: f32 = 0.01;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GizmoMode {
    #[default]
    Translate,
    Rotate,
    Scale,
}

impl GizmoMode {
    pub fn label(self) -> &'static str {
        match self {
            GizmoMode::Translate => "Move",
            GizmoMode::Rotate => "Rotate",
            GizmoMode::Scale => "Scale",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GizmoAxis {
    X,
    Y,
    Z,
}

impl GizmoAxis {
    pub const ALL: [GizmoAxis; 3] = [GizmoAxis::X, GizmoAxis::Y, GizmoAxis::Z];

    pub fn dir(self) -> Vec3 {
        match self {
            GizmoAxis::X => Vec3::X,
            GizmoAxis::Y => Vec3::Y,
            GizmoAxis::Z => Vec3::Z,
        }
    }

    fn index(self) -> usize {
        match self {
            GizmoAxis::X => 0,
            GizmoAxis::Y => 1,
            GizmoAxis::Z => 2,
        }
    }

    fn color(self) -> Color {
        match self {
            GizmoAxis::X => Color::srgb(1.0, 0.2, 0.2),
            GizmoAxis::Y => Color::srgb(0.2, 1.0, 0.2),
            GizmoAxis::Z => Color::srgb(0.2, 0.4, 1.0),
        }
    }
}

/// Discrete increments per mode. Rotation is in radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GizmoSnap {
    pub translate: f32,
    pub rotate: f32,
    pub scale: f32,
}

impl Default for GizmoSnap {
    fn default() -> Self {
        Self::from(&SnapConfig::default())
    }
}

impl From<&SnapConfig> for GizmoSnap {
    fn from(config: &SnapConfig) -> Self {
        Self {
            translate: config.translate,
            rotate: config.rotate_degrees.to_radians(),
            scale: config.scale,
        }
    }
}

/// Round to the nearest multiple of `step`; a non-positive step disables snapping.
pub fn snap_to(value: f32, step: f32) -> f32 {
    if step > 0.0 {
        (value / step).round() * step
    } else {
        value
    }
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    axis: GizmoAxis,
    mode: GizmoMode,
    start: Transform,
    /// Axis parameter (translate/scale) or cursor x (rotate) at grab time.
    grab: f32,
    handle_length: f32,
    /// World -> parent space of the dragged entity.
    parent_inverse: Affine3A,
}

impl Drag {
    fn apply(&self, now: f32, snap: &GizmoSnap) -> Transform {
        let mut out = self.start;
        match self.mode {
            GizmoMode::Translate => {
                let delta = snap_to(now - self.grab, snap.translate);
                let local = self
                    .parent_inverse
                    .transform_vector3(self.axis.dir() * delta);
                out.translation = self.start.translation + local;
            }
            GizmoMode::Scale => {
                let factor = 1.0 + (now - self.grab) / self.handle_length.max(f32::EPSILON);
                let i = self.axis.index();
                let scaled = snap_to(self.start.scale[i] * factor, snap.scale);
                out.scale[i] = scaled.max(snap.scale.max(0.001));
            }
            GizmoMode::Rotate => {
                let angle = snap_to((now - self.grab) * ROTATE_PER_PIXEL, snap.rotate);
                let axis = self
                    .parent_inverse
                    .transform_vector3(self.axis.dir())
                    .normalize_or(self.axis.dir());
                out.rotation = Quat::from_axis_angle(axis, angle) * self.start.rotation;
            }
        }
        out
    }
}

/// Gizmo state. Attachment is owned by the selection state machine; hover and
/// drag are driven by pointer input.
#[derive(Resource, Default)]
pub struct TransformGizmo {
    target: Option<Entity>,
    pub mode: GizmoMode,
    pub snap: GizmoSnap,
    hovered: Option<GizmoAxis>,
    drag: Option<Drag>,
}

impl TransformGizmo {
    pub fn with_snap(snap: GizmoSnap) -> Self {
        Self {
            snap,
            ..default()
        }
    }

    pub fn attach(&mut self, target: Entity) {
        if self.target != Some(target) {
            self.drag = None;
            self.hovered = None;
        }
        self.target = Some(target);
    }

    pub fn detach(&mut self) {
        self.target = None;
        self.hovered = None;
        self.drag = None;
    }

    pub fn target(&self) -> Option<Entity> {
        self.target
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Axis under the pointer, or the one being dragged.
    pub fn active_axis(&self) -> Option<GizmoAxis> {
        self.drag.map(|d| d.axis).or(self.hovered)
    }

    pub fn set_mode(&mut self, mode: GizmoMode) {
        if self.mode != mode {
            self.mode = mode;
            self.hovered = None;
        }
    }

    #[cfg(test)]
    pub(crate) fn hold(&mut self, axis: GizmoAxis) {
        self.drag = Some(Drag {
            axis,
            mode: self.mode,
            start: Transform::IDENTITY,
            grab: 0.0,
            handle_length: 1.0,
            parent_inverse: Affine3A::IDENTITY,
        });
    }

    #[cfg(test)]
    pub(crate) fn hover(&mut self, axis: GizmoAxis) {
        self.hovered = Some(axis);
    }
}

/// Closest approach between a ray and an infinite axis line through `anchor`.
/// Returns (parameter along the axis, distance between the lines).
pub fn closest_on_axis(origin: Vec3, dir: Vec3, anchor: Vec3, axis: Vec3) -> Option<(f32, f32)> {
    let w0 = origin - anchor;
    let b = dir.dot(axis);
    let d = dir.dot(w0);
    let e = axis.dot(w0);
    let denom = 1.0 - b * b;
    if denom < 1e-6 {
        // looking straight down the axis
        return None;
    }
    let s_axis = (e - b * d) / denom;
    let t_ray = (b * e - d) / denom;
    if t_ray < 0.0 {
        return None;
    }
    let gap = (origin + dir * t_ray) - (anchor + axis * s_axis);
    Some((s_axis, gap.length()))
}

/// Distance from where the ray crosses the ring's plane to the ring itself.
pub fn ring_distance(
    origin: Vec3,
    dir: Vec3,
    anchor: Vec3,
    axis: Vec3,
    radius: f32,
) -> Option<f32> {
    let denom = dir.dot(axis);
    if denom.abs() < 1e-6 {
        return None;
    }
    let t = (anchor - origin).dot(axis) / denom;
    if t < 0.0 {
        return None;
    }
    let hit = origin + dir * t;
    Some(((hit - anchor).length() - radius).abs())
}

/// Which handle (if any) a ray is hovering.
pub fn hovered_axis(
    mode: GizmoMode,
    ray: Ray3d,
    anchor: Vec3,
    handle_length: f32,
) -> Option<GizmoAxis> {
    let tolerance = handle_length * HOVER_TOLERANCE;
    let dir = *ray.direction;
    GizmoAxis::ALL
        .into_iter()
        .filter_map(|axis| {
            let distance = match mode {
                GizmoMode::Rotate => {
                    ring_distance(ray.origin, dir, anchor, axis.dir(), handle_length)?
                }
                GizmoMode::Translate | GizmoMode::Scale => {
                    let (s, gap) = closest_on_axis(ray.origin, dir, anchor, axis.dir())?;
                    if !(0.0..=handle_length).contains(&s) {
                        return None;
                    }
                    gap
                }
            };
            (distance <= tolerance).then_some((axis, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(axis, _)| axis)
}

fn handle_length(anchor: Vec3, camera: &GlobalTransform) -> f32 {
    (camera.translation() - anchor).length().max(0.01) * HANDLE_SCALE
}

/// Value tracked while dragging: axis parameter, or cursor x for rotation.
fn drag_coordinate(
    drag_mode: GizmoMode,
    ray: Ray3d,
    cursor: Vec2,
    anchor: Vec3,
    axis: GizmoAxis,
) -> Option<f32> {
    match drag_mode {
        GizmoMode::Rotate => Some(cursor.x),
        GizmoMode::Translate | GizmoMode::Scale => {
            closest_on_axis(ray.origin, *ray.direction, anchor, axis.dir()).map(|(s, _)| s)
        }
    }
}

pub struct GizmoPlugin;
impl Plugin for GizmoPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<TransformGizmo>()
            .add_systems(Update, (gizmo_mode_hotkeys, draw_transform_gizmo));
    }
}

pub fn gizmo_mode_hotkeys(keys: Res<ButtonInput<KeyCode>>, mut gizmo: ResMut<TransformGizmo>) {
    if keys.just_pressed(KeyCode::KeyW) {
        gizmo.set_mode(GizmoMode::Translate);
    }
    if keys.just_pressed(KeyCode::KeyE) {
        gizmo.set_mode(GizmoMode::Rotate);
    }
    if keys.just_pressed(KeyCode::KeyR) {
        gizmo.set_mode(GizmoMode::Scale);
    }
}

/// Track which handle the pointer is over. Runs before picking so a press on
/// a handle is never treated as a pick. Handles under an egui window are not
/// hovered.
pub fn update_gizmo_hover(
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    globals: Query<&GlobalTransform>,
    mut egui_ctxs: EguiContexts,
    mut gizmo: ResMut<TransformGizmo>,
) {
    if gizmo.is_dragging() {
        return;
    }
    let hovered = if pointer_over_ui(&mut egui_ctxs) {
        None
    } else {
        hover_under_cursor(&gizmo, &windows, &cameras, &globals)
    };
    // only write on change so the resource is not flagged every frame
    if gizmo.hovered != hovered {
        gizmo.hovered = hovered;
    }
}

fn hover_under_cursor(
    gizmo: &TransformGizmo,
    windows: &Query<&Window>,
    cameras: &Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    globals: &Query<&GlobalTransform>,
) -> Option<GizmoAxis> {
    let anchor = globals.get(gizmo.target?).ok()?.translation();
    let window = windows.single().ok()?;
    let (ray, _, camera) = cursor_ray(window, cameras)?;
    hovered_axis(gizmo.mode, ray, anchor, handle_length(anchor, camera))
}

/// Start a drag when the left button goes down on a hovered handle.
pub fn begin_gizmo_drag(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    transforms: Query<(&Transform, &GlobalTransform, Option<&ChildOf>)>,
    globals: Query<&GlobalTransform>,
    mut egui_ctxs: EguiContexts,
    mut gizmo: ResMut<TransformGizmo>,
) {
    if !mouse.just_pressed(MouseButton::Left) || gizmo.is_dragging() {
        return;
    }
    if pointer_over_ui(&mut egui_ctxs) {
        return;
    }
    let (Some(target), Some(axis)) = (gizmo.target, gizmo.hovered) else {
        return;
    };
    let Ok((start, global, parent)) = transforms.get(target) else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };
    let Some((ray, cursor, camera)) = cursor_ray(window, &cameras) else {
        return;
    };
    let anchor = global.translation();
    let Some(grab) = drag_coordinate(gizmo.mode, ray, cursor, anchor, axis) else {
        return;
    };
    let parent_inverse = parent
        .and_then(|p| globals.get(p.parent()).ok())
        .map(|g| g.affine().inverse())
        .unwrap_or(Affine3A::IDENTITY);

    gizmo.drag = Some(Drag {
        axis,
        mode: gizmo.mode,
        start: *start,
        grab,
        handle_length: handle_length(anchor, camera),
        parent_inverse,
    });
}

/// Apply the active drag to the attached entity; release ends it.
pub fn drive_gizmo_drag(
    mouse: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    cameras: Query<(&Camera, &GlobalTransform), With<OrbitCamera>>,
    mut transforms: Query<&mut Transform>,
    mut gizmo: ResMut<TransformGizmo>,
) {
    let (Some(drag), Some(target)) = (gizmo.drag, gizmo.target) else {
        return;
    };
    if !mouse.pressed(MouseButton::Left) {
        gizmo.drag = None;
        return;
    }
    let Ok(window) = windows.single() else {
        return;
    };
    let Some((ray, cursor, _)) = cursor_ray(window, &cameras) else {
        return;
    };
    // the handle stays where the drag started, so measure against the start anchor
    let anchor = drag
        .parent_inverse
        .inverse()
        .transform_point3(drag.start.translation);
    let Some(now) = drag_coordinate(drag.mode, ray, cursor, anchor, drag.axis) else {
        return;
    };
    if let Ok(mut transform) = transforms.get_mut(target) {
        let next = drag.apply(now, &gizmo.snap);
        if *transform != next {
            *transform = next;
        }
    }
}

pub fn draw_transform_gizmo(
    mut gizmos: Gizmos,
    gizmo: Res<TransformGizmo>,
    globals: Query<&GlobalTransform>,
    cameras: Query<&GlobalTransform, With<OrbitCamera>>,
) {
    let Some(target) = gizmo.target() else {
        return;
    };
    let (Ok(global), Ok(camera)) = (globals.get(target), cameras.single()) else {
        return;
    };
    let anchor = global.translation();
    let length = handle_length(anchor, camera);
    let active = gizmo.active_axis();

    for axis in GizmoAxis::ALL {
        let color = if active == Some(axis) {
            Color::srgb(1.0, 0.85, 0.2)
        } else {
            axis.color()
        };
        let end = anchor + axis.dir() * length;
        match gizmo.mode {
            GizmoMode::Translate => {
                gizmos.arrow(anchor, end, color);
            }
            GizmoMode::Scale => {
                gizmos.line(anchor, end, color);
                gizmos.cuboid(
                    Transform::from_translation(end).with_scale(Vec3::splat(length * 0.08)),
                    color,
                );
            }
            GizmoMode::Rotate => {
                let facing = Quat::from_rotation_arc(Vec3::Z, axis.dir());
                gizmos.circle(Isometry3d::new(anchor, facing), length, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ray(origin: Vec3, dir: Vec3) -> Ray3d {
        Ray3d::new(origin, Dir3::new(dir).unwrap())
    }

    fn drag(mode: GizmoMode, axis: GizmoAxis) -> Drag {
        Drag {
            axis,
            mode,
            start: Transform::from_xyz(1.0, 2.0, 3.0),
            grab: 0.0,
            handle_length: 2.0,
            parent_inverse: Affine3A::IDENTITY,
        }
    }

    #[test]
    fn snapping_rounds_to_step() {
        assert!((snap_to(0.26, 0.1) - 0.3).abs() < 1e-6);
        assert!((snap_to(-0.04, 0.1)).abs() < 1e-6);
        assert_eq!(snap_to(0.123, 0.0), 0.123);
    }

    #[test]
    fn ray_over_x_handle_hovers_x() {
        // looking down -Z at a point on the X handle
        let r = ray(Vec3::new(0.5, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(
            hovered_axis(GizmoMode::Translate, r, Vec3::ZERO, 1.0),
            Some(GizmoAxis::X)
        );
    }

    #[test]
    fn ray_past_handle_end_hovers_nothing() {
        let r = ray(Vec3::new(3.0, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(hovered_axis(GizmoMode::Translate, r, Vec3::ZERO, 1.0), None);
        let r = ray(Vec3::new(0.5, 0.5, 10.0), Vec3::NEG_Z);
        assert_eq!(hovered_axis(GizmoMode::Translate, r, Vec3::ZERO, 1.0), None);
    }

    #[test]
    fn rotate_mode_hovers_rings() {
        // the Z ring lies in the XY plane
        let r = ray(Vec3::new(0.0, 1.0, 10.0), Vec3::NEG_Z);
        assert_eq!(
            hovered_axis(GizmoMode::Rotate, r, Vec3::ZERO, 1.0),
            Some(GizmoAxis::Z)
        );
    }

    #[test]
    fn active_axis_prefers_the_drag() {
        let mut gizmo = TransformGizmo::default();
        gizmo.attach(Entity::from_raw(7));
        gizmo.hovered = Some(GizmoAxis::Y);
        assert_eq!(gizmo.active_axis(), Some(GizmoAxis::Y));
        gizmo.drag = Some(drag(GizmoMode::Translate, GizmoAxis::X));
        assert!(gizmo.is_dragging());
        assert_eq!(gizmo.active_axis(), Some(GizmoAxis::X));
    }

    #[test]
    fn detach_and_retarget_drop_drag_state() {
        let mut gizmo = TransformGizmo::default();
        gizmo.attach(Entity::from_raw(1));
        gizmo.drag = Some(drag(GizmoMode::Translate, GizmoAxis::X));
        gizmo.attach(Entity::from_raw(2));
        assert!(!gizmo.is_dragging());
        assert_eq!(gizmo.target(), Some(Entity::from_raw(2)));

        gizmo.hovered = Some(GizmoAxis::Z);
        gizmo.detach();
        assert_eq!(gizmo.target(), None);
        assert_eq!(gizmo.active_axis(), None);
    }

    #[test]
    fn translate_drag_moves_along_axis_in_snapped_steps() {
        let out =
            drag(GizmoMode::Translate, GizmoAxis::Y).apply(0.74, &GizmoSnap::default());
        assert!(out.translation.abs_diff_eq(Vec3::new(1.0, 2.7, 3.0), 1e-5));
    }

    #[test]
    fn translate_drag_respects_parent_scale() {
        let mut d = drag(GizmoMode::Translate, GizmoAxis::X);
        d.parent_inverse = Affine3A::from_scale(Vec3::splat(2.0)).inverse();
        let out = d.apply(1.0, &GizmoSnap::default());
        assert!(out.translation.abs_diff_eq(Vec3::new(1.5, 2.0, 3.0), 1e-5));
    }

    #[test]
    fn scale_drag_grows_one_component() {
        // dragging one full handle length doubles the scale
        let out = drag(GizmoMode::Scale, GizmoAxis::Z).apply(2.0, &GizmoSnap::default());
        assert!(out.scale.abs_diff_eq(Vec3::new(1.0, 1.0, 2.0), 1e-5));
    }

    #[test]
    fn rotate_drag_snaps_to_five_degrees() {
        // 0.12 rad ~ 6.9 degrees snaps to 5
        let out = drag(GizmoMode::Rotate, GizmoAxis::Y).apply(12.0, &GizmoSnap::default());
        let (axis, angle) = out.rotation.to_axis_angle();
        assert!((angle - 5f32.to_radians()).abs() < 1e-4);
        assert!(axis.abs_diff_eq(Vec3::Y, 1e-4));
    }
}
