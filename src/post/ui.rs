use bevy::{
    diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin},
    prelude::*,
};
use bevy_egui::{EguiContexts, egui};

use crate::gizmo::{GizmoMode, TransformGizmo};
use crate::model::{LoadRequest, LoadStatus, LoadedModel};
use crate::post::outlines::OutlineParams;
use crate::selection::highlight::HighlightStyle;
use crate::selection::machine::Selection;

const HELP: &[(&str, &str)] = &[
    ("Left click", "select part"),
    ("Esc", "deselect"),
    ("W / E / R", "move / rotate / scale"),
    ("O", "open model"),
    ("F", "re-center model"),
    ("A / D", "orbit"),
    ("Z / C", "turn 90°"),
    ("1 - 4", "camera presets"),
    ("Wheel", "zoom"),
    ("H / ?", "toggle this help"),
];

#[derive(Resource)]
pub struct HelpVisible(pub bool);

impl Default for HelpVisible {
    fn default() -> Self {
        Self(true)
    }
}

#[derive(Resource)]
pub struct FpsUpdate {
    pub timer: Timer,
    pub cached_fps: f64,
}

impl Default for FpsUpdate {
    fn default() -> Self {
        Self {
            timer: Timer::from_seconds(1.0, TimerMode::Repeating),
            cached_fps: 0.0,
        }
    }
}

/// Whether egui owns the pointer this frame; scene input should back off.
pub fn pointer_over_ui(egui_ctxs: &mut EguiContexts) -> bool {
    egui_ctxs.ctx_mut().is_ok_and(|ctx| pointer_captured(ctx))
}

fn pointer_captured(ctx: &egui::Context) -> bool {
    ctx.wants_pointer_input() || ctx.is_pointer_over_area()
}

pub fn toggle_help(keys: Res<ButtonInput<KeyCode>>, mut help: ResMut<HelpVisible>) {
    let shift = keys.any_pressed([KeyCode::ShiftLeft, KeyCode::ShiftRight]);
    if keys.just_pressed(KeyCode::KeyH) || (shift && keys.just_pressed(KeyCode::Slash)) {
        help.0 = !help.0;
    }
}

pub fn update_fps(time: Res<Time>, diagnostics: Res<DiagnosticsStore>, mut upd: ResMut<FpsUpdate>) {
    upd.timer.tick(time.delta());

    // Only refresh the cached number once per second
    if upd.timer.finished() {
        if let Some(fps) = diagnostics
            .get(&FrameTimeDiagnosticsPlugin::FPS)
            .and_then(|d| d.smoothed())
        {
            upd.cached_fps = fps;
        }
    }
}

/// Top bar: model name, load status, selection, gizmo mode.
pub fn status_bar(
    mut ctxs: EguiContexts,
    loaded: Res<LoadedModel>,
    selection: Res<Selection>,
    names: Query<&Name>,
    mut gizmo: ResMut<TransformGizmo>,
    fps: Res<FpsUpdate>,
    mut requests: EventWriter<LoadRequest>,
) {
    let Ok(ctx) = ctxs.ctx_mut() else {
        return;
    };
    egui::TopBottomPanel::top("status").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button("Open…").clicked() {
                requests.write(LoadRequest::Dialog);
            }
            ui.label(loaded.name.as_deref().unwrap_or("no model"));
            match &loaded.status {
                LoadStatus::Idle => {}
                LoadStatus::Loading(what) => {
                    ui.spinner();
                    ui.label(format!("loading {what}"));
                }
                LoadStatus::Failed(message) => {
                    ui.colored_label(egui::Color32::from_rgb(255, 110, 110), message);
                }
            }

            ui.separator();
            let part = selection
                .part()
                .map(|p| names.get(p).map_or_else(|_| format!("{p}"), |n| n.to_string()));
            ui.label(match part {
                Some(name) => format!("selected: {name}"),
                None => "nothing selected".to_string(),
            });

            ui.separator();
            let mut mode = gizmo.mode;
            for m in [GizmoMode::Translate, GizmoMode::Rotate, GizmoMode::Scale] {
                ui.selectable_value(&mut mode, m, m.label());
            }
            if mode != gizmo.mode {
                gizmo.set_mode(mode);
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                ui.label(format!("{:.0} fps", fps.cached_fps));
            });
        });
    });
}

pub fn help_window(mut ctxs: EguiContexts, mut help: ResMut<HelpVisible>) {
    if !help.0 {
        return;
    }
    let Ok(ctx) = ctxs.ctx_mut() else {
        return;
    };
    let mut open = true;
    egui::Window::new("Help")
        .open(&mut open)
        .anchor(egui::Align2::LEFT_TOP, [10.0, 40.0])
        .resizable(false)
        .show(ctx, |ui| {
            egui::Grid::new("keys").striped(true).show(ui, |ui| {
                for (key, action) in HELP {
                    ui.strong(*key);
                    ui.label(*action);
                    ui.end_row();
                }
            });
        });
    if !open {
        help.0 = false;
    }
}

/// egui panel: tune how the selected part is emphasized and how the gizmo snaps
pub fn selection_style_panel(
    mut ctxs: EguiContexts,
    mut outline: ResMut<OutlineParams>,
    mut style: ResMut<HighlightStyle>,
    mut gizmo: ResMut<TransformGizmo>,
) {
    let Ok(ctx) = ctxs.ctx_mut() else {
        return;
    };

    // Local copies so sliders can edit smoothly
    let mut enabled = outline.enabled;
    let mut width = outline.width;
    let mut color = outline.color;
    let mut tint = [
        style.emissive_tint.red,
        style.emissive_tint.green,
        style.emissive_tint.blue,
    ];
    let mut brighten = style.brighten;
    let mut snap = gizmo.snap;
    let start_degrees = snap.rotate.to_degrees();
    let mut rotate_degrees = start_degrees;

    egui::Window::new("Selection style")
        .default_width(260.0)
        .default_open(false)
        .anchor(egui::Align2::RIGHT_TOP, [-10.0, 40.0])
        .show(ctx, |ui| {
            ui.heading("Outline");
            ui.checkbox(&mut enabled, "Enabled");
            ui.add(egui::Slider::new(&mut width, 0.0..=0.10).text("Width"));
            let mut rgb = color.to_srgba().to_f32_array_no_alpha();
            if ui.color_edit_button_rgb(&mut rgb).changed() {
                color = Color::srgb(rgb[0], rgb[1], rgb[2]);
            }

            ui.separator();

            ui.heading("Highlight");
            ui.horizontal(|ui| {
                ui.label("Emissive tint");
                ui.color_edit_button_rgb(&mut tint);
            });
            ui.add(egui::Slider::new(&mut brighten, 1.0..=2.0).text("Brighten (unlit)"));
            ui.label("Applies from the next selection.");

            ui.separator();

            ui.heading("Snapping");
            ui.add(egui::Slider::new(&mut snap.translate, 0.0..=5.0).text("Move"));
            ui.add(egui::Slider::new(&mut rotate_degrees, 0.0..=90.0).text("Rotate (°)"));
            ui.add(egui::Slider::new(&mut snap.scale, 0.0..=1.0).text("Scale"));
        });

    // Write back only what changed so change detection stays quiet
    if outline.enabled != enabled || outline.width != width || outline.color != color {
        outline.enabled = enabled;
        outline.width = width.clamp(0.0, 0.25);
        outline.color = color;
    }
    let tint = LinearRgba::rgb(tint[0], tint[1], tint[2]);
    if style.emissive_tint != tint || style.brighten != brighten {
        style.emissive_tint = tint;
        style.brighten = brighten;
    }
    if rotate_degrees != start_degrees {
        snap.rotate = rotate_degrees.to_radians();
    }
    if gizmo.snap != snap {
        gizmo.snap = snap;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One headless egui frame with a small window near the top-left corner.
    fn frame(ctx: &egui::Context, pointer: egui::Pos2) {
        let input = egui::RawInput {
            screen_rect: Some(egui::Rect::from_min_size(
                egui::Pos2::ZERO,
                egui::vec2(800.0, 600.0),
            )),
            events: vec![egui::Event::PointerMoved(pointer)],
            ..default()
        };
        let _ = ctx.run(input, |ctx| {
            egui::Window::new("Help")
                .fixed_pos([10.0, 10.0])
                .show(ctx, |ui| {
                    ui.label("keys");
                });
        });
    }

    #[test]
    fn pointer_over_a_window_is_captured() {
        let ctx = egui::Context::default();
        // areas are known from the previous frame
        frame(&ctx, egui::pos2(20.0, 20.0));
        frame(&ctx, egui::pos2(20.0, 20.0));
        assert!(pointer_captured(&ctx));
    }

    #[test]
    fn pointer_over_the_scene_is_not_captured() {
        let ctx = egui::Context::default();
        frame(&ctx, egui::pos2(700.0, 500.0));
        frame(&ctx, egui::pos2(700.0, 500.0));
        assert!(!pointer_captured(&ctx));
    }
}
