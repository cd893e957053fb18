use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use std::collections::HashSet;

use crate::config::HighlightConfig;
use crate::scene::{Surface, subtree};
use crate::selection::snapshot::{Appearance, MaterialSnapshot, MaterialSnapshots};

/// How a highlighted part is emphasized.
#[derive(Resource, Clone, Debug)]
pub struct HighlightStyle {
    pub emissive_tint: LinearRgba,
    pub emissive_strength: f32,
    /// Multiplier on the snapshotted base color when there is no emissive channel.
    pub brighten: f32,
}

impl Default for HighlightStyle {
    fn default() -> Self {
        Self::from(&HighlightConfig::default())
    }
}

impl From<&HighlightConfig> for HighlightStyle {
    fn from(config: &HighlightConfig) -> Self {
        let [r, g, b] = config.emissive_tint;
        Self {
            emissive_tint: LinearRgba::rgb(r, g, b),
            emissive_strength: 1.0,
            brighten: config.brighten,
        }
    }
}

pub fn brighten(color: Color, factor: f32) -> Color {
    let c = color.to_linear();
    LinearRgba::new(c.red * factor, c.green * factor, c.blue * factor, c.alpha).into()
}

/// Emphasized version of a material, always derived from its snapshot so
/// repeated application never compounds.
pub fn emphasize(
    material: &mut impl Appearance,
    original: &MaterialSnapshot,
    style: &HighlightStyle,
) {
    if material.emissive().is_some() {
        material.set_emissive(style.emissive_tint);
        if material.emissive_strength().is_some() {
            material.set_emissive_strength(style.emissive_strength);
        }
    } else if let (Some(base), Some(_)) = (original.base_color, material.base_color()) {
        material.set_base_color(brighten(base, style.brighten));
    }
}

/// Applies or removes the highlight on every surface under a part.
#[derive(SystemParam)]
pub struct Highlighter<'w, 's> {
    materials: ResMut<'w, Assets<StandardMaterial>>,
    snapshots: ResMut<'w, MaterialSnapshots<StandardMaterial>>,
    style: Res<'w, HighlightStyle>,
    children: Query<'w, 's, &'static Children>,
    surfaces: Query<'w, 's, &'static MeshMaterial3d<StandardMaterial>, With<Surface>>,
}

impl Highlighter<'_, '_> {
    /// Returns how many materials were written.
    pub fn set_highlight(&mut self, part: Entity, on: bool) -> usize {
        let mut seen = HashSet::new();
        let mut written = 0;
        for entity in subtree(part, &self.children) {
            let Ok(handle) = self.surfaces.get(entity) else {
                continue;
            };
            let id = handle.0.id();
            // materials can be shared between surfaces
            if !seen.insert(id) {
                continue;
            }
            let changed = if on {
                self.emphasize(id)
            } else {
                self.snapshots.restore(id, &mut self.materials)
            };
            written += changed as usize;
        }
        written
    }

    fn emphasize(&mut self, id: AssetId<StandardMaterial>) -> bool {
        let Some(live) = self.materials.get(id) else {
            return false;
        };
        // snapshot before mutate
        let original = self.snapshots.ensure(id, live);
        let mut target = live.clone();
        emphasize(&mut target, &original, &self.style);
        if channels_equal(live, &target) {
            return false;
        }
        match self.materials.get_mut(id) {
            Some(live) => {
                MaterialSnapshot::capture(&target).write_to(live);
                true
            }
            None => false,
        }
    }
}

fn channels_equal(a: &impl Appearance, b: &impl Appearance) -> bool {
    MaterialSnapshot::capture(a) == MaterialSnapshot::capture(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::fixture::{Fixture, lit, unlit};
    use bevy::ecs::system::RunSystemOnce;

    fn highlight(world: &mut World, part: Entity, on: bool) -> usize {
        world
            .run_system_once(move |mut highlighter: Highlighter| {
                highlighter.set_highlight(part, on)
            })
            .unwrap()
    }

    #[test]
    fn lit_material_gets_emissive_tint_and_keeps_base_color() {
        let mut fx = Fixture::new();
        let (part, material) = fx.part_with(lit(Color::srgb(0.5, 0.2, 0.1)));

        assert_eq!(highlight(&mut fx.world, part, true), 1);
        let live = fx.material(&material);
        assert_eq!(live.emissive, HighlightStyle::default().emissive_tint);
        assert_eq!(live.base_color, Color::srgb(0.5, 0.2, 0.1));
    }

    #[test]
    fn unlit_material_brightens_from_snapshot_without_compounding() {
        let mut fx = Fixture::new();
        let original = Color::srgb(0.4, 0.4, 0.4);
        let (part, material) = fx.part_with(unlit(original));

        highlight(&mut fx.world, part, true);
        let once = fx.material(&material).base_color;
        assert_eq!(highlight(&mut fx.world, part, true), 0);
        let twice = fx.material(&material).base_color;

        assert_eq!(once, twice);
        assert_eq!(once, brighten(original, 1.12));
        let expected = original.to_linear().red * 1.12;
        assert!((once.to_linear().red - expected).abs() < 1e-6);
    }

    #[test]
    fn highlight_then_unhighlight_restores_exactly() {
        let mut fx = Fixture::new();
        let lit_original = StandardMaterial {
            emissive: LinearRgba::rgb(0.01, 0.02, 0.03),
            ..lit(Color::srgb(0.9, 0.1, 0.3))
        };
        let (part, a) = fx.part_with(lit_original.clone());
        let b = fx.surface_with(part, unlit(Color::srgb(0.2, 0.6, 0.2)));

        highlight(&mut fx.world, part, true);
        assert_eq!(highlight(&mut fx.world, part, false), 2);

        let a_live = fx.material(&a);
        assert_eq!(a_live.emissive, lit_original.emissive);
        assert_eq!(a_live.base_color, lit_original.base_color);
        assert_eq!(fx.material(&b).base_color, Color::srgb(0.2, 0.6, 0.2));
    }

    #[test]
    fn unhighlighting_an_untouched_part_is_a_no_op() {
        let mut fx = Fixture::new();
        let (part, material) = fx.part_with(lit(Color::WHITE));

        assert_eq!(highlight(&mut fx.world, part, false), 0);
        assert_eq!(fx.material(&material).emissive, LinearRgba::BLACK);
        assert_eq!(fx.world.resource::<MaterialSnapshots<StandardMaterial>>().len(), 0);
    }

    #[test]
    fn shared_material_is_touched_once() {
        let mut fx = Fixture::new();
        let (part, material) = fx.part_with(unlit(Color::srgb(0.3, 0.3, 0.3)));
        fx.surface_sharing(part, &material);

        assert_eq!(highlight(&mut fx.world, part, true), 1);
        assert_eq!(fx.material(&material).base_color, brighten(Color::srgb(0.3, 0.3, 0.3), 1.12));
    }
}
