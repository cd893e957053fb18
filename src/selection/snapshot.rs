use bevy::prelude::*;
use std::collections::HashMap;

/// Appearance channels a material may or may not expose.
///
/// Getters return `None` for a channel the material does not have; setters for
/// such a channel are ignored.
pub trait Appearance {
    fn base_color(&self) -> Option<Color>;
    fn set_base_color(&mut self, color: Color);
    fn emissive(&self) -> Option<LinearRgba>;
    fn set_emissive(&mut self, emissive: LinearRgba);
    fn emissive_strength(&self) -> Option<f32> {
        None
    }
    fn set_emissive_strength(&mut self, _strength: f32) {}
}

/// Unlit materials skip lighting entirely, emissive included, so only the
/// base color is treated as a live channel for them.
impl Appearance for StandardMaterial {
    fn base_color(&self) -> Option<Color> {
        Some(self.base_color)
    }

    fn set_base_color(&mut self, color: Color) {
        self.base_color = color;
    }

    fn emissive(&self) -> Option<LinearRgba> {
        (!self.unlit).then_some(self.emissive)
    }

    fn set_emissive(&mut self, emissive: LinearRgba) {
        if !self.unlit {
            self.emissive = emissive;
        }
    }
}

/// Original appearance of a material, recorded on first touch.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialSnapshot {
    pub base_color: Option<Color>,
    pub emissive: Option<LinearRgba>,
    pub emissive_strength: Option<f32>,
}

impl MaterialSnapshot {
    pub fn capture(material: &impl Appearance) -> Self {
        Self {
            base_color: material.base_color(),
            emissive: material.emissive(),
            emissive_strength: material.emissive_strength(),
        }
    }

    /// Every channel present on both sides already holds the snapshot value.
    pub fn matches(&self, material: &impl Appearance) -> bool {
        fn same<T: PartialEq>(saved: Option<T>, live: Option<T>) -> bool {
            match (saved, live) {
                (Some(saved), Some(live)) => saved == live,
                _ => true,
            }
        }
        same(self.base_color, material.base_color())
            && same(self.emissive, material.emissive())
            && same(self.emissive_strength, material.emissive_strength())
    }

    /// Write back only the channels that were captured and still exist.
    pub fn write_to(&self, material: &mut impl Appearance) {
        if let (Some(color), Some(_)) = (self.base_color, material.base_color()) {
            material.set_base_color(color);
        }
        if let (Some(emissive), Some(_)) = (self.emissive, material.emissive()) {
            material.set_emissive(emissive);
        }
        if let (Some(strength), Some(_)) = (self.emissive_strength, material.emissive_strength()) {
            material.set_emissive_strength(strength);
        }
    }
}

/// First-touch snapshots keyed by material id.
///
/// Asset ids are plain keys and never keep a material alive; entries for
/// removed assets are dropped by [`forget_removed_materials`].
#[derive(Resource)]
pub struct MaterialSnapshots<M: Asset> {
    entries: HashMap<AssetId<M>, MaterialSnapshot>,
}

impl<M: Asset> Default for MaterialSnapshots<M> {
    fn default() -> Self {
        Self {
            entries: HashMap::default(),
        }
    }
}

impl<M: Asset + Appearance> MaterialSnapshots<M> {
    /// Existing snapshot, or capture `material` as it is now. First touch wins.
    pub fn ensure(&mut self, id: AssetId<M>, material: &M) -> MaterialSnapshot {
        *self
            .entries
            .entry(id)
            .or_insert_with(|| MaterialSnapshot::capture(material))
    }

    /// Put the snapshot back on the live asset. Returns whether anything was written;
    /// assets already equal to their snapshot are not borrowed mutably.
    pub fn restore(&self, id: AssetId<M>, assets: &mut Assets<M>) -> bool {
        let Some(snapshot) = self.entries.get(&id) else {
            return false;
        };
        if assets.get(id).is_none_or(|live| snapshot.matches(live)) {
            return false;
        }
        match assets.get_mut(id) {
            Some(live) => {
                snapshot.write_to(live);
                true
            }
            None => false,
        }
    }

    pub fn forget(&mut self, id: AssetId<M>) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub fn forget_removed_materials(
    mut events: EventReader<AssetEvent<StandardMaterial>>,
    mut snapshots: ResMut<MaterialSnapshots<StandardMaterial>>,
) {
    for event in events.read() {
        if let AssetEvent::Removed { id } = event {
            if snapshots.forget(*id) {
                debug!(
                    "dropped snapshot of removed material {id:?}, {} left",
                    snapshots.len()
                );
            }
        }
    }
}
