use bevy::ecs::system::SystemParam;
use bevy::prelude::*;

use crate::gizmo::TransformGizmo;
use crate::post::outlines::OutlineOverlay;
use crate::scene::{AssetRoot, is_under};
use crate::selection::highlight::Highlighter;

/// The one selected part, if any.
#[derive(Resource, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Idle,
    Selected(Entity),
}

impl Selection {
    pub fn part(self) -> Option<Entity> {
        match self {
            Selection::Idle => None,
            Selection::Selected(part) => Some(part),
        }
    }

    /// Next state and the side effects to run, in order, to get there.
    pub fn transition(self, target: Option<Entity>) -> (Selection, Vec<SelectionEffect>) {
        use SelectionEffect::*;
        match (self, target) {
            (Selection::Idle, None) => (self, Vec::new()),
            (Selection::Idle, Some(p)) => (
                Selection::Selected(p),
                vec![Highlight(p), Outline(Some(p)), AttachGizmo(p)],
            ),
            (Selection::Selected(a), Some(b)) if a == b => (self, Vec::new()),
            (Selection::Selected(a), Some(b)) => (
                Selection::Selected(b),
                vec![Unhighlight(a), Highlight(b), Outline(Some(b)), AttachGizmo(b)],
            ),
            (Selection::Selected(a), None) => (
                Selection::Idle,
                vec![Unhighlight(a), Outline(None), DetachGizmo],
            ),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionEffect {
    Highlight(Entity),
    Unhighlight(Entity),
    /// Replace the outline overlay list with this object, or empty it.
    Outline(Option<Entity>),
    AttachGizmo(Entity),
    DetachGizmo,
}

/// The only writer of selection, highlight, outline list and gizmo attachment.
#[derive(SystemParam)]
pub struct SelectionDriver<'w, 's> {
    selection: ResMut<'w, Selection>,
    highlighter: Highlighter<'w, 's>,
    outline: ResMut<'w, OutlineOverlay>,
    gizmo: ResMut<'w, TransformGizmo>,
    roots: Query<'w, 's, Entity, With<AssetRoot>>,
    parents: Query<'w, 's, &'static ChildOf>,
}

impl SelectionDriver<'_, '_> {
    pub fn gizmo(&self) -> &TransformGizmo {
        &self.gizmo
    }

    pub fn root(&self) -> Option<Entity> {
        self.roots.single().ok()
    }

    pub fn parent_of(&self, entity: Entity) -> Option<Entity> {
        self.parents.get(entity).ok().map(ChildOf::parent)
    }

    /// Run one complete transition. Targets outside the asset root are
    /// rejected without touching any state. Returns whether anything changed.
    pub fn select(&mut self, target: Option<Entity>) -> bool {
        if let Some(t) = target {
            let Some(root) = self.root() else {
                return false;
            };
            if !is_under(t, root, |e| self.parent_of(e)) {
                debug!("ignoring selection of {t:?}: not under the asset root");
                return false;
            }
        }

        let (next, effects) = self.selection.transition(target);
        if effects.is_empty() {
            return false;
        }
        for effect in effects {
            self.run(effect);
        }
        *self.selection = next;
        debug!("selection -> {next:?}");
        true
    }

    fn run(&mut self, effect: SelectionEffect) {
        match effect {
            SelectionEffect::Highlight(part) => {
                self.highlighter.set_highlight(part, true);
            }
            SelectionEffect::Unhighlight(part) => {
                self.highlighter.set_highlight(part, false);
            }
            SelectionEffect::Outline(Some(part)) => self.outline.set([part]),
            SelectionEffect::Outline(None) => self.outline.clear(),
            SelectionEffect::AttachGizmo(part) => self.gizmo.attach(part),
            SelectionEffect::DetachGizmo => self.gizmo.detach(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::fixture::{Fixture, lit, unlit};
    use crate::selection::highlight::HighlightStyle;
    use SelectionEffect::*;

    fn e(n: u32) -> Entity {
        Entity::from_raw(n)
    }

    #[test]
    fn transitions_enumerate_all_cases() {
        let (a, b) = (e(1), e(2));
        assert_eq!(Selection::Idle.transition(None), (Selection::Idle, vec![]));
        assert_eq!(
            Selection::Idle.transition(Some(a)),
            (Selection::Selected(a), vec![Highlight(a), Outline(Some(a)), AttachGizmo(a)])
        );
        assert_eq!(Selection::Selected(a).transition(Some(a)), (Selection::Selected(a), vec![]));
        assert_eq!(
            Selection::Selected(a).transition(Some(b)),
            (
                Selection::Selected(b),
                vec![Unhighlight(a), Highlight(b), Outline(Some(b)), AttachGizmo(b)]
            )
        );
        assert_eq!(
            Selection::Selected(a).transition(None),
            (Selection::Idle, vec![Unhighlight(a), Outline(None), DetachGizmo])
        );
    }

    #[test]
    fn any_sequence_leaves_at_most_one_part_highlighted() {
        let mut fx = Fixture::new();
        let (a, ma) = fx.part_with(lit(Color::srgb(0.5, 0.5, 0.5)));
        let (b, mb) = fx.part_with(unlit(Color::srgb(0.2, 0.3, 0.4)));
        let (c, mc) = fx.part_with(lit(Color::srgb(0.9, 0.1, 0.1)));
        let tint = HighlightStyle::default().emissive_tint;

        for step in [Some(a), Some(b), None, Some(c), Some(c), Some(a), None, Some(b)] {
            fx.select(step);
            let lit_count = [
                fx.material(&ma).emissive == tint,
                fx.material(&mb).base_color != Color::srgb(0.2, 0.3, 0.4),
                fx.material(&mc).emissive == tint,
            ]
            .into_iter()
            .filter(|on| *on)
            .count();
            assert_eq!(lit_count, step.is_some() as usize, "after selecting {step:?}");
        }
    }

    #[test]
    fn reselecting_the_same_part_changes_nothing() {
        let mut fx = Fixture::new();
        let (a, _) = fx.part_with(lit(Color::WHITE));

        assert!(fx.select(Some(a)));
        let tick_before = fx.world.resource_ref::<Selection>().last_changed();
        fx.world.increment_change_tick();

        assert!(!fx.select(Some(a)));
        assert_eq!(fx.world.resource_ref::<Selection>().last_changed(), tick_before);
        assert_eq!(fx.outline(), vec![a]);
        assert_eq!(fx.gizmo_target(), Some(a));
    }

    #[test]
    fn a_then_b_then_a_restores_b_and_binds_a() {
        let mut fx = Fixture::new();
        let (a, ma) = fx.part_with(lit(Color::srgb(0.5, 0.5, 0.5)));
        let b_original = Color::srgb(0.2, 0.3, 0.4);
        let (b, mb) = fx.part_with(unlit(b_original));

        fx.select(Some(a));
        fx.select(Some(b));
        fx.select(Some(a));

        assert_eq!(*fx.world.resource::<Selection>(), Selection::Selected(a));
        assert_eq!(fx.material(&ma).emissive, HighlightStyle::default().emissive_tint);
        assert_eq!(fx.material(&mb).base_color, b_original);
        assert_eq!(fx.gizmo_target(), Some(a));
        assert_eq!(fx.outline(), vec![a]);
    }

    #[test]
    fn deselect_clears_outline_and_gizmo() {
        let mut fx = Fixture::new();
        let (a, ma) = fx.part_with(lit(Color::WHITE));

        fx.select(Some(a));
        assert!(fx.select(None));
        assert_eq!(*fx.world.resource::<Selection>(), Selection::Idle);
        assert_eq!(fx.material(&ma).emissive, LinearRgba::BLACK);
        assert!(fx.outline().is_empty());
        assert_eq!(fx.gizmo_target(), None);

        assert!(!fx.select(None));
    }

    #[test]
    fn nodes_outside_the_root_are_rejected() {
        let mut fx = Fixture::new();
        let (a, ma) = fx.part_with(lit(Color::WHITE));
        let stray = fx.world.spawn_empty().id();
        let root = fx.root;

        fx.select(Some(a));
        assert!(!fx.select(Some(stray)));
        assert!(!fx.select(Some(root)));

        assert_eq!(*fx.world.resource::<Selection>(), Selection::Selected(a));
        assert_eq!(fx.material(&ma).emissive, HighlightStyle::default().emissive_tint);
        assert_eq!(fx.gizmo_target(), Some(a));
    }
}
