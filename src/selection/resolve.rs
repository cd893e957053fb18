use bevy::prelude::*;

/// Walk up from a ray hit to the node whose direct parent is `root`.
///
/// A hit with no path to `root` resolves to itself so the caller can still
/// treat it as a (degenerate) single-surface part.
pub fn resolve_part(
    hit: Entity,
    root: Entity,
    parent_of: impl Fn(Entity) -> Option<Entity>,
) -> Entity {
    let mut current = hit;
    while let Some(parent) = parent_of(current) {
        if parent == root {
            return current;
        }
        current = parent;
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tree(links: &[(Entity, Entity)]) -> impl Fn(Entity) -> Option<Entity> + use<> {
        let map: HashMap<Entity, Entity> = links.iter().copied().collect();
        move |e| map.get(&e).copied()
    }

    #[test]
    fn deep_hit_resolves_to_direct_child_of_root() {
        let [scene, root, part, group, leaf] = [0, 1, 2, 3, 4].map(Entity::from_raw);
        let parent_of = tree(&[(root, scene), (part, root), (group, part), (leaf, group)]);

        assert_eq!(resolve_part(leaf, root, &parent_of), part);
        assert_eq!(resolve_part(group, root, &parent_of), part);
        assert_eq!(resolve_part(part, root, &parent_of), part);
    }

    #[test]
    fn hit_outside_root_resolves_to_itself() {
        let [scene, root, stray, leaf] = [0, 1, 2, 3].map(Entity::from_raw);
        let parent_of = tree(&[(root, scene), (stray, scene), (leaf, stray)]);

        assert_eq!(resolve_part(leaf, root, &parent_of), leaf);
        assert_eq!(resolve_part(root, root, &parent_of), root);
    }

    #[test]
    fn works_on_a_world_hierarchy() {
        let mut world = World::new();
        let root = world.spawn_empty().id();
        let part = world.spawn_empty().id();
        let surface = world.spawn_empty().id();
        world.entity_mut(root).add_child(part);
        world.entity_mut(part).add_child(surface);

        let resolved =
            resolve_part(surface, root, |e| world.get::<ChildOf>(e).map(ChildOf::parent));
        assert_eq!(resolved, part);
    }
}
