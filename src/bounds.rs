use bevy::math::{Affine3A, Vec3A};
use bevy::prelude::*;
use bevy::render::primitives::Aabb;

/// Ray-AABB intersection (slab method). Returns the entry distance when hit.
pub fn ray_aabb_intersection(
    origin: Vec3,
    dir: Vec3,
    aabb_min: Vec3,
    aabb_max: Vec3,
) -> Option<f32> {
    // Avoid div by zero; replace zero components with a small epsilon.
    let eps = 1e-8;
    let safe = |d: f32| if d.abs() < eps { eps.copysign(d) } else { d };
    let inv_dir = Vec3::new(1.0 / safe(dir.x), 1.0 / safe(dir.y), 1.0 / safe(dir.z));

    let t1 = (aabb_min - origin) * inv_dir;
    let t2 = (aabb_max - origin) * inv_dir;
    let tmin = t1.min(t2).max_element();
    let tmax = t1.max(t2).min_element();

    if tmax >= tmin.max(0.0) {
        Some(tmin.max(0.0))
    } else {
        None
    }
}

/// Transform a local-space AABB by an affine map.
/// Works for any combination of rotation + non-uniform scale + translation.
pub fn aabb_world(local: &Aabb, affine: &Affine3A) -> Aabb {
    let m = affine.matrix3;
    let c_world = m * local.center + affine.translation;

    // abs(R*S) * half_extents, column-wise
    let he = local.half_extents;
    let (x, y, z) = (m.x_axis, m.y_axis, m.z_axis);
    let he_world = Vec3A::new(
        x.x.abs() * he.x + y.x.abs() * he.y + z.x.abs() * he.z,
        x.y.abs() * he.x + y.y.abs() * he.y + z.y.abs() * he.z,
        x.z.abs() * he.x + y.z.abs() * he.y + z.z.abs() * he.z,
    );

    Aabb {
        center: c_world,
        half_extents: he_world,
    }
}

/// Smallest box containing both.
pub fn union(a: &Aabb, b: &Aabb) -> Aabb {
    Aabb::from_min_max(a.min().min(b.min()).into(), a.max().max(b.max()).into())
}

pub fn size(aabb: &Aabb) -> Vec3 {
    (aabb.half_extents * 2.0).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_box_in_front() {
        let t = ray_aabb_intersection(
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::NEG_Z,
            Vec3::splat(-1.0),
            Vec3::splat(1.0),
        );
        assert_eq!(t, Some(9.0));
    }

    #[test]
    fn ray_misses_box_behind_or_beside() {
        let unit = |origin, dir| {
            ray_aabb_intersection(origin, dir, Vec3::splat(-1.0), Vec3::splat(1.0))
        };
        let behind = unit(Vec3::new(0.0, 0.0, 10.0), Vec3::Z);
        let beside = unit(Vec3::new(5.0, 0.0, 10.0), Vec3::NEG_Z);
        assert_eq!(behind, None);
        assert_eq!(beside, None);
    }

    #[test]
    fn axis_parallel_ray_inside_slab_hits() {
        let t = ray_aabb_intersection(Vec3::new(0.5, 0.5, 5.0), Vec3::NEG_Z, Vec3::ZERO, Vec3::ONE);
        assert_eq!(t, Some(4.0));
    }

    #[test]
    fn rotated_box_grows_world_extents() {
        let local = Aabb::from_min_max(Vec3::new(-2.0, -1.0, -1.0), Vec3::new(2.0, 1.0, 1.0));
        let affine = Affine3A::from_rotation_translation(
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let world = aabb_world(&local, &affine);
        assert!(Vec3::from(world.center).abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
        assert!(Vec3::from(world.half_extents).abs_diff_eq(Vec3::new(1.0, 1.0, 2.0), 1e-5));
    }

    #[test]
    fn union_covers_both() {
        let a = Aabb::from_min_max(Vec3::ZERO, Vec3::ONE);
        let b = Aabb::from_min_max(Vec3::splat(-2.0), Vec3::new(0.5, 0.5, 3.0));
        let u = union(&a, &b);
        assert_eq!(Vec3::from(u.min()), Vec3::splat(-2.0));
        assert_eq!(Vec3::from(u.max()), Vec3::new(1.0, 1.0, 3.0));
    }
}
