//! Rapier3D physics backend implementation.
//!
//! This module provides the physics backend for Bevy Rapier3D.
//! Enable with the `rapier3d` feature.

use bevy::prelude::*;
use bevy_rapier3d::plugin::context::{
    RapierContextColliders, RapierQueryPipeline, RapierRigidBodySet,
};
use bevy_rapier3d::prelude::*;

use crate::backend::{BodyKind, KinematicPhysicsBackend, NoOpBackendPlugin};
use crate::collector::{HitCandidate, HitCollector};
use crate::config::CapsuleDimensions;

/// Successive nearest-entity recasts per query. Each recast excludes the
/// entities already offered to the collector, so rejected hits (self, ignored
/// props) do not shadow surfaces behind them.
const MAX_CAST_PASSES: u32 = 8;

/// Rapier3D physics backend for the character controller.
///
/// Shape queries go through Rapier's query pipeline, read directly from the
/// ECS world so the exclusive character update can run them against `&World`.
/// Sensors are excluded at the filter level; every candidate that reaches the
/// collector is a solid surface.
pub struct Rapier3dBackend;

/// The query pipeline lives on Rapier's context entity.
fn query_context(
    world: &World,
) -> Option<(
    &RapierQueryPipeline,
    &RapierContextColliders,
    &RapierRigidBodySet,
)> {
    world.iter_entities().find_map(|entity| {
        let pipeline = entity.get::<RapierQueryPipeline>()?;
        let colliders = entity.get::<RapierContextColliders>()?;
        let bodies = entity.get::<RapierRigidBodySet>()?;
        Some((pipeline, colliders, bodies))
    })
}

/// Sweep `shape` through the world, offering each successive nearest hit to
/// the collector. Rapier's cast returns only the first hit along the path, so
/// candidates behind a rejected entity are reached by recasting with that
/// entity excluded.
fn cast_shape_collecting(
    world: &World,
    shape: &Collider,
    position: Vec3,
    rotation: Quat,
    direction: Vec3,
    max_distance: f32,
    collector: &mut dyn HitCollector,
) -> Option<HitCandidate> {
    let (pipeline, colliders, bodies) = query_context(world)?;

    let options = ShapeCastOptions {
        max_time_of_impact: max_distance,
        target_distance: 0.0,
        stop_at_penetration: true,
        compute_impact_geometry_on_penetration: true,
    };

    let mut excluded: Vec<Entity> = Vec::new();
    for _ in 0..MAX_CAST_PASSES {
        let predicate =
            |entity: Entity| collector.retains_entity(entity) && !excluded.contains(&entity);
        let filter = QueryFilter::default()
            .exclude_sensors()
            .predicate(&predicate);

        let Some((entity, hit)) = pipeline.cast_shape(
            colliders,
            bodies,
            position,
            rotation,
            direction,
            shape,
            options,
            filter,
        ) else {
            break;
        };

        let normal = hit
            .details
            .map(|d| d.normal1)
            .unwrap_or(-direction)
            .normalize_or_zero();
        let point = hit
            .details
            .map(|d| d.witness1)
            .unwrap_or(position + direction * hit.time_of_impact);
        let fraction = if max_distance > 0.0 {
            hit.time_of_impact / max_distance
        } else {
            0.0
        };

        collector.add_hit(HitCandidate {
            entity,
            fraction,
            distance: hit.time_of_impact,
            normal,
            point,
            is_solid: true,
        });
        excluded.push(entity);
    }

    collector.closest()
}

impl KinematicPhysicsBackend for Rapier3dBackend {
    fn plugin() -> impl Plugin {
        // All queries read the world directly; the host adds
        // `RapierPhysicsPlugin` itself.
        NoOpBackendPlugin
    }

    fn cast_capsule(
        world: &World,
        capsule: &CapsuleDimensions,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
        collector: &mut dyn HitCollector,
    ) -> Option<HitCandidate> {
        let shape = Collider::capsule_y(capsule.half_height, capsule.radius);
        cast_shape_collecting(
            world,
            &shape,
            position,
            rotation,
            direction,
            max_distance,
            collector,
        )
    }

    fn cast_sphere(
        world: &World,
        radius: f32,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        collector: &mut dyn HitCollector,
    ) -> Option<HitCandidate> {
        let shape = Collider::ball(radius);
        cast_shape_collecting(
            world,
            &shape,
            origin,
            Quat::IDENTITY,
            direction,
            max_distance,
            collector,
        )
    }

    fn body_kind(world: &World, entity: Entity) -> Option<BodyKind> {
        world.get::<RigidBody>(entity).map(|body| match body {
            RigidBody::Fixed => BodyKind::Fixed,
            RigidBody::Dynamic => BodyKind::Dynamic,
            RigidBody::KinematicPositionBased | RigidBody::KinematicVelocityBased => {
                BodyKind::Kinematic
            }
        })
    }

    fn velocity_at_point(world: &World, entity: Entity, point: Vec3) -> Vec3 {
        let Some(velocity) = world.get::<Velocity>(entity) else {
            return Vec3::ZERO;
        };
        let center = world
            .get::<GlobalTransform>(entity)
            .map(|t| t.translation())
            .or_else(|| world.get::<Transform>(entity).map(|t| t.translation))
            .unwrap_or(point);
        velocity.linvel + velocity.angvel.cross(point - center)
    }

    fn body_mass(world: &World, entity: Entity) -> f32 {
        world
            .get::<ReadMassProperties>(entity)
            .map(|props| props.mass)
            .filter(|mass| mass.is_finite() && *mass > 0.0)
            .unwrap_or(0.0)
    }

    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3) {
        let center = world
            .get::<GlobalTransform>(entity)
            .map(|t| t.translation())
            .or_else(|| world.get::<Transform>(entity).map(|t| t.translation))
            .unwrap_or(point);
        if let Some(mut ext_impulse) = world.get_mut::<ExternalImpulse>(entity) {
            let applied = ExternalImpulse::at_point(impulse, point, center);
            ext_impulse.impulse += applied.impulse;
            ext_impulse.torque_impulse += applied.torque_impulse;
        } else {
            // No impulse accumulator: fall back to a direct velocity change.
            let mass = Self::body_mass(world, entity);
            if mass > 0.0 {
                if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
                    velocity.linvel += impulse / mass;
                }
            }
        }
    }

    fn apply_velocity_change(world: &mut World, entity: Entity, linear: Vec3, angular: Vec3) {
        if let Some(mut velocity) = world.get_mut::<Velocity>(entity) {
            velocity.linvel += linear;
            velocity.angvel += angular;
        }
    }

    fn apply_displacement(world: &mut World, entity: Entity, displacement: Vec3) {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation += displacement;
        }
    }
}

/// Bundle for spawning a character with Rapier3D physics.
///
/// The character body is kinematic: the controller owns its Transform and
/// Rapier only mirrors it into the collision world. Dynamic obstacles push
/// back through the deferred impulse queue, never through the solver.
#[derive(Bundle)]
pub struct Rapier3dCharacterBundle {
    pub rigid_body: RigidBody,
    pub collider: Collider,
}

impl Rapier3dCharacterBundle {
    pub fn new(capsule: &CapsuleDimensions) -> Self {
        Self {
            rigid_body: RigidBody::KinematicPositionBased,
            collider: Collider::capsule_y(capsule.half_height, capsule.radius),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn body_kind_maps_rigid_body_variants() {
        let mut world = World::new();
        let fixed = world.spawn(RigidBody::Fixed).id();
        let dynamic = world.spawn(RigidBody::Dynamic).id();
        let kinematic = world.spawn(RigidBody::KinematicPositionBased).id();
        let bare = world.spawn_empty().id();

        assert_eq!(Rapier3dBackend::body_kind(&world, fixed), Some(BodyKind::Fixed));
        assert_eq!(
            Rapier3dBackend::body_kind(&world, dynamic),
            Some(BodyKind::Dynamic)
        );
        assert_eq!(
            Rapier3dBackend::body_kind(&world, kinematic),
            Some(BodyKind::Kinematic)
        );
        assert_eq!(Rapier3dBackend::body_kind(&world, bare), None);
    }

    #[test]
    fn velocity_at_point_includes_angular_contribution() {
        let mut world = World::new();
        // Spinning about +Y at 1 rad/s, centered at the origin.
        let body = world
            .spawn((
                Transform::default(),
                GlobalTransform::default(),
                Velocity {
                    linvel: Vec3::new(1.0, 0.0, 0.0),
                    angvel: Vec3::Y,
                },
            ))
            .id();

        // A point 2 units along +X moves at angvel x r = (0,1,0) x (2,0,0) = (0,0,-2).
        let at_point = Rapier3dBackend::velocity_at_point(&world, body, Vec3::new(2.0, 0.0, 0.0));
        assert_relative_eq!(at_point.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(at_point.z, -2.0, epsilon = 1e-5);

        // At the center only the linear part remains.
        let at_center = Rapier3dBackend::velocity_at_point(&world, body, Vec3::ZERO);
        assert_relative_eq!(at_center.distance(Vec3::X), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn velocity_at_point_without_velocity_is_zero() {
        let mut world = World::new();
        let body = world.spawn(Transform::default()).id();
        assert_eq!(
            Rapier3dBackend::velocity_at_point(&world, body, Vec3::ONE),
            Vec3::ZERO
        );
    }

    #[test]
    fn apply_velocity_change_accumulates() {
        let mut world = World::new();
        let body = world.spawn(Velocity::default()).id();

        Rapier3dBackend::apply_velocity_change(&mut world, body, Vec3::X, Vec3::Y);
        Rapier3dBackend::apply_velocity_change(&mut world, body, Vec3::X, Vec3::ZERO);

        let velocity = world.get::<Velocity>(body).unwrap();
        assert_eq!(velocity.linvel, Vec3::X * 2.0);
        assert_eq!(velocity.angvel, Vec3::Y);
    }

    #[test]
    fn apply_displacement_moves_transform() {
        let mut world = World::new();
        let body = world.spawn(Transform::from_xyz(1.0, 0.0, 0.0)).id();

        Rapier3dBackend::apply_displacement(&mut world, body, Vec3::new(0.0, 2.0, 0.0));

        let transform = world.get::<Transform>(body).unwrap();
        assert_eq!(transform.translation, Vec3::new(1.0, 2.0, 0.0));
    }

    #[test]
    fn character_bundle_is_kinematic() {
        let bundle = Rapier3dCharacterBundle::new(&CapsuleDimensions::default());
        assert!(matches!(bundle.rigid_body, RigidBody::KinematicPositionBased));
    }
}
