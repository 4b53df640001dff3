//! Physics backend abstraction.
//!
//! The controller core never talks to a physics engine directly. Everything
//! it needs — swept shape queries and rigid-body accessors — goes through
//! [`KinematicPhysicsBackend`], so engines can be swapped (Rapier3D included
//! behind the `rapier3d` feature) or mocked for deterministic tests.
//!
//! The cast primitives take a [`HitCollector`]: the backend visits candidate
//! hits, the collector filters and ranks them. This keeps self-rejection,
//! ignore lists and backface policies out of backend code.

use bevy::prelude::*;

use crate::collector::HitCollector;
use crate::config::CapsuleDimensions;

/// Classification of a rigid body as seen by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// Immovable world geometry.
    Fixed,
    /// Engine-simulated body the character can push.
    Dynamic,
    /// Script-driven body (moving platforms).
    Kinematic,
}

/// Trait for physics backend implementations.
///
/// All methods are associated functions taking the ECS [`World`]: the
/// pipeline runs as an exclusive system, reads through `&World` during the
/// parallel-safe compute phase and writes through `&mut World` afterwards.
pub trait KinematicPhysicsBackend: 'static + Send + Sync {
    /// Returns the plugin that sets up this backend.
    fn plugin() -> impl Plugin;

    /// Sweep a capsule through the world and visit every candidate hit.
    ///
    /// The capsule starts at `position`/`rotation` and travels
    /// `direction * max_distance`. Candidates are offered to `collector`;
    /// the accepted closest hit (if any) is also returned for convenience.
    ///
    /// `direction` must be unit length.
    fn cast_capsule(
        world: &World,
        capsule: &CapsuleDimensions,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
        collector: &mut dyn HitCollector,
    ) -> Option<crate::collector::HitCandidate>;

    /// Sweep a sphere through the world and visit every candidate hit.
    ///
    /// Used by the orbit camera's obstruction check.
    fn cast_sphere(
        world: &World,
        radius: f32,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
        collector: &mut dyn HitCollector,
    ) -> Option<crate::collector::HitCandidate>;

    /// Classify an entity's rigid body, or `None` if it has none.
    fn body_kind(world: &World, entity: Entity) -> Option<BodyKind>;

    /// Linear velocity of a rigid body at a world-space point, including the
    /// contribution of its angular velocity.
    fn velocity_at_point(world: &World, entity: Entity, point: Vec3) -> Vec3;

    /// Mass of a rigid body. Returns 0 for fixed bodies.
    fn body_mass(world: &World, entity: Entity) -> f32;

    /// Apply an impulse to a dynamic body at a world-space point, changing
    /// both linear and angular velocity through the standard impulse formula.
    fn apply_impulse_at_point(world: &mut World, entity: Entity, impulse: Vec3, point: Vec3);

    /// Add linear and angular velocity to a dynamic body directly.
    fn apply_velocity_change(world: &mut World, entity: Entity, linear: Vec3, angular: Vec3);

    /// Translate a body directly (queued displacement application).
    fn apply_displacement(world: &mut World, entity: Entity, displacement: Vec3);

    /// The fixed simulation timestep, seconds.
    fn fixed_timestep(world: &World) -> f32 {
        world
            .get_resource::<Time<Fixed>>()
            .map(|t| t.delta_secs())
            .filter(|&dt| dt > 0.0)
            .unwrap_or(1.0 / 64.0)
    }
}

/// Empty plugin for backends that need no additional setup.
pub struct NoOpBackendPlugin;

impl Plugin for NoOpBackendPlugin {
    fn build(&self, _app: &mut App) {}
}
