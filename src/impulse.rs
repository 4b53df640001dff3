//! Deferred impulse queue.
//!
//! Characters never mutate other bodies mid-update: every push, throw or
//! displacement discovered during the movement sweep is queued here and
//! drained once, after all character updates of the fixed step have finished.
//! That keeps the collision world read-only during the (parallelizable)
//! character phase and makes cross-character effects order-independent.

use bevy::prelude::*;

use crate::backend::{BodyKind, KinematicPhysicsBackend};
use crate::body::CharacterBody;

/// A velocity/displacement change queued for end-of-step application.
#[derive(Debug, Clone, Copy)]
pub struct DeferredImpulse {
    /// Entity receiving the change.
    pub target: Entity,
    /// Linear velocity to add.
    pub linear_velocity_change: Vec3,
    /// Angular velocity to add (dynamic bodies only).
    pub angular_velocity_change: Vec3,
    /// Positional displacement to apply directly.
    pub displacement: Vec3,
    /// When set, dynamic targets receive the linear change as an impulse at
    /// this world point (producing the angular response of an off-center
    /// push) instead of a raw velocity write.
    pub world_point: Option<Vec3>,
}

impl DeferredImpulse {
    /// A pure linear velocity change.
    pub fn linear(target: Entity, velocity_change: Vec3) -> Self {
        Self {
            target,
            linear_velocity_change: velocity_change,
            angular_velocity_change: Vec3::ZERO,
            displacement: Vec3::ZERO,
            world_point: None,
        }
    }

    /// A push applied at a world point.
    pub fn at_point(target: Entity, velocity_change: Vec3, point: Vec3) -> Self {
        Self {
            world_point: Some(point),
            ..Self::linear(target, velocity_change)
        }
    }

    /// A pure displacement.
    pub fn displacement(target: Entity, displacement: Vec3) -> Self {
        Self {
            target,
            linear_velocity_change: Vec3::ZERO,
            angular_velocity_change: Vec3::ZERO,
            displacement,
            world_point: None,
        }
    }
}

/// Step-scoped impulse queue. Appended during character updates, drained by
/// [`apply_deferred_impulses`], empty between steps.
#[derive(Resource, Debug, Default)]
pub struct DeferredImpulseQueue {
    impulses: Vec<DeferredImpulse>,
}

impl DeferredImpulseQueue {
    pub fn push(&mut self, impulse: DeferredImpulse) {
        self.impulses.push(impulse);
    }

    pub fn len(&self) -> usize {
        self.impulses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.impulses.is_empty()
    }

    pub fn drain(&mut self) -> Vec<DeferredImpulse> {
        std::mem::take(&mut self.impulses)
    }
}

/// Drain the queue and apply every impulse, in queue order.
///
/// Character targets get the linear change added to their body velocity
/// (characters do not use rigid-body impulse math); dynamic bodies go through
/// the backend. Multiple impulses against the same target accumulate because
/// every application is additive.
pub fn apply_deferred_impulses<B: KinematicPhysicsBackend>(world: &mut World) {
    let impulses = {
        let Some(mut queue) = world.get_resource_mut::<DeferredImpulseQueue>() else {
            return;
        };
        queue.drain()
    };

    for impulse in impulses {
        let target = impulse.target;
        if world.get_entity(target).is_err() {
            // Stale handle: the body despawned mid-step. Not an error.
            continue;
        }

        if let Some(mut body) = world.get_mut::<CharacterBody>(target) {
            body.relative_velocity += impulse.linear_velocity_change;
        } else if B::body_kind(world, target) == Some(BodyKind::Dynamic) {
            match impulse.world_point {
                Some(point) => {
                    let mass = B::body_mass(world, target);
                    B::apply_impulse_at_point(
                        world,
                        target,
                        impulse.linear_velocity_change * mass,
                        point,
                    );
                    if impulse.angular_velocity_change != Vec3::ZERO {
                        B::apply_velocity_change(
                            world,
                            target,
                            Vec3::ZERO,
                            impulse.angular_velocity_change,
                        );
                    }
                }
                None => {
                    B::apply_velocity_change(
                        world,
                        target,
                        impulse.linear_velocity_change,
                        impulse.angular_velocity_change,
                    );
                }
            }
        }

        if impulse.displacement != Vec3::ZERO {
            B::apply_displacement(world, target, impulse.displacement);
        }
    }
}
