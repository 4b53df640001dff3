//! Character body state.
//!
//! [`CharacterBody`] is the per-character simulation record mutated every
//! fixed step by the update pipeline. The marker components [`Grounded`] and
//! [`Airborne`] mirror its grounded flag for convenient queries and are synced
//! after each fixed step.

use bevy::prelude::*;

/// A surface hit produced by a world query.
///
/// Carried by [`CharacterBody::ground_hit`] and by the per-sweep velocity
/// projection buffer.
#[derive(Debug, Clone, Copy)]
pub struct CharacterHit {
    /// Entity owning the surface that was hit.
    pub entity: Entity,
    /// Surface normal at the hit point, unit length, pointing away from the
    /// surface.
    pub normal: Vec3,
    /// World-space hit point.
    pub point: Vec3,
    /// Travelled distance along the cast before contact.
    pub distance: f32,
    /// Whether the grounding policy classified this surface as walkable.
    pub is_walkable: bool,
}

impl CharacterHit {
    pub fn new(entity: Entity, normal: Vec3, point: Vec3, distance: f32) -> Self {
        Self {
            entity,
            normal,
            point,
            distance,
            is_walkable: false,
        }
    }
}

/// Per-character simulation state.
///
/// Created with the character entity, mutated every fixed step, and read by
/// the host for gameplay decisions. `grounding_up` is kept unit length by the
/// pipeline; `ground_hit` is only meaningful while `is_grounded` is true.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterBody {
    /// Velocity relative to the current parent (world velocity when free).
    pub relative_velocity: Vec3,
    /// Whether the character currently rests on a walkable surface.
    pub is_grounded: bool,
    /// The surface the character stands on. Only valid while grounded.
    #[reflect(ignore)]
    pub ground_hit: Option<CharacterHit>,
    /// The character's current "up" direction. Always unit length.
    pub grounding_up: Vec3,
    /// Moving-platform parent, if attached.
    pub parent: Option<Entity>,
    /// Rotation applied by the parent since the last fixed step. Consumed by
    /// the render-facing host (e.g. to rotate a camera rig with a turntable).
    pub rotation_from_parent: Quat,
    /// Delta time of the last fixed update this body went through.
    pub last_physics_delta: f32,
    /// Grounded flag as it was at the start of the current fixed step.
    pub was_grounded_before_update: bool,
    /// When set, the next grounding probe is skipped so a jump cannot be
    /// cancelled by an immediate re-snap to the ground. Cleared by the probe.
    pub(crate) must_unground: bool,
}

impl Default for CharacterBody {
    fn default() -> Self {
        Self {
            relative_velocity: Vec3::ZERO,
            is_grounded: false,
            ground_hit: None,
            grounding_up: Vec3::Y,
            parent: None,
            rotation_from_parent: Quat::IDENTITY,
            last_physics_delta: 0.0,
            was_grounded_before_update: false,
            must_unground: false,
        }
    }
}

impl CharacterBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entity of the surface currently stood on, if grounded.
    pub fn ground_entity(&self) -> Option<Entity> {
        if self.is_grounded {
            self.ground_hit.map(|hit| hit.entity)
        } else {
            None
        }
    }

    /// Ground normal, falling back to `grounding_up` when airborne.
    pub fn effective_ground_normal(&self) -> Vec3 {
        if self.is_grounded {
            self.ground_hit
                .map(|hit| hit.normal)
                .unwrap_or(self.grounding_up)
        } else {
            self.grounding_up
        }
    }

    /// Detach from ground immediately and skip the next grounding probe.
    ///
    /// Must be called *before* adding jump velocity, otherwise the same-step
    /// grounding re-snap can swallow the jump.
    pub fn unground(&mut self) {
        self.is_grounded = false;
        self.ground_hit = None;
        self.must_unground = true;
    }

    /// Set the grounding up direction, normalizing the input. Zero-length
    /// input is ignored so the unit-length invariant holds.
    pub fn set_grounding_up(&mut self, up: Vec3) {
        let normalized = up.normalize_or_zero();
        if normalized != Vec3::ZERO {
            self.grounding_up = normalized;
        }
    }

    /// Whether the character became airborne during the last update.
    pub fn left_ground_this_step(&self) -> bool {
        self.was_grounded_before_update && !self.is_grounded
    }

    /// Whether the character touched ground during the last update.
    pub fn landed_this_step(&self) -> bool {
        !self.was_grounded_before_update && self.is_grounded
    }
}

/// Marker component present while the character is grounded.
///
/// Synced from [`CharacterBody::is_grounded`] after each fixed step.
/// Mutually exclusive with [`Airborne`].
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Grounded;

/// Marker component present while the character is airborne.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct Airborne;

/// Sync [`Grounded`]/[`Airborne`] markers from [`CharacterBody`] state.
pub fn sync_state_markers(
    mut commands: Commands,
    q_bodies: Query<(Entity, &CharacterBody, Has<Grounded>, Has<Airborne>)>,
) {
    for (entity, body, has_grounded, has_airborne) in &q_bodies {
        if body.is_grounded && !has_grounded {
            commands.entity(entity).insert(Grounded).remove::<Airborne>();
        } else if !body.is_grounded && (has_grounded || !has_airborne) {
            commands.entity(entity).remove::<Grounded>().insert(Airborne);
        }
    }
}
