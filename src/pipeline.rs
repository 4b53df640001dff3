//! The phased character update pipeline.
//!
//! Runs once per fixed step for every character, in a fixed phase order:
//!
//! 1. initialize per-step state
//! 2. follow the parent platform
//! 3. grounding detection
//! 4. velocity control (policy hook)
//! 5. downslope grounding preservation
//! 6. ground pushing against dynamic bodies
//! 7. movement sweep and decollision
//! 8. moving-platform detection
//! 9. parent momentum transfer
//! 10. stateful hit bookkeeping
//!
//! Game-specific behavior enters exclusively through the
//! [`CharacterProcessor`] policy hooks; the phase order itself never varies.
//! Cross-body effects are queued on the [`DeferredImpulseQueue`] and applied
//! after every character has updated, so the collision world stays read-only
//! for the whole character phase.

use bevy::prelude::*;

use crate::backend::{BodyKind, KinematicPhysicsBackend};
use crate::body::{CharacterBody, CharacterHit};
use crate::collector::{ClosestHitCollector, HitCandidate, HitCollector};
use crate::config::CharacterConfig;
use crate::events::HitEventTracker;
use crate::impulse::{DeferredImpulse, DeferredImpulseQueue};
use crate::intent::CharacterIntent;
use crate::interpolation::TrackedTransform;
use crate::math::{
    clamp_additive_velocity_to_max_speed_on_plane, interpolate_velocity_towards_target,
    project_on_plane, reorient_on_plane, slope_angle_towards_direction,
};

/// Movement below this length is dropped rather than swept.
const MIN_MOVEMENT: f32 = 1e-4;

/// Two hit normals with a dot product below this are treated as a concave
/// corner: continuing to slide would ping-pong forever, so remaining
/// movement is zeroed instead.
const CONCAVE_NORMAL_DOT: f32 = -0.85;

/// Context handed to [`CharacterProcessor::control_velocity`].
pub struct VelocityControlContext<'a> {
    pub entity: Entity,
    pub config: &'a CharacterConfig,
    pub body: &'a mut CharacterBody,
    pub intent: &'a mut CharacterIntent,
    pub dt: f32,
}

/// Context handed to [`CharacterProcessor::on_movement_hit`].
pub struct MovementHitContext<'a> {
    pub entity: Entity,
    pub config: &'a CharacterConfig,
    pub body: &'a CharacterBody,
    /// Character position, advanced up to the hit already. Step-up logic may
    /// move it further.
    pub position: &'a mut Vec3,
    pub rotation: Quat,
    /// Movement still to consume this step. The default response projects it
    /// onto the hit plane.
    pub remaining_movement: &'a mut Vec3,
    pub hit: HitCandidate,
    /// Whether the grounding policy classified the hit surface as walkable.
    pub hit_is_walkable: bool,
}

/// Game-specific policy hooks consumed by the pipeline.
///
/// Implemented as a component so different character archetypes can carry
/// different policies; the pipeline is monomorphized per processor type, so
/// no per-hit virtual dispatch occurs. Every hook has a default matching
/// [`DefaultProcessor`], so custom processors override selectively.
pub trait CharacterProcessor: Component + Clone {
    /// Supply the character's up direction. Called first every step; override
    /// for variable gravity. The default keeps the current value.
    fn update_grounding_up(&self, _body: &mut CharacterBody, _transform: &Transform) {}

    /// Classify a surface as walkable ground.
    fn is_grounded_on_hit(
        &self,
        config: &CharacterConfig,
        body: &CharacterBody,
        hit: &HitCandidate,
    ) -> bool {
        hit.normal.dot(body.grounding_up) >= config.min_walkable_normal_dot()
    }

    /// Collision filtering beyond the collector's built-in rules. Returning
    /// false makes the pipeline pass through the surface entirely.
    fn can_collide_with_hit(&self, _hit: &HitCandidate) -> bool {
        true
    }

    /// Mutate the body velocity from control intent. Runs after grounding is
    /// known and before movement is applied; this is the only phase where
    /// game-specific tuning enters.
    fn control_velocity(&self, _world: &World, ctx: &mut VelocityControlContext) {
        default_velocity_control(ctx);
    }

    /// React to a sweep hit: apply step-up, redirect remaining movement, or
    /// both. The default tries a step-up on steep surfaces and otherwise
    /// projects the remaining movement onto the hit plane.
    fn on_movement_hit<B: KinematicPhysicsBackend>(
        &self,
        world: &World,
        ctx: &mut MovementHitContext,
    ) {
        default_movement_hit_response::<B, Self>(self, world, ctx);
    }

    /// Reproject the final velocity against every surface touched this step.
    fn project_velocity_on_hits(
        &self,
        velocity: &mut Vec3,
        grounded: bool,
        grounding_up: Vec3,
        hits: &[CharacterHit],
    ) {
        default_velocity_projection(velocity, grounded, grounding_up, hits);
    }
}

/// Stock policy: slope-angle grounding, step-up below `max_step_height`,
/// plane projection with crease handling, exponential ground control and
/// clamped air control.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct DefaultProcessor;

impl CharacterProcessor for DefaultProcessor {}

/// Collector that additionally applies a processor's collision filter.
struct ProcessorFilteredCollector<'a, P: CharacterProcessor> {
    inner: ClosestHitCollector,
    processor: &'a P,
}

impl<'a, P: CharacterProcessor> ProcessorFilteredCollector<'a, P> {
    fn new(self_entity: Entity, processor: &'a P) -> Self {
        Self {
            inner: ClosestHitCollector::new(self_entity),
            processor,
        }
    }
}

impl<P: CharacterProcessor> HitCollector for ProcessorFilteredCollector<'_, P> {
    fn add_hit(&mut self, candidate: HitCandidate) -> bool {
        if !self.processor.can_collide_with_hit(&candidate) {
            return false;
        }
        self.inner.add_hit(candidate)
    }

    fn closest(&self) -> Option<HitCandidate> {
        self.inner.closest()
    }

    fn num_hits(&self) -> u32 {
        self.inner.num_hits()
    }

    fn retains_entity(&self, entity: Entity) -> bool {
        self.inner.retains_entity(entity)
    }
}

// === Movement utilities ===

/// Unground, optionally cancel velocity along the jump axis, then add the
/// jump velocity. Ungrounding first prevents the same-step grounding re-snap
/// from swallowing the jump.
pub fn standard_jump(
    body: &mut CharacterBody,
    jump_velocity: Vec3,
    cancel_velocity_before_jump: bool,
) {
    body.unground();
    if cancel_velocity_before_jump {
        let axis = jump_velocity.normalize_or_zero();
        if axis != Vec3::ZERO {
            body.relative_velocity = project_on_plane(body.relative_velocity, axis);
        }
    }
    body.relative_velocity += jump_velocity;
}

/// Grounded velocity control: tilt the intended flat-ground velocity onto the
/// ground plane and approach it exponentially.
pub fn default_ground_move(
    velocity: Vec3,
    move_direction: Vec3,
    ground_normal: Vec3,
    grounding_up: Vec3,
    max_speed: f32,
    sharpness: f32,
    dt: f32,
) -> Vec3 {
    let target = reorient_on_plane(move_direction * max_speed, ground_normal, grounding_up);
    let current_on_plane = reorient_on_plane(
        project_on_plane(velocity, grounding_up),
        ground_normal,
        grounding_up,
    );
    interpolate_velocity_towards_target(current_on_plane, target, sharpness, dt)
}

/// Air velocity control: accelerate along the input with the soft planar
/// speed clamp, then apply gravity and exponential drag.
pub fn default_air_move(
    mut velocity: Vec3,
    move_direction: Vec3,
    grounding_up: Vec3,
    config: &CharacterConfig,
    dt: f32,
) -> Vec3 {
    if move_direction.length_squared() > 0.0 {
        let additive = move_direction * config.air_acceleration * dt;
        velocity += clamp_additive_velocity_to_max_speed_on_plane(
            additive,
            velocity,
            config.air_max_speed,
            grounding_up,
            false,
        );
    }
    velocity += config.gravity * dt;
    if config.air_drag > 0.0 {
        velocity *= 1.0 / (1.0 + config.air_drag * dt);
    }
    velocity
}

/// The stock [`CharacterProcessor::control_velocity`] implementation.
pub fn default_velocity_control(ctx: &mut VelocityControlContext) {
    let config = ctx.config;
    let up = ctx.body.grounding_up;

    if ctx.body.is_grounded {
        let ground_normal = ctx.body.effective_ground_normal();
        ctx.body.relative_velocity = default_ground_move(
            ctx.body.relative_velocity,
            ctx.intent.move_direction,
            ground_normal,
            up,
            config.ground_max_speed,
            config.ground_movement_sharpness,
            ctx.dt,
        );
    } else {
        ctx.body.relative_velocity = default_air_move(
            ctx.body.relative_velocity,
            ctx.intent.move_direction,
            up,
            config,
            ctx.dt,
        );
    }

    if ctx.intent.jump_requested {
        ctx.intent.jump_requested = false;
        if ctx.body.is_grounded {
            standard_jump(
                ctx.body,
                up * config.jump_speed,
                config.cancel_velocity_before_jump,
            );
        }
    }
}

/// The stock velocity projection: project out every blocking plane, handle
/// the two-plane crease by sliding along it, and keep grounded velocity
/// tilted rather than flattened on walkable ground.
pub fn default_velocity_projection(
    velocity: &mut Vec3,
    grounded: bool,
    grounding_up: Vec3,
    hits: &[CharacterHit],
) {
    let mut previous_blocking_normal: Option<Vec3> = None;

    for hit in hits {
        if velocity.dot(hit.normal) >= -1e-6 {
            continue;
        }
        if grounded && hit.is_walkable {
            // Walkable ground constrains to the ground plane without losing
            // speed.
            *velocity = reorient_on_plane(
                project_on_plane(*velocity, grounding_up),
                hit.normal,
                grounding_up,
            );
            continue;
        }
        if let Some(previous) = previous_blocking_normal {
            // Second blocking plane: slide along the crease between the two.
            let crease = previous.cross(hit.normal).normalize_or_zero();
            if crease == Vec3::ZERO {
                *velocity = Vec3::ZERO;
                return;
            }
            *velocity = crease * velocity.dot(crease);
        } else {
            *velocity = project_on_plane(*velocity, hit.normal);
            previous_blocking_normal = Some(hit.normal);
        }
    }
}

/// The stock movement-hit response.
fn default_movement_hit_response<B: KinematicPhysicsBackend, P: CharacterProcessor>(
    processor: &P,
    world: &World,
    ctx: &mut MovementHitContext,
) {
    if !ctx.hit_is_walkable
        && ctx.config.step.enabled
        && try_step_up::<B, P>(processor, world, ctx)
    {
        return;
    }
    *ctx.remaining_movement = project_on_plane(*ctx.remaining_movement, ctx.hit.normal);
}

/// Attempt to treat a steep hit as a step: raise the capsule by up to
/// `max_step_height`, check forward clearance, then settle back down onto a
/// walkable surface. Returns whether the step was taken.
fn try_step_up<B: KinematicPhysicsBackend, P: CharacterProcessor>(
    processor: &P,
    world: &World,
    ctx: &mut MovementHitContext,
) -> bool {
    let config = ctx.config;
    let up = ctx.body.grounding_up;
    let step = config.step;

    // The obstacle must start low enough on the capsule to be a step at all.
    let capsule_bottom = *ctx.position - up * config.capsule.bottom_offset();
    let hit_height = (ctx.hit.point - capsule_bottom).dot(up);
    if hit_height > step.max_step_height {
        return false;
    }

    let forward = project_on_plane(*ctx.remaining_movement, up).normalize_or_zero();
    if forward == Vec3::ZERO {
        return false;
    }

    // 1. Headroom: raise the capsule by up to the step height.
    let mut collector = ProcessorFilteredCollector::new(ctx.entity, processor);
    let rise = match B::cast_capsule(
        world,
        &config.capsule,
        *ctx.position,
        ctx.rotation,
        up,
        step.max_step_height,
        &mut collector,
    ) {
        Some(blocker) => (blocker.distance - config.skin_width).max(0.0),
        None => step.max_step_height,
    };
    if rise <= config.skin_width {
        return false;
    }
    let raised = *ctx.position + up * rise;

    // 2. Forward clearance at the raised height.
    let forward_travel = step.required_width + config.skin_width;
    let mut collector = ProcessorFilteredCollector::new(ctx.entity, processor);
    if B::cast_capsule(
        world,
        &config.capsule,
        raised,
        ctx.rotation,
        forward,
        forward_travel,
        &mut collector,
    )
    .is_some()
    {
        return false;
    }
    let advanced = raised + forward * forward_travel;

    // 3. Settle down onto the step; it must be walkable.
    let mut collector = ProcessorFilteredCollector::new(ctx.entity, processor);
    let Some(landing) = B::cast_capsule(
        world,
        &config.capsule,
        advanced,
        ctx.rotation,
        -up,
        rise + config.ground_probe_distance,
        &mut collector,
    ) else {
        return false;
    };
    if !processor.is_grounded_on_hit(config, ctx.body, &landing) {
        return false;
    }

    *ctx.position = advanced - up * (landing.distance - config.skin_width).max(0.0);
    // The step consumed the forward travel; the rest stays planar.
    let remaining = project_on_plane(*ctx.remaining_movement, up);
    *ctx.remaining_movement =
        remaining - forward * forward_travel.min(remaining.dot(forward).max(0.0));
    true
}

// === Per-step simulation ===

/// Everything one character's fixed step produces, applied to the ECS by the
/// driver after the read-only compute finishes.
pub(crate) struct CharacterStepOutput {
    pub body: CharacterBody,
    pub intent: CharacterIntent,
    pub position: Vec3,
    pub rotation: Quat,
    pub impulses: Vec<DeferredImpulse>,
    pub hits: Vec<CharacterHit>,
}

/// Run phases 1–9 for one character against a read-only world.
#[allow(clippy::too_many_arguments)]
pub(crate) fn simulate_character_step<B: KinematicPhysicsBackend, P: CharacterProcessor>(
    world: &World,
    entity: Entity,
    processor: &P,
    config: &CharacterConfig,
    mut body: CharacterBody,
    mut intent: CharacterIntent,
    transform: Transform,
    dt: f32,
) -> CharacterStepOutput {
    let mut position = transform.translation;
    let mut rotation = transform.rotation;
    let mut impulses = Vec::new();
    let mut hits = Vec::new();

    // Phase 1: initialize.
    body.was_grounded_before_update = body.is_grounded;
    body.last_physics_delta = dt;
    body.rotation_from_parent = Quat::IDENTITY;
    let parent_before_update = body.parent;

    // Phase 2: follow the parent platform.
    if let Some(parent) = body.parent {
        match world.get::<TrackedTransform>(parent) {
            Some(tracked) => {
                position += tracked.point_displacement(position);
                let delta = tracked.rotation_delta();
                body.rotation_from_parent = delta;
                rotation = delta * rotation;
            }
            None => {
                // Stale parent handle: detach, keep simulating.
                debug!("character {entity} lost its platform parent {parent}");
                body.parent = None;
            }
        }
    }

    // Phase 3: grounding detection.
    processor.update_grounding_up(&mut body, &transform);
    let up = body.grounding_up;
    if body.must_unground {
        body.must_unground = false;
        body.is_grounded = false;
        body.ground_hit = None;
    } else {
        probe_ground::<B, P>(
            world, entity, processor, config, &mut body, &mut position, rotation,
            config.ground_probe_cast_distance(false),
        );
    }

    // Phase 4: velocity control.
    processor.control_velocity(
        world,
        &mut VelocityControlContext {
            entity,
            config,
            body: &mut body,
            intent: &mut intent,
            dt,
        },
    );

    // Phase 5: downslope grounding preservation. A fast character leaving a
    // downward slope sees the base probe miss for one step even though the
    // slope continues below; re-probing with the snap distance suppresses the
    // false ungrounding (and the launch that follows).
    if !body.is_grounded
        && body.was_grounded_before_update
        && !body.must_unground
        && body.relative_velocity.dot(up) <= 1e-3
    {
        let position_before_probe = position;
        probe_ground::<B, P>(
            world, entity, processor, config, &mut body, &mut position, rotation,
            config.ground_probe_cast_distance(true),
        );
        if let Some(hit) = body.ground_hit {
            if slope_angle_towards_direction(body.relative_velocity, hit.normal, up) > 0.0 {
                // The surface below rises against the movement; this is not a
                // downslope continuation, so do not force grounding.
                body.is_grounded = false;
                position = position_before_probe;
            }
        }
    }

    // Phase 6: ground pushing. Standing on a dynamic body must transfer
    // weight, otherwise the character sits on it weightlessly.
    if body.is_grounded {
        if let Some(ground) = body.ground_hit {
            if B::body_kind(world, ground.entity) == Some(BodyKind::Dynamic) {
                let ground_mass = B::body_mass(world, ground.entity).max(1e-4);
                let velocity_change = config.gravity * dt * (config.mass / ground_mass);
                impulses.push(DeferredImpulse::at_point(
                    ground.entity,
                    velocity_change,
                    ground.point,
                ));
            }
        }
    }

    if let Some(ground) = body.ground_hit {
        if body.is_grounded {
            hits.push(ground);
        }
    }

    // Phase 7: movement sweep and decollision.
    sweep_movement::<B, P>(
        world,
        entity,
        processor,
        config,
        &mut body,
        &mut position,
        rotation,
        dt,
        &mut impulses,
        &mut hits,
    );

    // Phase 8: moving-platform detection.
    body.parent = match body.ground_entity() {
        Some(ground) if config.attach_to_moving_platforms => {
            world.get::<TrackedTransform>(ground).map(|_| ground)
        }
        _ => None,
    };

    // Phase 9: parent momentum. Stepping off a platform keeps its velocity.
    if let Some(previous_parent) = parent_before_update {
        if body.parent != Some(previous_parent) {
            if let Some(tracked) = world.get::<TrackedTransform>(previous_parent) {
                body.relative_velocity += tracked.point_velocity(position, dt);
            }
        }
    }

    CharacterStepOutput {
        body,
        intent,
        position,
        rotation,
        impulses,
        hits,
    }
}

/// Cast the grounding probe and update grounded state, snapping the capsule
/// down onto walkable ground.
fn probe_ground<B: KinematicPhysicsBackend, P: CharacterProcessor>(
    world: &World,
    entity: Entity,
    processor: &P,
    config: &CharacterConfig,
    body: &mut CharacterBody,
    position: &mut Vec3,
    rotation: Quat,
    cast_distance: f32,
) {
    let up = body.grounding_up;
    let mut collector = ProcessorFilteredCollector::new(entity, processor);
    let hit = B::cast_capsule(
        world,
        &config.capsule,
        *position,
        rotation,
        -up,
        cast_distance,
        &mut collector,
    );

    match hit {
        Some(candidate) => {
            let walkable = processor.is_grounded_on_hit(config, body, &candidate);
            let mut record = candidate.to_character_hit();
            record.is_walkable = walkable;
            body.ground_hit = Some(record);
            body.is_grounded = walkable;
            // Snap down to the surface (keeping the skin gap), but never
            // while the body moves away from it, so launches and jumps are
            // not glued back.
            if walkable && body.relative_velocity.dot(up) <= 1e-3 {
                *position -= up * (candidate.distance - config.skin_width).max(0.0);
            }
        }
        None => {
            body.is_grounded = false;
            body.ground_hit = None;
        }
    }
}

/// Iteratively sweep the capsule along `velocity * dt`, sliding along
/// obstacles, stepping up low ledges and queueing pushes against dynamic
/// bodies. Ends with the combined velocity projection.
#[allow(clippy::too_many_arguments)]
fn sweep_movement<B: KinematicPhysicsBackend, P: CharacterProcessor>(
    world: &World,
    entity: Entity,
    processor: &P,
    config: &CharacterConfig,
    body: &mut CharacterBody,
    position: &mut Vec3,
    rotation: Quat,
    dt: f32,
    impulses: &mut Vec<DeferredImpulse>,
    hits: &mut Vec<CharacterHit>,
) {
    let mut remaining = body.relative_velocity * dt;
    let mut projection_hits: Vec<CharacterHit> = Vec::new();
    let mut iterations_left = config.max_sweep_iterations;

    while remaining.length() > MIN_MOVEMENT {
        if iterations_left == 0 {
            debug!(
                "character {entity} exceeded {} sweep iterations; truncating movement",
                config.max_sweep_iterations
            );
            break;
        }
        iterations_left -= 1;

        let distance = remaining.length();
        let direction = remaining / distance;

        let mut collector = ProcessorFilteredCollector::new(entity, processor);
        let hit = B::cast_capsule(
            world,
            &config.capsule,
            *position,
            rotation,
            direction,
            distance + config.skin_width,
            &mut collector,
        );

        let Some(hit) = hit else {
            *position += remaining;
            break;
        };

        if hit.distance <= 0.0 {
            // Started the cast overlapping: decollide along the surface
            // normal and retry with the same remaining movement.
            *position += hit.normal * config.skin_width;
            continue;
        }

        let advance = (hit.distance - config.skin_width).clamp(0.0, distance);
        *position += direction * advance;
        remaining -= direction * advance;

        let walkable = processor.is_grounded_on_hit(config, body, &hit);
        let mut record = hit.to_character_hit();
        record.is_walkable = walkable;

        // Concave-corner fallback: two near-opposite surfaces in one step
        // mean the character is wedged.
        if let Some(previous) = projection_hits.last() {
            if previous.normal.dot(hit.normal) < CONCAVE_NORMAL_DOT {
                projection_hits.push(record);
                hits.push(record);
                break;
            }
        }
        projection_hits.push(record);
        hits.push(record);

        // Pushing a dynamic body transfers the blocked momentum.
        if B::body_kind(world, hit.entity) == Some(BodyKind::Dynamic) {
            let into_surface = -body.relative_velocity.dot(hit.normal);
            if into_surface > 0.0 {
                let other_mass = B::body_mass(world, hit.entity).max(1e-4);
                let mass_ratio = config.mass / (config.mass + other_mass);
                impulses.push(DeferredImpulse::at_point(
                    hit.entity,
                    -hit.normal * into_surface * mass_ratio,
                    hit.point,
                ));
            }
        }

        processor.on_movement_hit::<B>(
            world,
            &mut MovementHitContext {
                entity,
                config,
                body,
                position,
                rotation,
                remaining_movement: &mut remaining,
                hit,
                hit_is_walkable: walkable,
            },
        );
    }

    processor.project_velocity_on_hits(
        &mut body.relative_velocity,
        body.is_grounded,
        body.grounding_up,
        &projection_hits,
    );
}

/// The per-fixed-step driver: runs the pipeline for every character, then
/// queues impulses and hit events.
///
/// Characters are simulated against a read-only world snapshot and written
/// back afterwards, so no character observes another's mid-step state and
/// iteration order cannot change any individual result.
pub fn update_characters<B: KinematicPhysicsBackend, P: CharacterProcessor>(world: &mut World) {
    let dt = B::fixed_timestep(world);
    if dt <= 0.0 {
        return;
    }

    let characters: Vec<(Entity, P, CharacterConfig, CharacterBody, CharacterIntent, Transform)> =
        world
            .query::<(
                Entity,
                &P,
                &CharacterConfig,
                &CharacterBody,
                &CharacterIntent,
                &Transform,
            )>()
            .iter(world)
            .map(|(entity, processor, config, body, intent, transform)| {
                (
                    entity,
                    processor.clone(),
                    config.clone(),
                    body.clone(),
                    *intent,
                    *transform,
                )
            })
            .collect();

    let outputs: Vec<(Entity, CharacterStepOutput)> = {
        let world: &World = world;
        characters
            .into_iter()
            .map(|(entity, processor, config, body, intent, transform)| {
                let output = simulate_character_step::<B, P>(
                    world, entity, &processor, &config, body, intent, transform, dt,
                );
                (entity, output)
            })
            .collect()
    };

    for (entity, output) in outputs {
        if let Some(mut transform) = world.get_mut::<Transform>(entity) {
            transform.translation = output.position;
            transform.rotation = output.rotation;
        }
        if let Some(mut body) = world.get_mut::<CharacterBody>(entity) {
            *body = output.body;
        }
        if let Some(mut intent) = world.get_mut::<CharacterIntent>(entity) {
            *intent = output.intent;
        }
        if !output.impulses.is_empty() {
            if let Some(mut queue) = world.get_resource_mut::<DeferredImpulseQueue>() {
                for impulse in output.impulses {
                    queue.push(impulse);
                }
            }
        }

        // Phase 10: stateful hit bookkeeping.
        let events = world
            .get_mut::<HitEventTracker>(entity)
            .map(|mut tracker| tracker.update(entity, &output.hits));
        if let Some(events) = events {
            for event in events {
                world.send_event(event);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn standard_jump_ungrounds_before_adding_velocity() {
        let mut body = CharacterBody::default();
        body.is_grounded = true;
        body.ground_hit = Some(CharacterHit::new(
            Entity::from_raw(2),
            Vec3::Y,
            Vec3::ZERO,
            0.0,
        ));
        body.relative_velocity = Vec3::new(3.0, -6.0, 0.0);

        standard_jump(&mut body, Vec3::Y * 10.0, true);

        assert!(!body.is_grounded);
        assert!(body.ground_hit.is_none());
        // Falling speed cancelled, jump speed added exactly.
        assert_relative_eq!(body.relative_velocity.y, 10.0, epsilon = 1e-6);
        assert_relative_eq!(body.relative_velocity.x, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn standard_jump_without_cancel_keeps_existing_component() {
        let mut body = CharacterBody::default();
        body.relative_velocity = Vec3::new(0.0, 4.0, 0.0);

        standard_jump(&mut body, Vec3::Y * 10.0, false);
        assert_relative_eq!(body.relative_velocity.y, 14.0, epsilon = 1e-6);
    }

    #[test]
    fn ground_move_approaches_target_exponentially() {
        // GroundMaxSpeed 10, sharpness 15, dt 0.1 repeated: monotone approach,
        // within 1% after a handful of steps.
        let mut velocity = Vec3::ZERO;
        let mut previous_speed = 0.0;
        for _ in 0..10 {
            velocity = default_ground_move(velocity, Vec3::X, Vec3::Y, Vec3::Y, 10.0, 15.0, 0.1);
            assert!(velocity.x > previous_speed, "approach must be monotonic");
            previous_speed = velocity.x;
        }
        assert!((velocity.x - 10.0).abs() < 0.1, "within 1% of target");
        // After ~0.3s (3 steps) the approach is already nearly complete.
        let mut v3 = Vec3::ZERO;
        for _ in 0..3 {
            v3 = default_ground_move(v3, Vec3::X, Vec3::Y, Vec3::Y, 10.0, 15.0, 0.1);
        }
        assert!(v3.x > 9.8);
    }

    #[test]
    fn ground_move_on_slope_keeps_speed_in_plane() {
        let slope_normal = Vec3::new(-1.0, 2.0, 0.0).normalize();
        let velocity =
            default_ground_move(Vec3::ZERO, Vec3::X, slope_normal, Vec3::Y, 10.0, f32::INFINITY, 0.1);
        assert_relative_eq!(velocity.length(), 10.0, epsilon = 1e-3);
        assert_relative_eq!(velocity.dot(slope_normal), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn air_move_applies_gravity() {
        let config = CharacterConfig::default();
        let velocity = default_air_move(Vec3::ZERO, Vec3::ZERO, Vec3::Y, &config, 0.1);
        assert_relative_eq!(velocity.y, config.gravity.y * 0.1, epsilon = 1e-5);
    }

    #[test]
    fn air_move_respects_planar_speed_cap() {
        let config = CharacterConfig {
            air_max_speed: 5.0,
            air_acceleration: 1000.0,
            gravity: Vec3::ZERO,
            ..CharacterConfig::default()
        };
        let mut velocity = Vec3::ZERO;
        for _ in 0..20 {
            velocity = default_air_move(velocity, Vec3::X, Vec3::Y, &config, 0.1);
        }
        assert!(project_on_plane(velocity, Vec3::Y).length() <= 5.0 + 1e-3);
    }

    #[test]
    fn velocity_projection_removes_wall_component() {
        let mut velocity = Vec3::new(5.0, 0.0, 2.0);
        let wall = CharacterHit::new(Entity::from_raw(1), Vec3::NEG_X, Vec3::ZERO, 0.0);
        default_velocity_projection(&mut velocity, false, Vec3::Y, &[wall]);
        assert_relative_eq!(velocity.x, 0.0, epsilon = 1e-6);
        assert_relative_eq!(velocity.z, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn velocity_projection_ignores_receding_surfaces() {
        let mut velocity = Vec3::new(-3.0, 0.0, 0.0);
        let wall = CharacterHit::new(Entity::from_raw(1), Vec3::NEG_X, Vec3::ZERO, 0.0);
        default_velocity_projection(&mut velocity, false, Vec3::Y, &[wall]);
        assert_eq!(velocity, Vec3::new(-3.0, 0.0, 0.0));
    }

    #[test]
    fn velocity_projection_crease_slides_along_seam() {
        // Two walls forming a corridor corner along Y.
        let mut velocity = Vec3::new(2.0, -1.0, 2.0);
        let wall_a = CharacterHit::new(Entity::from_raw(1), Vec3::NEG_X, Vec3::ZERO, 0.0);
        let wall_b = CharacterHit::new(Entity::from_raw(2), Vec3::NEG_Z, Vec3::ZERO, 0.0);
        default_velocity_projection(&mut velocity, false, Vec3::Y, &[wall_a, wall_b]);
        // Only the component along the crease (the Y axis) survives.
        assert_relative_eq!(velocity.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(velocity.z, 0.0, epsilon = 1e-5);
        assert_relative_eq!(velocity.y, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn velocity_projection_grounded_keeps_speed_on_walkable_ground() {
        let mut velocity = Vec3::new(8.0, -2.0, 0.0);
        let mut ground = CharacterHit::new(Entity::from_raw(1), Vec3::Y, Vec3::ZERO, 0.0);
        ground.is_walkable = true;
        let before_planar = project_on_plane(velocity, Vec3::Y).length();
        default_velocity_projection(&mut velocity, true, Vec3::Y, &[ground]);
        assert_relative_eq!(velocity.length(), before_planar, epsilon = 1e-4);
        assert_relative_eq!(velocity.y, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn default_processor_slope_classification() {
        let processor = DefaultProcessor;
        let config = CharacterConfig {
            max_slope_angle: 45.0,
            ..CharacterConfig::default()
        };
        let body = CharacterBody::default();

        let flat = HitCandidate {
            entity: Entity::from_raw(1),
            fraction: 0.0,
            distance: 0.0,
            normal: Vec3::Y,
            point: Vec3::ZERO,
            is_solid: true,
        };
        assert!(processor.is_grounded_on_hit(&config, &body, &flat));

        let steep = HitCandidate {
            normal: Vec3::new(1.0, 0.3, 0.0).normalize(),
            ..flat
        };
        assert!(!processor.is_grounded_on_hit(&config, &body, &steep));
    }
}
