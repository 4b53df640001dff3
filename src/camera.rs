//! Orbit camera simulation.
//!
//! The camera runs in two passes to stay jitter-free:
//!
//! - a **simulation pass** once per fixed step, after the character updates,
//!   integrating yaw/pitch/zoom intent against the character's
//!   simulation-rate grounding state;
//! - a **late pass** once per render frame, after transform interpolation,
//!   applying distance smoothing and the obstruction sphere-cast against the
//!   *interpolated* target transform. Obstruction checks against the raw
//!   fixed-rate transform would inherit its stair-stepping and jitter.
//!
//! Obstruction distance moves asymmetrically: pulled inward when geometry
//! interposes (a snap by default) and relaxing outward at a configurable
//! rate when the obstruction clears. Whatever the smoothing state says, the
//! placed camera is clamped to the current cast hit, so it never ends up
//! inside a wall.

use bevy::prelude::*;

use crate::backend::KinematicPhysicsBackend;
use crate::body::CharacterBody;
use crate::collector::CameraObstructionCollector;
use crate::intent::CameraIntent;
use crate::math::{project_on_plane, sharpness_interpolant, up_priority_rotation};

/// Redirects a camera following this character to another entity's transform
/// (a head bone proxy, a vehicle seat). Without it the camera follows the
/// character's own transform.
#[derive(Component, Reflect, Debug, Clone, Copy)]
#[reflect(Component)]
pub struct CameraTarget(pub Entity);

/// Orbit camera tuning.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct OrbitCameraConfig {
    /// Degrees of yaw/pitch per input unit.
    pub rotation_speed: f32,
    /// Pitch bounds, degrees.
    pub min_pitch_angle: f32,
    pub max_pitch_angle: f32,
    /// Distance bounds.
    pub min_distance: f32,
    pub max_distance: f32,
    /// Distance change per zoom input unit.
    pub zoom_speed: f32,
    /// Sharpness of the smoothed approach toward the target distance.
    pub distance_movement_sharpness: f32,
    /// Radius of the obstruction sphere-cast.
    pub obstruction_radius: f32,
    /// Sharpness when an obstruction pushes the camera inward. Infinite by
    /// default, which snaps. Finite values smooth the stored distance; the
    /// placed camera is still clamped to the obstruction each frame, so it
    /// never ends up inside geometry.
    pub obstruction_inner_smoothing_sharpness: f32,
    /// Sharpness when the camera relaxes back outward.
    pub obstruction_outer_smoothing_sharpness: f32,
    /// Seconds to blend when the followed target entity changes. Zero snaps.
    pub target_transition_time: f32,
}

impl Default for OrbitCameraConfig {
    fn default() -> Self {
        Self {
            rotation_speed: 150.0,
            min_pitch_angle: -85.0,
            max_pitch_angle: 85.0,
            min_distance: 1.0,
            max_distance: 10.0,
            zoom_speed: 1.0,
            distance_movement_sharpness: 10.0,
            obstruction_radius: 0.2,
            obstruction_inner_smoothing_sharpness: f32::INFINITY,
            obstruction_outer_smoothing_sharpness: 5.0,
            target_transition_time: 0.25,
        }
    }
}

/// Orbit camera state.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct OrbitCamera {
    /// Character this camera follows. `None` parks the camera.
    pub followed_character: Option<Entity>,
    /// Yaw-only facing direction. Unit length, perpendicular to the followed
    /// character's up.
    pub planar_forward: Vec3,
    /// Pitch in degrees, clamped to the configured bounds.
    pub pitch_angle: f32,
    /// Zoom-controlled distance intent.
    pub target_distance: f32,
    /// Exponential approach of `target_distance`.
    pub smoothed_target_distance: f32,
    /// Smoothed obstruction distance. The placed camera additionally clamps
    /// this against the current cast hit.
    pub obstructed_distance: f32,
    /// Entities that must never obstruct (the character itself is always
    /// excluded automatically).
    pub ignored_entities: Vec<Entity>,
    /// Resolved look-at target of the previous frame.
    pub previous_target: Option<Entity>,
    active_target: Option<Entity>,
    transition_start: f32,
    transition_from_position: Vec3,
    last_target_position: Vec3,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            followed_character: None,
            planar_forward: Vec3::NEG_Z,
            pitch_angle: 0.0,
            target_distance: 5.0,
            smoothed_target_distance: 5.0,
            obstructed_distance: 5.0,
            ignored_entities: Vec::new(),
            previous_target: None,
            active_target: None,
            transition_start: 0.0,
            transition_from_position: Vec3::ZERO,
            last_target_position: Vec3::ZERO,
        }
    }
}

impl OrbitCamera {
    pub fn following(character: Entity) -> Self {
        Self {
            followed_character: Some(character),
            ..Self::default()
        }
    }

    /// Current world rotation: up-priority yaw composed with pitch around
    /// local right.
    pub fn rotation(&self, up: Vec3) -> Quat {
        up_priority_rotation(up, self.planar_forward)
            * Quat::from_rotation_x(self.pitch_angle.to_radians())
    }
}

/// Advance yaw/pitch/zoom intent. Pure so both the fixed pass and tests can
/// drive it.
pub fn integrate_camera_intent(
    camera: &mut OrbitCamera,
    config: &OrbitCameraConfig,
    intent: &CameraIntent,
    up: Vec3,
) {
    let yaw = (intent.look.x * config.rotation_speed).to_radians();
    camera.planar_forward = Quat::from_axis_angle(up, yaw) * camera.planar_forward;
    // Re-project so the invariant (unit, perpendicular to up) survives up
    // changes from variable gravity.
    let projected = project_on_plane(camera.planar_forward, up).normalize_or_zero();
    if projected != Vec3::ZERO {
        camera.planar_forward = projected;
    }

    camera.pitch_angle = (camera.pitch_angle + intent.look.y * config.rotation_speed)
        .clamp(config.min_pitch_angle, config.max_pitch_angle);

    camera.target_distance = (camera.target_distance + intent.zoom * config.zoom_speed)
        .clamp(config.min_distance, config.max_distance);
}

/// Move the obstructed distance toward `new_distance`, inner sharpness when
/// closing in, outer sharpness when relaxing out.
///
/// Infinite sharpness snaps regardless of `dt`. This is only the smoothed
/// state; the camera placement separately clamps against the current cast so
/// a lagging state cannot put the camera inside geometry.
pub fn smooth_obstructed_distance(
    current: f32,
    new_distance: f32,
    config: &OrbitCameraConfig,
    dt: f32,
) -> f32 {
    let sharpness = if new_distance < current {
        config.obstruction_inner_smoothing_sharpness
    } else {
        config.obstruction_outer_smoothing_sharpness
    };
    if sharpness.is_infinite() {
        return new_distance.max(0.0);
    }
    current + (new_distance - current) * sharpness_interpolant(sharpness, dt)
}

/// Fixed-rate camera pass: integrate look/zoom intent against the followed
/// character's simulation-rate grounding state.
pub fn orbit_camera_simulation_pass(
    mut q_cameras: Query<(&mut OrbitCamera, &OrbitCameraConfig, &mut CameraIntent)>,
    q_bodies: Query<&CharacterBody>,
) {
    for (mut camera, config, mut intent) in &mut q_cameras {
        let Some(character) = camera.followed_character else {
            intent.clear();
            continue;
        };
        let up = q_bodies
            .get(character)
            .map(|body| body.grounding_up)
            .unwrap_or(Vec3::Y);

        integrate_camera_intent(&mut camera, config, &intent, up);
        intent.clear();
    }
}

/// Render-rate camera pass: resolve the interpolated target, smooth the
/// distance, run the obstruction cast and place the camera.
pub fn orbit_camera_late_pass<B: KinematicPhysicsBackend>(world: &mut World) {
    let (now, dt) = {
        let Some(time) = world.get_resource::<Time>() else {
            return;
        };
        (time.elapsed_secs(), time.delta_secs())
    };

    let cameras: Vec<Entity> = world
        .query_filtered::<Entity, (With<OrbitCamera>, With<OrbitCameraConfig>)>()
        .iter(world)
        .collect();

    for camera_entity in cameras {
        let Some(update) = compute_camera_placement::<B>(world, camera_entity, now, dt) else {
            continue;
        };
        let (camera_state, position, rotation) = update;
        if let Some(mut camera) = world.get_mut::<OrbitCamera>(camera_entity) {
            *camera = camera_state;
        }
        if let Some(mut transform) = world.get_mut::<Transform>(camera_entity) {
            transform.translation = position;
            transform.rotation = rotation;
        }
    }
}

/// Compute one camera's placement against a read-only world.
fn compute_camera_placement<B: KinematicPhysicsBackend>(
    world: &World,
    camera_entity: Entity,
    now: f32,
    dt: f32,
) -> Option<(OrbitCamera, Vec3, Quat)> {
    let mut camera = world.get::<OrbitCamera>(camera_entity)?.clone();
    let config = world.get::<OrbitCameraConfig>(camera_entity)?.clone();
    let character = camera.followed_character?;

    // Resolve the look-at target: explicit redirect or the character itself.
    // A stale redirect falls back to the character.
    let resolved_target = world
        .get::<CameraTarget>(character)
        .map(|target| target.0)
        .filter(|&target| world.get_entity(target).is_ok())
        .unwrap_or(character);
    let target_transform = *world.get::<Transform>(resolved_target)?;

    let up = world
        .get::<CharacterBody>(character)
        .map(|body| body.grounding_up)
        .unwrap_or(Vec3::Y);

    // Target change: blend from the previous target's transform instead of
    // snapping.
    if camera.active_target != Some(resolved_target) {
        camera.previous_target = camera.active_target;
        if camera.active_target.is_some() {
            camera.transition_from_position = camera.last_target_position;
            camera.transition_start = now;
        } else {
            // First frame of following: no history to blend from.
            camera.transition_from_position = target_transform.translation;
            camera.transition_start = now - config.target_transition_time;
        }
        camera.active_target = Some(resolved_target);
    }

    let blend = if config.target_transition_time <= 0.0 {
        1.0
    } else {
        ((now - camera.transition_start) / config.target_transition_time).clamp(0.0, 1.0)
    };
    let target_position = camera
        .transition_from_position
        .lerp(target_transform.translation, blend);
    camera.last_target_position = target_position;

    // Distance smoothing.
    camera.smoothed_target_distance += (camera.target_distance - camera.smoothed_target_distance)
        * sharpness_interpolant(config.distance_movement_sharpness, dt);

    // Obstruction: sphere-cast from the target backward along the camera
    // forward for the smoothed distance.
    let rotation = camera.rotation(up);
    let camera_forward = rotation * Vec3::NEG_Z;
    let cast_direction = -camera_forward;

    let mut ignored = camera.ignored_entities.clone();
    ignored.push(character);
    if resolved_target != character {
        ignored.push(resolved_target);
    }
    let mut collector = CameraObstructionCollector::new(cast_direction, &ignored);
    let obstruction = B::cast_sphere(
        world,
        config.obstruction_radius,
        target_position,
        cast_direction,
        camera.smoothed_target_distance,
        &mut collector,
    );

    let unobstructed = camera.smoothed_target_distance;
    let new_distance = obstruction
        .map(|hit| hit.distance.min(unobstructed))
        .unwrap_or(unobstructed);
    camera.obstructed_distance =
        smooth_obstructed_distance(camera.obstructed_distance, new_distance, &config, dt);

    // The smoothed state may lag a sudden obstruction; the placed camera may
    // not.
    let placement_distance = camera.obstructed_distance.min(new_distance);
    let position = target_position - camera_forward * placement_distance;
    Some((camera, position, rotation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn integrate_intent_yaws_around_up() {
        let mut camera = OrbitCamera::default();
        let config = OrbitCameraConfig {
            rotation_speed: 90.0,
            ..Default::default()
        };
        let intent = CameraIntent {
            look: Vec2::new(1.0, 0.0),
            zoom: 0.0,
        };
        integrate_camera_intent(&mut camera, &config, &intent, Vec3::Y);

        // 90 degrees of yaw from -Z about +Y.
        assert_relative_eq!(
            camera.planar_forward.distance(Vec3::NEG_X),
            0.0,
            epsilon = 1e-4
        );
        assert_relative_eq!(camera.planar_forward.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn integrate_intent_clamps_pitch() {
        let mut camera = OrbitCamera::default();
        let config = OrbitCameraConfig {
            rotation_speed: 1000.0,
            min_pitch_angle: -85.0,
            max_pitch_angle: 85.0,
            ..Default::default()
        };
        let up_look = CameraIntent {
            look: Vec2::new(0.0, 1.0),
            zoom: 0.0,
        };
        integrate_camera_intent(&mut camera, &config, &up_look, Vec3::Y);
        assert_eq!(camera.pitch_angle, 85.0);

        let down_look = CameraIntent {
            look: Vec2::new(0.0, -1.0),
            zoom: 0.0,
        };
        integrate_camera_intent(&mut camera, &config, &down_look, Vec3::Y);
        assert_eq!(camera.pitch_angle, -85.0);
    }

    #[test]
    fn integrate_intent_clamps_distance() {
        let mut camera = OrbitCamera::default();
        let config = OrbitCameraConfig {
            min_distance: 2.0,
            max_distance: 8.0,
            zoom_speed: 100.0,
            ..Default::default()
        };
        let zoom_out = CameraIntent {
            look: Vec2::ZERO,
            zoom: 1.0,
        };
        integrate_camera_intent(&mut camera, &config, &zoom_out, Vec3::Y);
        assert_eq!(camera.target_distance, 8.0);

        let zoom_in = CameraIntent {
            look: Vec2::ZERO,
            zoom: -1.0,
        };
        integrate_camera_intent(&mut camera, &config, &zoom_in, Vec3::Y);
        assert_eq!(camera.target_distance, 2.0);
    }

    #[test]
    fn integrate_intent_keeps_forward_planar_under_tilted_up() {
        let mut camera = OrbitCamera::default();
        let config = OrbitCameraConfig::default();
        let intent = CameraIntent {
            look: Vec2::new(0.2, 0.0),
            zoom: 0.0,
        };
        let up = Vec3::new(0.4, 1.0, 0.1).normalize();
        integrate_camera_intent(&mut camera, &config, &intent, up);
        assert_relative_eq!(camera.planar_forward.dot(up), 0.0, epsilon = 1e-5);
        assert_relative_eq!(camera.planar_forward.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn obstruction_snaps_inward_with_infinite_sharpness() {
        let config = OrbitCameraConfig::default();
        // Wall appears at 2.0 while the camera hovered at 6.0.
        assert_eq!(smooth_obstructed_distance(6.0, 2.0, &config, 0.016), 2.0);
        // Infinite sharpness snaps even on a zero-dt frame.
        assert_eq!(smooth_obstructed_distance(6.0, 2.0, &config, 0.0), 2.0);
    }

    #[test]
    fn obstruction_relaxes_outward_gradually() {
        let config = OrbitCameraConfig {
            obstruction_outer_smoothing_sharpness: 5.0,
            ..Default::default()
        };
        // Wall removed: distance grows back toward 6.0 but not instantly.
        let relaxed = smooth_obstructed_distance(2.0, 6.0, &config, 0.016);
        assert!(relaxed > 2.0);
        assert!(relaxed < 6.0);

        // Repeated application converges.
        let mut distance = 2.0;
        for _ in 0..600 {
            distance = smooth_obstructed_distance(distance, 6.0, &config, 0.016);
        }
        assert_relative_eq!(distance, 6.0, epsilon = 1e-2);
    }

    #[test]
    fn finite_inner_sharpness_smooths_the_obstruction_state() {
        let config = OrbitCameraConfig {
            obstruction_inner_smoothing_sharpness: 20.0,
            ..Default::default()
        };
        let smoothed = smooth_obstructed_distance(6.0, 2.0, &config, 0.016);
        assert!(smoothed < 6.0, "state must move toward the obstruction");
        assert!(smoothed > 2.0, "finite sharpness must not snap");

        // Repeated application converges onto the obstruction.
        let mut distance = 6.0;
        for _ in 0..600 {
            distance = smooth_obstructed_distance(distance, 2.0, &config, 0.016);
        }
        assert_relative_eq!(distance, 2.0, epsilon = 1e-2);
    }

    #[test]
    fn camera_rotation_composes_yaw_and_pitch() {
        let camera = OrbitCamera {
            planar_forward: Vec3::NEG_Z,
            pitch_angle: 45.0,
            ..Default::default()
        };
        let rotation = camera.rotation(Vec3::Y);
        let forward = rotation * Vec3::NEG_Z;
        // Positive pitch looks up.
        assert!(forward.y > 0.0);
        assert_relative_eq!(forward.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.y, 45.0_f32.to_radians().sin(), epsilon = 1e-4);
    }
}
