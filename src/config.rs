//! Character tuning parameters.
//!
//! [`CharacterConfig`] gathers the shape, grounding, sweep and movement
//! tuning for one character. All probe lengths are derived from the capsule
//! dimensions and the explicit distances below; there are no hidden magic
//! numbers in the pipeline.

use bevy::prelude::*;

/// Capsule dimensions used for world queries.
///
/// The capsule axis is the character's local up. `half_height` measures the
/// segment half-length, so the full capsule height is
/// `2.0 * (half_height + radius)`.
#[derive(Reflect, Debug, Clone, Copy, PartialEq)]
pub struct CapsuleDimensions {
    pub radius: f32,
    pub half_height: f32,
}

impl Default for CapsuleDimensions {
    fn default() -> Self {
        Self {
            radius: 0.3,
            half_height: 0.55,
        }
    }
}

impl CapsuleDimensions {
    /// Distance from the capsule center to its lowest point.
    #[inline]
    pub fn bottom_offset(&self) -> f32 {
        self.half_height + self.radius
    }
}

/// Step handling parameters.
#[derive(Reflect, Debug, Clone, Copy)]
pub struct StepConfig {
    /// Whether step-up handling is enabled at all.
    pub enabled: bool,
    /// Maximum obstacle height treated as a step instead of a wall.
    pub max_step_height: f32,
    /// Forward clearance that must be free above the step for the step-up to
    /// be accepted. Prevents stepping onto ledges narrower than the character.
    pub required_width: f32,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_step_height: 0.35,
            required_width: 0.1,
        }
    }
}

/// Full tuning for one character.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct CharacterConfig {
    /// Capsule used for all world queries.
    pub capsule: CapsuleDimensions,

    // === Grounding ===
    /// Maximum walkable slope angle, in degrees.
    pub max_slope_angle: f32,
    /// Probe distance below the capsule base for grounding detection.
    pub ground_probe_distance: f32,
    /// Extra downward snap distance used to keep fast characters glued to
    /// downward slopes (phase 5 of the update).
    pub ground_snap_distance: f32,

    // === Sweep ===
    /// Tolerance gap kept between the capsule and any surface.
    pub skin_width: f32,
    /// Upper bound on sweep-and-slide iterations per step. Exceeding it
    /// truncates the remaining movement for that step only.
    pub max_sweep_iterations: u32,
    /// Step handling.
    pub step: StepConfig,

    // === Ground movement ===
    /// Target planar speed while grounded.
    pub ground_max_speed: f32,
    /// Exponential sharpness of grounded velocity control.
    pub ground_movement_sharpness: f32,

    // === Air movement ===
    /// Planar speed cap for air control input.
    pub air_max_speed: f32,
    /// Acceleration applied by air control input.
    pub air_acceleration: f32,
    /// Exponential drag applied while airborne.
    pub air_drag: f32,
    /// Gravity applied while airborne, world space.
    pub gravity: Vec3,

    // === Jump ===
    /// Upward speed added along `grounding_up` when jumping.
    pub jump_speed: f32,
    /// Cancel pre-existing velocity along the jump axis before jumping, so a
    /// jump out of a fall always reaches full height.
    pub cancel_velocity_before_jump: bool,

    // === Interaction ===
    /// Whether the character can attach to moving platforms.
    pub attach_to_moving_platforms: bool,
    /// Mass used when pushing dynamic bodies.
    pub mass: f32,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            capsule: CapsuleDimensions::default(),
            max_slope_angle: 55.0,
            ground_probe_distance: 0.1,
            ground_snap_distance: 0.3,
            skin_width: 0.02,
            max_sweep_iterations: 8,
            step: StepConfig::default(),
            ground_max_speed: 10.0,
            ground_movement_sharpness: 15.0,
            air_max_speed: 10.0,
            air_acceleration: 50.0,
            air_drag: 0.0,
            gravity: Vec3::new(0.0, -30.0, 0.0),
            jump_speed: 10.0,
            cancel_velocity_before_jump: true,
            attach_to_moving_platforms: true,
            mass: 1.0,
        }
    }
}

impl CharacterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snappier preset for fast player characters.
    pub fn agile() -> Self {
        Self {
            ground_max_speed: 14.0,
            ground_movement_sharpness: 25.0,
            air_acceleration: 80.0,
            jump_speed: 12.0,
            ..Self::default()
        }
    }

    /// Cosine of the maximum walkable slope angle. Surfaces whose normal dot
    /// `grounding_up` is at or above this value are walkable.
    #[inline]
    pub fn min_walkable_normal_dot(&self) -> f32 {
        self.max_slope_angle.to_radians().cos()
    }

    /// Cast distance for the grounding probe. The capsule shape itself covers
    /// the body extent, so this is the travel below the current pose,
    /// extended by the snap distance while grounded so downslopes stay
    /// sticky.
    pub fn ground_probe_cast_distance(&self, currently_grounded: bool) -> f32 {
        if currently_grounded {
            self.ground_probe_distance + self.ground_snap_distance
        } else {
            self.ground_probe_distance
        }
    }
}
