//! Fixed-step / render-step transform decoupling.
//!
//! The simulation advances `Transform` at the fixed tick rate; rendering
//! samples at whatever rate the frame runs at. [`TransformInterpolation`]
//! keeps the previous and current fixed-rate samples and blends between them
//! each render frame, so characters move smoothly even at low tick rates.
//!
//! [`TrackedTransform`] does the inverse job for external bodies: it records
//! per-step transform pairs so that the motion of a rigidly-attached point
//! can be reconstructed as a displacement or velocity. Moving platforms carry
//! one; the pipeline uses it for parenting and momentum transfer.

use bevy::prelude::*;

use crate::math::blend_transforms;

/// Interpolation state for one simulated entity.
///
/// The entity's `Transform` is authoritative inside `FixedUpdate` and
/// becomes a render-facing blend outside of it:
///
/// 1. At the start of each fixed step the previous blend is undone
///    (`Transform = current`) and `from` is re-sampled.
/// 2. The pipeline mutates `Transform` freely.
/// 3. At the end of the fixed step `current` is re-sampled.
/// 4. Each render frame `Transform = blend(from, current, alpha)` with
///    `alpha` the fixed-step overstep fraction.
///
/// The skip flags force a hard snap for one fixed-step interval (teleports,
/// spawns) and clear themselves.
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct TransformInterpolation {
    /// Sample from the previous fixed step.
    pub from_position: Vec3,
    pub from_rotation: Quat,
    /// Sample from the latest fixed step.
    pub current_position: Vec3,
    pub current_rotation: Quat,
    /// Snap position instead of blending on the next sample.
    pub skip_position: bool,
    /// Snap rotation instead of blending on the next sample.
    pub skip_rotation: bool,
    initialized: bool,
}

impl Default for TransformInterpolation {
    fn default() -> Self {
        Self {
            from_position: Vec3::ZERO,
            from_rotation: Quat::IDENTITY,
            current_position: Vec3::ZERO,
            current_rotation: Quat::IDENTITY,
            skip_position: false,
            skip_rotation: false,
            initialized: false,
        }
    }
}

impl TransformInterpolation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snap position on the next render sample instead of blending.
    pub fn skip_next_position_interpolation(&mut self) {
        self.skip_position = true;
    }

    /// Snap rotation on the next render sample instead of blending.
    pub fn skip_next_rotation_interpolation(&mut self) {
        self.skip_rotation = true;
    }

    /// Compute the rendered transform for `alpha` in [0, 1], consuming the
    /// skip flags. A consumed skip also collapses `from` onto `current` so
    /// later samples within the same fixed-step interval stay snapped.
    pub fn sample(&mut self, alpha: f32) -> (Vec3, Quat) {
        if self.skip_position {
            self.from_position = self.current_position;
            self.skip_position = false;
        }
        if self.skip_rotation {
            self.from_rotation = self.current_rotation;
            self.skip_rotation = false;
        }
        blend_transforms(
            self.from_position,
            self.from_rotation,
            self.current_position,
            self.current_rotation,
            alpha,
        )
    }
}

/// Fixed-rate transform history for an external rigid body.
///
/// Updated once per fixed step *before* any consumer reads it. Host code
/// adds this component to moving platforms (and to any visual-only mover
/// whose motion should become a velocity).
#[derive(Component, Reflect, Debug, Clone)]
#[reflect(Component)]
pub struct TrackedTransform {
    pub current_position: Vec3,
    pub current_rotation: Quat,
    pub previous_position: Vec3,
    pub previous_rotation: Quat,
}

impl TrackedTransform {
    /// Start tracking from an initial transform, with zero implied motion.
    pub fn from_transform(transform: &Transform) -> Self {
        Self {
            current_position: transform.translation,
            current_rotation: transform.rotation,
            previous_position: transform.translation,
            previous_rotation: transform.rotation,
        }
    }

    /// Push a new fixed-rate sample.
    pub fn advance(&mut self, position: Vec3, rotation: Quat) {
        self.previous_position = self.current_position;
        self.previous_rotation = self.current_rotation;
        self.current_position = position;
        self.current_rotation = rotation;
    }

    /// Rotation applied between the previous and current samples.
    pub fn rotation_delta(&self) -> Quat {
        self.current_rotation * self.previous_rotation.inverse()
    }

    /// Displacement a point rigidly attached to this body underwent between
    /// the previous and current samples.
    ///
    /// The point is mapped into the previous sample's local space and back
    /// out through the current sample's transform.
    pub fn point_displacement(&self, point: Vec3) -> Vec3 {
        let local = self.previous_rotation.inverse() * (point - self.previous_position);
        let moved = self.current_rotation * local + self.current_position;
        moved - point
    }

    /// Velocity equivalent of [`point_displacement`](Self::point_displacement)
    /// over `dt`. Zero when `dt` is not positive.
    pub fn point_velocity(&self, point: Vec3, dt: f32) -> Vec3 {
        if dt <= 0.0 {
            return Vec3::ZERO;
        }
        self.point_displacement(point) / dt
    }
}

/// Refresh [`TrackedTransform`] samples. Runs first in the fixed step so
/// every consumer sees this step's motion.
pub fn update_tracked_transforms(mut q_tracked: Query<(&Transform, &mut TrackedTransform)>) {
    for (transform, mut tracked) in &mut q_tracked {
        tracked.advance(transform.translation, transform.rotation);
    }
}

/// Restore authoritative transforms and re-sample `from` at the start of the
/// fixed step, undoing the previous render blend.
pub fn begin_fixed_step_interpolation(
    mut q_interpolated: Query<(&mut Transform, &mut TransformInterpolation)>,
) {
    for (mut transform, mut interpolation) in &mut q_interpolated {
        if interpolation.initialized {
            transform.translation = interpolation.current_position;
            transform.rotation = interpolation.current_rotation;
        } else {
            interpolation.current_position = transform.translation;
            interpolation.current_rotation = transform.rotation;
            interpolation.initialized = true;
        }
        interpolation.from_position = interpolation.current_position;
        interpolation.from_rotation = interpolation.current_rotation;
    }
}

/// Capture the post-simulation transform at the end of the fixed step.
pub fn end_fixed_step_interpolation(
    mut q_interpolated: Query<(&Transform, &mut TransformInterpolation)>,
) {
    for (transform, mut interpolation) in &mut q_interpolated {
        interpolation.current_position = transform.translation;
        interpolation.current_rotation = transform.rotation;
    }
}

/// Blend rendered transforms between the two fixed-rate samples.
pub fn interpolate_rendered_transforms(
    fixed_time: Res<Time<Fixed>>,
    mut q_interpolated: Query<(&mut Transform, &mut TransformInterpolation)>,
) {
    let alpha = fixed_time.overstep_fraction().clamp(0.0, 1.0);
    for (mut transform, mut interpolation) in &mut q_interpolated {
        if !interpolation.initialized {
            continue;
        }
        let (position, rotation) = interpolation.sample(alpha);
        transform.translation = position;
        transform.rotation = rotation;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sample_blends_between_fixed_samples() {
        let mut interpolation = TransformInterpolation {
            from_position: Vec3::ZERO,
            current_position: Vec3::new(2.0, 0.0, 0.0),
            initialized: true,
            ..Default::default()
        };
        let (position, _) = interpolation.sample(0.5);
        assert_eq!(position, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn skip_position_snaps_once_then_clears() {
        let mut interpolation = TransformInterpolation {
            from_position: Vec3::ZERO,
            current_position: Vec3::new(10.0, 0.0, 0.0),
            initialized: true,
            ..Default::default()
        };
        interpolation.skip_next_position_interpolation();

        // Any alpha returns the current position exactly.
        let (position, _) = interpolation.sample(0.25);
        assert_eq!(position, Vec3::new(10.0, 0.0, 0.0));
        assert!(!interpolation.skip_position);

        // Later samples in the same interval stay snapped (from collapsed).
        let (position, _) = interpolation.sample(0.1);
        assert_eq!(position, Vec3::new(10.0, 0.0, 0.0));
    }

    #[test]
    fn skip_rotation_snaps_once_then_clears() {
        let target = Quat::from_rotation_y(1.2);
        let mut interpolation = TransformInterpolation {
            current_rotation: target,
            initialized: true,
            ..Default::default()
        };
        interpolation.skip_next_rotation_interpolation();

        let (_, rotation) = interpolation.sample(0.0);
        assert_relative_eq!(rotation.angle_between(target), 0.0, epsilon = 1e-6);
        assert!(!interpolation.skip_rotation);
    }

    #[test]
    fn point_displacement_pure_translation() {
        let mut tracked = TrackedTransform::from_transform(&Transform::IDENTITY);
        tracked.advance(Vec3::new(3.0, 0.0, 0.0), Quat::IDENTITY);

        let displacement = tracked.point_displacement(Vec3::new(1.0, 2.0, 0.0));
        assert_eq!(displacement, Vec3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn point_displacement_rotation_about_origin() {
        let mut tracked = TrackedTransform::from_transform(&Transform::IDENTITY);
        tracked.advance(Vec3::ZERO, Quat::from_rotation_y(std::f32::consts::FRAC_PI_2));

        // A point at +X swings to -Z under a +90 degree yaw.
        let displacement = tracked.point_displacement(Vec3::X);
        let expected = Vec3::new(-1.0, 0.0, -1.0);
        assert_relative_eq!(displacement.distance(expected), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn point_velocity_is_displacement_over_dt() {
        let mut tracked = TrackedTransform::from_transform(&Transform::IDENTITY);
        tracked.advance(Vec3::new(0.5, 0.0, 0.0), Quat::IDENTITY);

        let velocity = tracked.point_velocity(Vec3::ZERO, 0.25);
        assert_eq!(velocity, Vec3::new(2.0, 0.0, 0.0));
        // Guarded division.
        assert_eq!(tracked.point_velocity(Vec3::ZERO, 0.0), Vec3::ZERO);
    }

    #[test]
    fn rotation_delta_between_samples() {
        let mut tracked = TrackedTransform::from_transform(&Transform::IDENTITY);
        let turn = Quat::from_rotation_y(0.3);
        tracked.advance(Vec3::ZERO, turn);
        assert_relative_eq!(tracked.rotation_delta().angle_between(turn), 0.0, epsilon = 1e-6);
    }
}
