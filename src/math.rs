//! Math and geometry utilities.
//!
//! Pure functions shared by the update pipeline and the orbit camera:
//! plane projection, sharpness-based exponential interpolation, up-priority
//! rotation construction and velocity clamping. All of them guard against
//! degenerate inputs (zero-length vectors, zero or negative delta times) and
//! never produce NaN.

use bevy::prelude::*;

/// Minimum squared length below which a vector is treated as zero.
pub const SQUARED_EPSILON: f32 = 1e-12;

/// Project `vector` onto the plane defined by `plane_normal`.
///
/// `plane_normal` must be unit length. The result loses the component of
/// `vector` along the normal.
#[inline]
pub fn project_on_plane(vector: Vec3, plane_normal: Vec3) -> Vec3 {
    vector - plane_normal * vector.dot(plane_normal)
}

/// Rotate `vector` so that its component along `up` follows `plane_normal`
/// instead, preserving length.
///
/// Used so that accelerating along a slope does not inject vertical energy:
/// the intended flat-ground velocity is tilted onto the slope rather than
/// projected (projection would shorten it).
///
/// Returns `vector` unchanged when either direction is degenerate or the two
/// are antiparallel (no unique rotation exists).
pub fn reorient_on_plane(vector: Vec3, plane_normal: Vec3, up: Vec3) -> Vec3 {
    if vector.length_squared() < SQUARED_EPSILON
        || plane_normal.length_squared() < SQUARED_EPSILON
        || up.length_squared() < SQUARED_EPSILON
    {
        return vector;
    }
    if up.dot(plane_normal) < -1.0 + 1e-6 {
        return vector;
    }
    Quat::from_rotation_arc(up, plane_normal) * vector
}

/// Frame-rate-independent exponential smoothing factor.
///
/// `1 - exp(-sharpness * dt)`: `sharpness = 0` leaves the smoothed value
/// untouched, `sharpness = f32::INFINITY` snaps instantly, and the result is
/// monotonic in `dt`. Negative inputs are treated as zero.
#[inline]
pub fn sharpness_interpolant(sharpness: f32, dt: f32) -> f32 {
    if sharpness <= 0.0 || dt <= 0.0 {
        return 0.0;
    }
    if sharpness.is_infinite() {
        return 1.0;
    }
    1.0 - (-sharpness * dt).exp()
}

/// Move `current` toward `target` with exponential smoothing.
#[inline]
pub fn interpolate_velocity_towards_target(
    current: Vec3,
    target: Vec3,
    sharpness: f32,
    dt: f32,
) -> Vec3 {
    current.lerp(target, sharpness_interpolant(sharpness, dt))
}

/// Build a rotation whose up axis is exactly `up` and whose forward axis is
/// `forward` projected onto the plane of `up`.
///
/// "Up priority" means `up` is honored exactly while `forward` only
/// contributes its planar direction; this is what keeps a character or camera
/// upright on arbitrary gravity directions. Falls back to `Quat::IDENTITY`
/// when the inputs cannot define a frame (degenerate or colinear).
pub fn up_priority_rotation(up: Vec3, forward: Vec3) -> Quat {
    let up = up.normalize_or_zero();
    if up == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let planar_forward = project_on_plane(forward, up).normalize_or_zero();
    if planar_forward == Vec3::ZERO {
        return Quat::IDENTITY;
    }
    let right = planar_forward.cross(up);
    // Bevy convention: local -Z is forward, +Y is up, +X is right.
    Quat::from_mat3(&Mat3::from_cols(right, up, -planar_forward))
}

/// Signed slope angle, in degrees, that a walker moving along `direction`
/// would experience on a surface with `slope_normal`, relative to `up`.
///
/// Returns 0 for flat ground, positive uphill, negative downhill, and ±90 at
/// a vertical wall faced head-on.
pub fn slope_angle_towards_direction(direction: Vec3, slope_normal: Vec3, up: Vec3) -> f32 {
    let planar_direction = project_on_plane(direction, up).normalize_or_zero();
    if planar_direction == Vec3::ZERO {
        return 0.0;
    }
    // Height change per unit of planar travel: the surface tangent `d + h*up`
    // satisfies `normal . (d + h*up) = 0`, so `tan(angle) = rise / run` with
    // the components below. `atan2` keeps vertical walls at exactly +/-90
    // where an asin formulation loses precision near the pole.
    let rise = -planar_direction.dot(slope_normal);
    let run = up.dot(slope_normal);
    rise.atan2(run).to_degrees()
}

/// Clamp `vector` to `max_length`, leaving shorter vectors untouched.
#[inline]
pub fn clamp_to_max_length(vector: Vec3, max_length: f32) -> Vec3 {
    vector.clamp_length_max(max_length.max(0.0))
}

/// Clamp an additive velocity so the combined planar speed respects
/// `max_speed`, without stealing speed the character already legitimately has.
///
/// Two modes:
/// - **Soft** (`hard_clamp = false`): when the combined velocity keeps moving
///   roughly in the direction of the original velocity (positive planar dot),
///   the forward component may stay as high as
///   `max(max_speed, original planar speed)` while the lateral component is
///   clamped to `max_speed`. Momentum from external sources (boost pads,
///   platform throws) survives turning slightly, but lateral drift cannot
///   grow without bound. When the input reverses direction, the combined
///   planar velocity is clamped to the `max_speed` circle.
/// - **Hard** (`hard_clamp = true`): the combined planar speed is clamped to
///   `max_speed` unconditionally.
///
/// The component along `plane_up` is never touched. Returns the adjusted
/// *additive* velocity.
pub fn clamp_additive_velocity_to_max_speed_on_plane(
    additive_velocity: Vec3,
    original_velocity: Vec3,
    max_speed: f32,
    plane_up: Vec3,
    hard_clamp: bool,
) -> Vec3 {
    let max_speed = max_speed.max(0.0);
    let combined = original_velocity + additive_velocity;
    let combined_planar = project_on_plane(combined, plane_up);
    let combined_vertical = combined - combined_planar;

    if combined_planar.length_squared() <= max_speed * max_speed {
        return additive_velocity;
    }

    let clamped_planar = if hard_clamp {
        clamp_to_max_length(combined_planar, max_speed)
    } else {
        let original_planar = project_on_plane(original_velocity, plane_up);
        let original_speed = original_planar.length();
        let forward = original_planar.normalize_or_zero();
        if original_speed > max_speed && combined_planar.dot(forward) > 0.0 {
            // Still moving forward: keep whatever speed was already earned,
            // but cap sideways drift.
            let forward_speed = combined_planar.dot(forward);
            let lateral = combined_planar - forward * forward_speed;
            forward * forward_speed.min(original_speed.max(max_speed))
                + clamp_to_max_length(lateral, max_speed)
        } else {
            clamp_to_max_length(combined_planar, max_speed)
        }
    };

    clamped_planar + combined_vertical - original_velocity
}

/// Linear + spherical blend between two transform samples.
#[inline]
pub fn blend_transforms(
    from_position: Vec3,
    from_rotation: Quat,
    to_position: Vec3,
    to_rotation: Quat,
    alpha: f32,
) -> (Vec3, Quat) {
    let alpha = alpha.clamp(0.0, 1.0);
    (
        from_position.lerp(to_position, alpha),
        from_rotation.slerp(to_rotation, alpha),
    )
}
