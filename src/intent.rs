//! Per-step control intent.
//!
//! [`CharacterIntent`] is plain data set by the host (player input, AI,
//! network commands) and consumed by the update pipeline and the orbit
//! camera. The controller never reads input devices itself.

use bevy::prelude::*;

/// Control intent for one character, refreshed by the host every step.
///
/// `move_direction` is expressed in world space and already camera-relative
/// if the host wants camera-relative controls; the pipeline only clamps its
/// length to 1.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct CharacterIntent {
    /// Desired planar movement direction, world space, length <= 1.
    pub move_direction: Vec3,
    /// Whether a jump is requested this step. Cleared by the pipeline once
    /// consumed.
    pub jump_requested: bool,
}

impl CharacterIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the movement direction, clamping its length to 1.
    pub fn set_move(&mut self, direction: Vec3) {
        self.move_direction = direction.clamp_length_max(1.0);
    }

    /// Request a jump for the next fixed step.
    pub fn request_jump(&mut self) {
        self.jump_requested = true;
    }

    /// Whether there is active movement input.
    pub fn is_moving(&self) -> bool {
        self.move_direction.length_squared() > 1e-6
    }
}

/// Control intent for an orbit camera, refreshed by the host every frame.
#[derive(Component, Reflect, Debug, Clone, Copy, Default)]
#[reflect(Component)]
pub struct CameraIntent {
    /// Yaw/pitch input, in input units (scaled by the camera's rotation
    /// speed). X is yaw, Y is pitch.
    pub look: Vec2,
    /// Zoom input. Positive zooms out.
    pub zoom: f32,
}

impl CameraIntent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.look = Vec2::ZERO;
        self.zoom = 0.0;
    }
}
