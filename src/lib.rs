//! # `bevy_kinematic_character`
//!
//! A 3D kinematic character controller with physics backend abstraction.
//!
//! This crate provides a sweep-and-slide capsule character that:
//! - Moves kinematically: the controller owns the Transform, physics only
//!   answers shape queries
//! - Grounds on walkable slopes with downward snapping and downslope
//!   velocity preservation
//! - Steps up stairs and ledges within a configured height
//! - Rides and inherits momentum from moving platforms
//! - Pushes dynamic bodies through a deferred impulse queue
//! - Interpolates rendered transforms between fixed steps
//! - Drives an obstruction-aware orbit camera
//! - Abstracts the physics backend for easy swapping (Rapier3D included)
//!
//! ## Architecture
//!
//! The whole simulation runs in `FixedUpdate`:
//! 1. Interpolation state is restored so characters simulate from their
//!    fixed-rate transforms, not the rendered blend
//! 2. Tracked platform transforms advance their previous/current pair
//! 3. Each character runs the movement pipeline against a read-only world,
//!    producing a new transform plus queued impulses
//! 4. The impulse queue is drained once, after every character has moved
//! 5. The orbit camera integrates look/zoom intent at the fixed rate
//!
//! `Update` then blends each rendered transform between the last two fixed
//! steps and runs the camera's obstruction pass against the blended target.
//!
//! ## Usage
//!
//! ```rust
//! use bevy::prelude::*;
//! use bevy_kinematic_character::prelude::*;
//!
//! // Components for a standard character
//! let config = CharacterConfig::default();
//! let body = CharacterBody::default();
//! let intent = CharacterIntent::default();
//!
//! // These are spawned together with a Transform and backend collider
//! ```

use bevy::prelude::*;

pub mod backend;
pub mod body;
pub mod camera;
pub mod collector;
pub mod config;
pub mod events;
pub mod impulse;
pub mod intent;
pub mod interpolation;
pub mod math;
pub mod pipeline;

#[cfg(feature = "rapier3d")]
pub mod rapier;

pub mod prelude {
    //! Convenient re-exports for common usage.

    pub use crate::backend::{BodyKind, KinematicPhysicsBackend};
    pub use crate::body::{Airborne, CharacterBody, CharacterHit, Grounded};
    pub use crate::camera::{CameraTarget, OrbitCamera, OrbitCameraConfig};
    pub use crate::collector::{ClosestHitCollector, HitCandidate, HitCollector};
    pub use crate::config::{CapsuleDimensions, CharacterConfig, StepConfig};
    pub use crate::events::{CharacterHitEvent, HitEventKind, HitEventTracker};
    pub use crate::impulse::{DeferredImpulse, DeferredImpulseQueue};
    pub use crate::intent::{CameraIntent, CharacterIntent};
    pub use crate::interpolation::{TrackedTransform, TransformInterpolation};
    pub use crate::pipeline::{CharacterProcessor, DefaultProcessor};
    pub use crate::{KinematicCharacterPlugin, KinematicCharacterSet};

    #[cfg(feature = "rapier3d")]
    pub use crate::rapier::{Rapier3dBackend, Rapier3dCharacterBundle};
}

/// Fixed-step phases of the controller, in execution order.
#[derive(SystemSet, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KinematicCharacterSet {
    /// Restore fixed-rate transforms before simulation.
    Prepare,
    /// Advance tracked platform transform history.
    TrackPlatforms,
    /// The character movement pipeline.
    UpdateCharacters,
    /// Drain the deferred impulse queue.
    ApplyImpulses,
    /// Fixed-rate camera intent integration.
    Camera,
    /// Marker sync and end-of-step interpolation sampling.
    Finalize,
}

/// Main plugin for the character controller.
///
/// Generic over the physics backend `B` and the character processor `P`, the
/// policy hook component that customizes grounding, velocity control and hit
/// response. Both default and custom processors are monomorphized; a world
/// can run one plugin instance per processor type.
///
/// # Examples
///
/// With the Rapier3D backend:
/// ```rust,no_run
/// use bevy::prelude::*;
/// use bevy_rapier3d::prelude::*;
/// use bevy_kinematic_character::prelude::*;
///
/// App::new()
///     .add_plugins(DefaultPlugins)
///     .add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
///     .add_plugins(KinematicCharacterPlugin::<Rapier3dBackend>::default())
///     .run();
/// ```
pub struct KinematicCharacterPlugin<
    B: backend::KinematicPhysicsBackend,
    P: pipeline::CharacterProcessor = pipeline::DefaultProcessor,
> {
    _marker: std::marker::PhantomData<(B, P)>,
}

impl<B: backend::KinematicPhysicsBackend, P: pipeline::CharacterProcessor> Default
    for KinematicCharacterPlugin<B, P>
{
    fn default() -> Self {
        Self {
            _marker: std::marker::PhantomData,
        }
    }
}

impl<B: backend::KinematicPhysicsBackend, P: pipeline::CharacterProcessor> Plugin
    for KinematicCharacterPlugin<B, P>
{
    fn build(&self, app: &mut App) {
        app.register_type::<body::CharacterBody>();
        app.register_type::<body::Grounded>();
        app.register_type::<body::Airborne>();
        app.register_type::<config::CharacterConfig>();
        app.register_type::<intent::CharacterIntent>();
        app.register_type::<intent::CameraIntent>();
        app.register_type::<interpolation::TransformInterpolation>();
        app.register_type::<interpolation::TrackedTransform>();
        app.register_type::<camera::OrbitCamera>();
        app.register_type::<camera::OrbitCameraConfig>();
        app.register_type::<camera::CameraTarget>();

        app.init_resource::<impulse::DeferredImpulseQueue>();
        app.add_event::<events::CharacterHitEvent>();

        app.add_plugins(B::plugin());

        app.configure_sets(
            FixedUpdate,
            (
                KinematicCharacterSet::Prepare,
                KinematicCharacterSet::TrackPlatforms,
                KinematicCharacterSet::UpdateCharacters,
                KinematicCharacterSet::ApplyImpulses,
                KinematicCharacterSet::Camera,
                KinematicCharacterSet::Finalize,
            )
                .chain(),
        );

        app.add_systems(
            FixedUpdate,
            (
                interpolation::begin_fixed_step_interpolation
                    .in_set(KinematicCharacterSet::Prepare),
                interpolation::update_tracked_transforms
                    .in_set(KinematicCharacterSet::TrackPlatforms),
                pipeline::update_characters::<B, P>.in_set(KinematicCharacterSet::UpdateCharacters),
                impulse::apply_deferred_impulses::<B>.in_set(KinematicCharacterSet::ApplyImpulses),
                camera::orbit_camera_simulation_pass.in_set(KinematicCharacterSet::Camera),
                (
                    body::sync_state_markers,
                    interpolation::end_fixed_step_interpolation,
                )
                    .in_set(KinematicCharacterSet::Finalize),
            ),
        );

        // Render-rate pass: blend transforms first, then place the camera
        // against the blended target.
        app.add_systems(
            Update,
            (
                interpolation::interpolate_rendered_transforms,
                camera::orbit_camera_late_pass::<B>,
            )
                .chain(),
        );
    }
}
