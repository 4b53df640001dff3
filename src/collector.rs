//! Collision query collectors.
//!
//! A collector is the filtering/ranking policy handed to a backend cast: the
//! backend visits every candidate hit and the collector decides which ones
//! count and which single hit is the closest. Collectors are strategy
//! objects, not containers; backends call [`HitCollector::add_hit`] for each
//! candidate and read back [`HitCollector::closest`] afterwards.

use bevy::prelude::*;

use crate::body::CharacterHit;

/// A candidate hit offered to a collector by a backend cast.
#[derive(Debug, Clone, Copy)]
pub struct HitCandidate {
    /// Entity owning the hit surface.
    pub entity: Entity,
    /// Fraction of the cast length at which contact occurs, in [0, 1].
    pub fraction: f32,
    /// Travelled distance before contact.
    pub distance: f32,
    /// Surface normal at the hit point.
    pub normal: Vec3,
    /// World-space hit point.
    pub point: Vec3,
    /// Whether the surface is solid. Sensor/trigger shapes report false.
    pub is_solid: bool,
}

impl HitCandidate {
    /// Convert into the hit record stored on character state.
    pub fn to_character_hit(&self) -> CharacterHit {
        CharacterHit::new(self.entity, self.normal, self.point, self.distance)
    }
}

/// Filtering/ranking policy for a world cast.
pub trait HitCollector {
    /// Offer a candidate. Returns whether the candidate was accepted.
    fn add_hit(&mut self, candidate: HitCandidate) -> bool;

    /// The best accepted hit so far.
    fn closest(&self) -> Option<HitCandidate>;

    /// Number of accepted hits.
    fn num_hits(&self) -> u32;

    /// Entity-level pre-filter, usable by backends that can reject entities
    /// before computing hit details. Default accepts everything; the full
    /// [`add_hit`](Self::add_hit) checks still apply afterwards.
    fn retains_entity(&self, _entity: Entity) -> bool {
        true
    }
}

/// Standard collector for character sweeps and grounding probes.
///
/// Rejects self hits, hits on explicitly ignored entities, non-solid
/// (sensor) surfaces, and any candidate farther than the best accepted
/// fraction so far.
#[derive(Debug, Clone)]
pub struct ClosestHitCollector {
    self_entity: Entity,
    ignored: Vec<Entity>,
    closest: Option<HitCandidate>,
    num_hits: u32,
}

impl ClosestHitCollector {
    pub fn new(self_entity: Entity) -> Self {
        Self {
            self_entity,
            ignored: Vec::new(),
            closest: None,
            num_hits: 0,
        }
    }

    /// Add entities that must never be hit (carried props, vehicle parts).
    pub fn with_ignored(mut self, ignored: &[Entity]) -> Self {
        self.ignored.extend_from_slice(ignored);
        self
    }

    /// Reset for reuse on a new cast without reallocating the ignore list.
    pub fn reset(&mut self) {
        self.closest = None;
        self.num_hits = 0;
    }
}

impl HitCollector for ClosestHitCollector {
    fn add_hit(&mut self, candidate: HitCandidate) -> bool {
        if !self.retains_entity(candidate.entity) || !candidate.is_solid {
            return false;
        }
        if let Some(best) = self.closest {
            if candidate.fraction >= best.fraction {
                return false;
            }
        }
        self.closest = Some(candidate);
        self.num_hits += 1;
        true
    }

    fn closest(&self) -> Option<HitCandidate> {
        self.closest
    }

    fn num_hits(&self) -> u32 {
        self.num_hits
    }

    fn retains_entity(&self, entity: Entity) -> bool {
        entity != self.self_entity && !self.ignored.contains(&entity)
    }
}

/// Collector for camera obstruction sphere-casts.
///
/// On top of the standard filtering, rejects backfaces: hits whose surface
/// normal points away from the camera (normal roughly aligned with the cast
/// direction) would otherwise pull the camera inside hollow geometry.
#[derive(Debug, Clone)]
pub struct CameraObstructionCollector {
    cast_direction: Vec3,
    ignored: Vec<Entity>,
    closest: Option<HitCandidate>,
    num_hits: u32,
}

impl CameraObstructionCollector {
    /// `cast_direction` is the direction the obstruction cast travels
    /// (from the target toward the camera).
    pub fn new(cast_direction: Vec3, ignored: &[Entity]) -> Self {
        Self {
            cast_direction: cast_direction.normalize_or_zero(),
            ignored: ignored.to_vec(),
            closest: None,
            num_hits: 0,
        }
    }
}

impl HitCollector for CameraObstructionCollector {
    fn add_hit(&mut self, candidate: HitCandidate) -> bool {
        if !self.retains_entity(candidate.entity) || !candidate.is_solid {
            return false;
        }
        // Backface: the surface faces away from the incoming cast.
        if candidate.normal.dot(self.cast_direction) > 0.0 {
            return false;
        }
        if let Some(best) = self.closest {
            if candidate.fraction >= best.fraction {
                return false;
            }
        }
        self.closest = Some(candidate);
        self.num_hits += 1;
        true
    }

    fn closest(&self) -> Option<HitCandidate> {
        self.closest
    }

    fn num_hits(&self) -> u32 {
        self.num_hits
    }

    fn retains_entity(&self, entity: Entity) -> bool {
        !self.ignored.contains(&entity)
    }
}
