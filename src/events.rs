//! Stateful hit events.
//!
//! Raw sweep and grounding hits are transient: the same wall reports a fresh
//! hit every step. Gameplay usually wants transitions instead — "started
//! touching", "still touching", "stopped touching". [`HitEventTracker`] keeps
//! a small per-pair state table and diffs it against each step's hits,
//! emitting [`CharacterHitEvent`]s. Exited pairs are pruned immediately so
//! the table never grows beyond the current contact set.

use bevy::platform::collections::HashMap;
use bevy::prelude::*;

use crate::body::CharacterHit;

/// Contact transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitEventKind {
    /// Contact began this step.
    Enter,
    /// Contact continued from the previous step.
    Stay,
    /// Contact ended this step.
    Exit,
}

/// Contact transition for one (character, other) pair.
#[derive(Event, Debug, Clone, Copy)]
pub struct CharacterHitEvent {
    pub character: Entity,
    pub other: Entity,
    pub kind: HitEventKind,
    /// Last known surface normal for this pair.
    pub normal: Vec3,
    /// Last known contact point for this pair.
    pub point: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct PairState {
    normal: Vec3,
    point: Vec3,
    seen_this_step: bool,
}

/// Per-character contact state table.
///
/// Optional: characters without this component skip phase 10 entirely.
#[derive(Component, Debug, Default)]
pub struct HitEventTracker {
    pairs: HashMap<Entity, PairState>,
}

impl HitEventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently-touching pairs.
    pub fn active_contacts(&self) -> usize {
        self.pairs.len()
    }

    /// Whether the character is currently in contact with `other`.
    pub fn is_touching(&self, other: Entity) -> bool {
        self.pairs.contains_key(&other)
    }

    /// Diff this step's hits against the table, returning the transitions.
    ///
    /// Multiple hits against the same entity within one step collapse into a
    /// single pair (last hit wins for normal/point).
    pub fn update(&mut self, character: Entity, hits: &[CharacterHit]) -> Vec<CharacterHitEvent> {
        let mut events = Vec::new();

        for state in self.pairs.values_mut() {
            state.seen_this_step = false;
        }

        for hit in hits {
            match self.pairs.get_mut(&hit.entity) {
                Some(state) => {
                    let first_this_step = !state.seen_this_step;
                    state.normal = hit.normal;
                    state.point = hit.point;
                    state.seen_this_step = true;
                    if first_this_step {
                        events.push(CharacterHitEvent {
                            character,
                            other: hit.entity,
                            kind: HitEventKind::Stay,
                            normal: hit.normal,
                            point: hit.point,
                        });
                    }
                }
                None => {
                    self.pairs.insert(
                        hit.entity,
                        PairState {
                            normal: hit.normal,
                            point: hit.point,
                            seen_this_step: true,
                        },
                    );
                    events.push(CharacterHitEvent {
                        character,
                        other: hit.entity,
                        kind: HitEventKind::Enter,
                        normal: hit.normal,
                        point: hit.point,
                    });
                }
            }
        }

        self.pairs.retain(|&other, state| {
            if state.seen_this_step {
                true
            } else {
                events.push(CharacterHitEvent {
                    character,
                    other,
                    kind: HitEventKind::Exit,
                    normal: state.normal,
                    point: state.point,
                });
                false
            }
        });

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(entity: Entity) -> CharacterHit {
        CharacterHit::new(entity, Vec3::Y, Vec3::ZERO, 0.0)
    }

    #[test]
    fn enter_stay_exit_sequence() {
        let character = Entity::from_raw(1);
        let wall = Entity::from_raw(2);
        let mut tracker = HitEventTracker::new();

        let events = tracker.update(character, &[hit(wall)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, HitEventKind::Enter);
        assert!(tracker.is_touching(wall));

        let events = tracker.update(character, &[hit(wall)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, HitEventKind::Stay);

        let events = tracker.update(character, &[]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, HitEventKind::Exit);
        assert_eq!(events[0].other, wall);
        // Exited pairs are pruned immediately.
        assert_eq!(tracker.active_contacts(), 0);
    }

    #[test]
    fn duplicate_hits_collapse_to_one_pair() {
        let character = Entity::from_raw(1);
        let wall = Entity::from_raw(2);
        let mut tracker = HitEventTracker::new();

        let events = tracker.update(character, &[hit(wall), hit(wall)]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, HitEventKind::Enter);
        assert_eq!(tracker.active_contacts(), 1);
    }

    #[test]
    fn independent_pairs_transition_independently() {
        let character = Entity::from_raw(1);
        let wall = Entity::from_raw(2);
        let floor = Entity::from_raw(3);
        let mut tracker = HitEventTracker::new();

        tracker.update(character, &[hit(wall), hit(floor)]);
        let events = tracker.update(character, &[hit(floor)]);

        let exit = events
            .iter()
            .find(|e| e.kind == HitEventKind::Exit)
            .expect("wall should exit");
        assert_eq!(exit.other, wall);
        let stay = events
            .iter()
            .find(|e| e.kind == HitEventKind::Stay)
            .expect("floor should stay");
        assert_eq!(stay.other, floor);
    }

    #[test]
    fn exit_carries_last_known_contact() {
        let character = Entity::from_raw(1);
        let wall = Entity::from_raw(2);
        let mut tracker = HitEventTracker::new();

        let mut contact = hit(wall);
        contact.normal = Vec3::X;
        contact.point = Vec3::new(0.0, 1.0, 2.0);
        tracker.update(character, &[contact]);

        let events = tracker.update(character, &[]);
        assert_eq!(events[0].normal, Vec3::X);
        assert_eq!(events[0].point, Vec3::new(0.0, 1.0, 2.0));
    }
}
