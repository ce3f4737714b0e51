// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interior planning: which content goes on which anchor.
//!
//! Spawn groups are keyed by label. For every anchor the planner picks an
//! actor from the first matching group, or falls back to a procedural mesh.
//! Actual spawning is left to the caller.

use nalgebra::Vector2;
use rand::Rng;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::anchor::Anchor;
use crate::keys::AnchorKey;
use crate::labels;
use crate::layout::PlaneUv;
use crate::math::Aabb3;
use crate::room::Room;

/// How an actor is chosen from a group with several entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SelectionMode {
    #[default]
    Random,
    /// The actor whose bounds are closest in size to the anchor volume.
    ClosestSize,
}

/// Per-group override of the global procedural fallback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FallbackToProcedural {
    /// Use the global setting.
    #[default]
    Default,
    Fallback,
    NoFallback,
}

/// One candidate actor of a spawn group.
#[derive(Debug, Clone, PartialEq)]
pub struct SpawnActor {
    pub name: String,
    /// Local bounds of the actor, used by [`SelectionMode::ClosestSize`].
    pub bounds: Option<Aabb3>,
}

impl SpawnActor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bounds: None,
        }
    }

    pub fn with_bounds(mut self, bounds: Aabb3) -> Self {
        self.bounds = Some(bounds);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpawnGroup {
    pub actors: Vec<SpawnActor>,
    pub selection_mode: SelectionMode,
    pub fallback_to_procedural: FallbackToProcedural,
}

impl SpawnGroup {
    fn should_fallback(&self, global: bool) -> bool {
        match self.fallback_to_procedural {
            FallbackToProcedural::Default => global,
            FallbackToProcedural::Fallback => true,
            FallbackToProcedural::NoFallback => false,
        }
    }
}

/// A single planned piece of interior content.
#[derive(Debug, Clone, PartialEq)]
pub enum InteriorPlacement {
    /// A procedural mesh over the anchor's plane. Empty `uvs` means the
    /// default unit mapping.
    ProceduralMesh { anchor: AnchorKey, uvs: Vec<PlaneUv> },
    /// An actor from the group registered for `label`.
    Actor {
        anchor: AnchorKey,
        label: String,
        actor_index: usize,
        actor: String,
    },
}

impl InteriorPlacement {
    pub fn anchor(&self) -> AnchorKey {
        match self {
            InteriorPlacement::ProceduralMesh { anchor, .. } | InteriorPlacement::Actor { anchor, .. } => *anchor,
        }
    }
}

/// Whether a group for `label` leaves the surface to procedural meshes.
fn wants_procedural(groups: &FxHashMap<String, SpawnGroup>, label: &str, global_fallback: bool) -> bool {
    match groups.get(label) {
        None => true,
        Some(group) => group.actors.is_empty() && group.should_fallback(global_fallback),
    }
}

fn closest_size_index(anchor: &Anchor, group: &SpawnGroup) -> usize {
    let Some(volume) = &anchor.volume_bounds else {
        return 0;
    };
    let anchor_size = volume.volume().cbrt();
    let mut closest_difference = f64::MAX;
    let mut index = 0;
    for (i, actor) in group.actors.iter().enumerate() {
        let Some(bounds) = &actor.bounds else {
            continue;
        };
        let difference = (anchor_size - bounds.volume().cbrt()).abs();
        if difference < closest_difference {
            closest_difference = difference;
            index = i;
        }
    }
    index
}

impl Room {
    /// Plans the interior for this room.
    ///
    /// Walls get seamless procedural meshes unless a `WALL_FACE` group
    /// provides actors; floors and ceilings likewise get metric-scaled
    /// meshes. Every other anchor gets one actor from the first of its
    /// labels with a non-empty group, or a procedural mesh when the
    /// fallback rules allow it.
    pub fn plan_interior<R: Rng + ?Sized>(
        &self,
        groups: &FxHashMap<String, SpawnGroup>,
        rng: &mut R,
        fallback_to_procedural: bool,
    ) -> Vec<InteriorPlacement> {
        let mut plan = Vec::new();
        let mut procedural: FxHashSet<AnchorKey> = FxHashSet::default();

        if wants_procedural(groups, labels::WALL_FACE, fallback_to_procedural) {
            for wall in self.compute_wall_mesh_uv_adjustments(&[]) {
                procedural.insert(wall.anchor);
                plan.push(InteriorPlacement::ProceduralMesh {
                    anchor: wall.anchor,
                    uvs: wall.uvs,
                });
            }
        }

        let w2m = self.world_to_meters();
        for (keys, label) in [(&self.floors, labels::FLOOR), (&self.ceilings, labels::CEILING)] {
            if keys.is_empty() || !wants_procedural(groups, label, fallback_to_procedural) {
                continue;
            }
            for &key in keys {
                let Some(anchor) = self.anchors.get(key) else {
                    continue;
                };
                let scale = anchor.plane_bounds.map_or(Vector2::zeros(), |b| b.size() / w2m);
                procedural.insert(key);
                plan.push(InteriorPlacement::ProceduralMesh {
                    anchor: key,
                    uvs: vec![PlaneUv {
                        offset: Vector2::zeros(),
                        scale,
                    }],
                });
            }
        }

        for (key, anchor) in self.anchors() {
            let mut spawn_procedural = true;
            let invisible = anchor.has_label(labels::INVISIBLE_WALL_FACE);
            for label in &anchor.labels {
                // Invisible walls keep their WALL_FACE label but spawn as invisible.
                if label == labels::WALL_FACE && invisible {
                    continue;
                }
                let Some(group) = groups.get(label) else {
                    continue;
                };
                if group.actors.is_empty() {
                    if !group.should_fallback(fallback_to_procedural) {
                        spawn_procedural = false;
                    }
                    continue;
                }

                spawn_procedural = false;
                let actor_index = if group.actors.len() == 1 {
                    0
                } else {
                    match group.selection_mode {
                        SelectionMode::Random => rng.gen_range(0..group.actors.len()),
                        SelectionMode::ClosestSize => closest_size_index(anchor, group),
                    }
                };
                plan.push(InteriorPlacement::Actor {
                    anchor: key,
                    label: label.clone(),
                    actor_index,
                    actor: group.actors[actor_index].name.clone(),
                });
                break;
            }

            if spawn_procedural && !procedural.contains(&key) {
                plan.push(InteriorPlacement::ProceduralMesh {
                    anchor: key,
                    uvs: Vec::new(),
                });
            }
        }

        tracing::debug!(room = %self.uuid, placements = plan.len(), "Planned room interior");
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::tests::{box_room, floor_pose};
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn cube(size: f64) -> Aabb3 {
        Aabb3::new(Point3::origin(), Point3::new(size, size, size))
    }

    fn room_with_table() -> (Room, AnchorKey) {
        let mut room = box_room(400.0, 300.0, 250.0);
        let mut pose = floor_pose(0.0);
        pose.translation.vector = Vector3::new(0.0, 0.0, 80.0);
        let table = room.add_anchor(
            Anchor::new(Uuid::new_v4(), [labels::TABLE], pose)
                .with_volume(Aabb3::new(Point3::new(0.0, -40.0, -40.0), Point3::new(80.0, 40.0, 40.0))),
        );
        room.initialize();
        (room, table)
    }

    fn procedural_count(plan: &[InteriorPlacement]) -> usize {
        plan.iter()
            .filter(|p| matches!(p, InteriorPlacement::ProceduralMesh { .. }))
            .count()
    }

    #[test]
    fn no_groups_means_procedural_everything() {
        let (room, table) = room_with_table();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = room.plan_interior(&FxHashMap::default(), &mut rng, true);
        // 4 walls, floor, ceiling, table: one mesh each.
        assert_eq!(plan.len(), 7);
        assert_eq!(procedural_count(&plan), 7);
        assert!(plan.iter().any(|p| p.anchor() == table));

        let floor = room.floor_anchors()[0];
        let Some(InteriorPlacement::ProceduralMesh { uvs, .. }) = plan.iter().find(|p| p.anchor() == floor) else {
            panic!("floor has no procedural mesh");
        };
        // 300×400 floor at 100 units per metre.
        assert_relative_eq!(uvs[0].scale.x, 3.0);
        assert_relative_eq!(uvs[0].scale.y, 4.0);
    }

    #[test]
    fn closest_size_picks_matching_actor() {
        let (room, table) = room_with_table();
        let mut groups = FxHashMap::default();
        groups.insert(
            labels::TABLE.to_string(),
            SpawnGroup {
                actors: vec![
                    SpawnActor::new("small").with_bounds(cube(20.0)),
                    SpawnActor::new("medium").with_bounds(cube(75.0)),
                    SpawnActor::new("unsized"),
                    SpawnActor::new("large").with_bounds(cube(300.0)),
                ],
                selection_mode: SelectionMode::ClosestSize,
                ..SpawnGroup::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(0);
        let plan = room.plan_interior(&groups, &mut rng, true);
        let placement = plan.iter().find(|p| p.anchor() == table).unwrap();
        assert!(matches!(placement, InteriorPlacement::Actor { actor, actor_index: 1, .. } if actor == "medium"));
    }

    #[test]
    fn random_selection_is_reproducible() {
        let (room, table) = room_with_table();
        let mut groups = FxHashMap::default();
        groups.insert(
            labels::TABLE.to_string(),
            SpawnGroup {
                actors: (0..5).map(|i| SpawnActor::new(format!("table_{i}"))).collect(),
                ..SpawnGroup::default()
            },
        );
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            room.plan_interior(&groups, &mut rng, true)
                .into_iter()
                .find(|p| p.anchor() == table)
        };
        assert_eq!(pick(11), pick(11));
        assert!(matches!(pick(11), Some(InteriorPlacement::Actor { actor_index, .. }) if actor_index < 5));
    }

    #[test]
    fn wall_group_with_actors_replaces_procedural_walls() {
        let (room, _) = room_with_table();
        let mut groups = FxHashMap::default();
        groups.insert(
            labels::WALL_FACE.to_string(),
            SpawnGroup {
                actors: vec![SpawnActor::new("brick_wall")],
                ..SpawnGroup::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(0);
        let plan = room.plan_interior(&groups, &mut rng, true);
        for &wall in room.wall_anchors() {
            let entries: Vec<_> = plan.iter().filter(|p| p.anchor() == wall).collect();
            assert_eq!(entries.len(), 1);
            assert!(matches!(entries[0], InteriorPlacement::Actor { .. }));
        }
    }

    #[test]
    fn empty_group_follows_fallback_rules() {
        let (room, table) = room_with_table();
        let mut groups = FxHashMap::default();
        groups.insert(labels::TABLE.to_string(), SpawnGroup::default());
        let mut rng = StdRng::seed_from_u64(0);

        // Global fallback on: empty group falls back.
        let plan = room.plan_interior(&groups, &mut rng, true);
        assert!(plan.iter().any(|p| p.anchor() == table));
        // Global fallback off: nothing for the table.
        let plan = room.plan_interior(&groups, &mut rng, false);
        assert!(plan.iter().all(|p| p.anchor() != table));

        // Group override wins over the global setting.
        groups.insert(
            labels::TABLE.to_string(),
            SpawnGroup {
                fallback_to_procedural: FallbackToProcedural::Fallback,
                ..SpawnGroup::default()
            },
        );
        let plan = room.plan_interior(&groups, &mut rng, false);
        assert!(plan.iter().any(|p| p.anchor() == table));
    }

    #[test]
    fn invisible_walls_ignore_wall_face_group() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let wall = room.wall_anchors()[0];
        room.anchor_mut(wall)
            .unwrap()
            .labels
            .push(labels::INVISIBLE_WALL_FACE.to_string());
        room.initialize();

        let mut groups = FxHashMap::default();
        groups.insert(
            labels::WALL_FACE.to_string(),
            SpawnGroup {
                actors: vec![SpawnActor::new("brick_wall")],
                ..SpawnGroup::default()
            },
        );
        groups.insert(
            labels::INVISIBLE_WALL_FACE.to_string(),
            SpawnGroup {
                fallback_to_procedural: FallbackToProcedural::NoFallback,
                ..SpawnGroup::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(0);
        let plan = room.plan_interior(&groups, &mut rng, true);
        assert!(plan.iter().all(|p| p.anchor() != wall));
        assert_eq!(plan.iter().filter(|p| matches!(p, InteriorPlacement::Actor { .. })).count(), 3);
    }
}
