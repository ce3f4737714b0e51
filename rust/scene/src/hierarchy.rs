// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Parent/child inference between anchors of a room.
//!
//! Three passes run in a fixed order:
//!
//! 1. anchors lying flat against a wall (doors, windows, wall art),
//! 2. volumes resting on a floor,
//! 3. volumes stacked on other volumes.
//!
//! An anchor keeps the first parent it is matched with. Further matches are
//! reported as diagnostics and skipped.

use nalgebra::{Point2, Point3, Vector3};

use crate::keys::AnchorKey;
use crate::math::{coincident, forward_vector};
use crate::room::Room;

impl Room {
    /// Rebuilds parent/child links from scratch.
    pub fn compute_anchor_hierarchy(&mut self) {
        for anchor in self.anchors.values_mut() {
            anchor.parent = None;
            anchor.children.clear();
        }

        let mut links = self.wall_attachments();
        links.extend(self.floor_attachments());
        links.extend(self.stacked_volumes());

        let mut attached = 0usize;
        for (child, parent) in links {
            if self.attach(child, parent) {
                attached += 1;
            }
        }
        tracing::debug!(room = %self.uuid, attached, "Computed anchor hierarchy");
    }

    /// Links `child` under `parent` unless it already has a parent.
    fn attach(&mut self, child: AnchorKey, parent: AnchorKey) -> bool {
        let Some(existing) = self.anchors.get(child).map(|a| a.parent) else {
            return false;
        };
        if let Some(existing) = existing {
            tracing::warn!(
                child = %self.anchors[child].uuid,
                parent = %self.anchors[existing].uuid,
                candidate = %self.anchors[parent].uuid,
                "This anchor already has a parent"
            );
            return false;
        }
        self.anchors[child].parent = Some(parent);
        self.anchors[parent].children.push(child);
        true
    }

    /// Anchors facing the same way as a wall, close to its plane and inside
    /// its outline.
    fn wall_attachments(&self) -> Vec<(AnchorKey, AnchorKey)> {
        let tolerance = self.config().offset_tolerance;
        let mut links = Vec::new();
        for &wall_key in &self.walls {
            let Some(wall) = self.anchors.get(wall_key) else {
                continue;
            };
            let wall_normal = forward_vector(&wall.pose);
            for (child_key, child) in self.anchors() {
                if child_key == wall_key || self.walls.contains(&child_key) {
                    continue;
                }
                if !coincident(&wall_normal, &forward_vector(&child.pose)) {
                    continue;
                }
                // Attached anchors are offset slightly to avoid z-fighting.
                let local = wall.to_local(&child.position());
                if local.x.abs() > tolerance {
                    continue;
                }
                if !wall.is_position_in_boundary(&Point2::new(local.y, local.z)) {
                    continue;
                }
                links.push((child_key, wall_key));
            }
        }
        links
    }

    /// Volumes whose bottom is at floor height and whose footprint centre is
    /// inside the floor outline.
    fn floor_attachments(&self) -> Vec<(AnchorKey, AnchorKey)> {
        let tolerance = self.config().offset_tolerance;
        let down = -Vector3::z();
        let mut links = Vec::new();
        for &floor_key in &self.floors {
            let Some(floor) = self.anchors.get(floor_key) else {
                continue;
            };
            let floor_height = floor.position().z;
            for (child_key, child) in self.anchors() {
                if child_key == floor_key {
                    continue;
                }
                let Some(volume) = &child.volume_bounds else {
                    continue;
                };
                if !coincident(&forward_vector(&child.pose), &down) {
                    continue;
                }
                let child_bottom = child.position().z - volume.max.x;
                if (floor_height - child_bottom).abs() > tolerance {
                    continue;
                }
                let local = floor.to_local(&child.position());
                if !floor.is_position_in_boundary(&Point2::new(local.y, local.z)) {
                    continue;
                }
                links.push((child_key, floor_key));
            }
        }
        links
    }

    /// Volumes whose bottom touches another volume's top with at least one
    /// footprint corner over it.
    ///
    /// Scene capture has users start a stacked volume from a corner resting
    /// on the lower one, so a single corner is enough.
    fn stacked_volumes(&self) -> Vec<(AnchorKey, AnchorKey)> {
        let tolerance = self.config().offset_tolerance;
        let down = -Vector3::z();
        let mut links = Vec::new();
        for (parent_key, parent) in self.anchors() {
            let Some(parent_volume) = &parent.volume_bounds else {
                continue;
            };
            if !coincident(&forward_vector(&parent.pose), &down) {
                continue;
            }
            let parent_top = parent.position().z - parent_volume.min.x;
            for (child_key, child) in self.anchors() {
                if child_key == parent_key {
                    continue;
                }
                let Some(child_volume) = &child.volume_bounds else {
                    continue;
                };
                if !coincident(&forward_vector(&child.pose), &down) {
                    continue;
                }
                let child_bottom = child.position().z - child_volume.max.x;
                if (parent_top - child_bottom).abs() > tolerance {
                    continue;
                }
                let any_corner_inside = (0..4).any(|i| {
                    // Height does not matter, only the horizontal footprint.
                    let corner = Point3::new(
                        0.0,
                        if i < 2 { child_volume.min.y } else { child_volume.max.y },
                        if i % 2 == 0 { child_volume.min.z } else { child_volume.max.z },
                    );
                    let local = parent.to_local(&child.to_world(&corner));
                    local.y >= parent_volume.min.y
                        && local.y <= parent_volume.max.y
                        && local.z >= parent_volume.min.z
                        && local.z <= parent_volume.max.z
                });
                if !any_corner_inside {
                    continue;
                }
                links.push((child_key, parent_key));
            }
        }
        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::labels;
    use crate::math::{Aabb2, Aabb3};
    use crate::room::tests::{box_room, floor_pose};
    use uuid::Uuid;

    /// Volume anchor with its top centred at `top` and the given footprint.
    fn volume(label: &str, top: Point3<f64>, height: f64, half_y: f64, half_z: f64) -> Anchor {
        let mut pose = floor_pose(0.0);
        pose.translation.vector = top.coords;
        Anchor::new(Uuid::new_v4(), [label], pose).with_volume(Aabb3::new(
            Point3::new(0.0, -half_y, -half_z),
            Point3::new(height, half_y, half_z),
        ))
    }

    #[test]
    fn volume_on_floor_gets_floor_parent() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let table = room.add_anchor(volume(labels::TABLE, Point3::new(50.0, 20.0, 75.0), 75.0, 40.0, 60.0));
        room.initialize();
        let floor = room.floor_anchors()[0];
        assert_eq!(room.anchor(table).unwrap().parent(), Some(floor));
        assert!(room.anchor(floor).unwrap().children().contains(&table));
    }

    #[test]
    fn floating_volume_has_no_parent() {
        let mut room = box_room(400.0, 300.0, 250.0);
        // Bottom sits 10 units above the floor, beyond the 4 unit tolerance.
        let shelf = room.add_anchor(volume(labels::STORAGE, Point3::new(0.0, 0.0, 110.0), 100.0, 20.0, 20.0));
        room.initialize();
        assert!(room.anchor(shelf).unwrap().parent().is_none());
    }

    #[test]
    fn volume_outside_floor_outline_is_not_attached() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let outside = room.add_anchor(volume(labels::OTHER, Point3::new(500.0, 0.0, 50.0), 50.0, 10.0, 10.0));
        room.initialize();
        assert!(room.anchor(outside).unwrap().parent().is_none());
    }

    #[test]
    fn wall_art_within_tolerance_attaches() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let wall = room.wall_anchors()[0];
        let wall_anchor = room.anchor(wall).unwrap();
        let normal = forward_vector(&wall_anchor.pose);

        let mut near = wall_anchor.pose;
        near.translation.vector -= normal * 3.0;
        let mut far = wall_anchor.pose;
        far.translation.vector -= normal * 5.0;

        let rect = Aabb2::new(Point2::new(-10.0, -10.0), Point2::new(10.0, 10.0));
        let near = room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::WALL_ART], near).with_plane(rect, Vec::new()));
        let far = room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::WALL_ART], far).with_plane(rect, Vec::new()));
        room.initialize();

        assert_eq!(room.anchor(near).unwrap().parent(), Some(wall));
        assert!(room.anchor(far).unwrap().parent().is_none());
    }

    #[test]
    fn stacked_volume_needs_one_corner_over_parent() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let table = room.add_anchor(volume(labels::TABLE, Point3::new(0.0, 0.0, 75.0), 75.0, 50.0, 50.0));
        // Lamp footprint straddles the table edge: one corner lies over it.
        let lamp = room.add_anchor(volume(labels::LAMP, Point3::new(45.0, 45.0, 115.0), 40.0, 10.0, 10.0));
        // Same height but entirely beside the table.
        let plant = room.add_anchor(volume(labels::PLANT, Point3::new(150.0, 0.0, 115.0), 40.0, 10.0, 10.0));
        room.initialize();

        assert_eq!(room.anchor(lamp).unwrap().parent(), Some(table));
        assert!(room.anchor(plant).unwrap().parent().is_none());
        assert_eq!(room.anchor(table).unwrap().children(), &[lamp]);
    }

    #[test]
    fn first_parent_wins() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let first = room.wall_anchors()[0];
        let pose = room.anchor(first).unwrap().pose;
        let rect = Aabb2::new(Point2::new(-100.0, -100.0), Point2::new(100.0, 100.0));
        // A duplicate wall in the same place competes for the same child.
        let second = room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::WALL_FACE], pose).with_plane(rect, Vec::new()));
        let art = room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::WALL_ART], pose).with_plane(rect, Vec::new()));
        room.initialize();

        assert_eq!(room.anchor(art).unwrap().parent(), Some(first));
        assert!(!room.anchor(second).unwrap().children().contains(&art));
    }

    #[test]
    fn hierarchy_is_rebuilt_from_scratch() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let table = room.add_anchor(volume(labels::TABLE, Point3::new(0.0, 0.0, 75.0), 75.0, 40.0, 40.0));
        room.initialize();
        room.initialize();
        let floor = room.floor_anchors()[0];
        assert_eq!(room.anchor(floor).unwrap().children(), &[table]);
    }
}
