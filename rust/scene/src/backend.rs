// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry backend - room containment and ray intersection
//!
//! The backend works in metres. Rooms convert to and from engine units
//! with their `world_to_meters` factor before and after each call.

use nalgebra::{Point2, Point3, Vector3};
use uuid::Uuid;

use crate::anchor::{Anchor, GlobalMesh};
use crate::labels::LabelFilter;
use crate::room::Room;

/// Ray hit as reported by a backend, in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawHit {
    pub anchor_uuid: Uuid,
    pub distance: f64,
    pub position: Point3<f64>,
    /// Surface normal facing back towards the ray origin.
    pub normal: Vector3<f64>,
}

/// Geometry predicates consumed by rooms and the scene.
/// Implementations can be swapped for test doubles.
pub trait GeometryBackend {
    /// Whether a position (metres) lies inside the room footprint and,
    /// optionally, between floor and ceiling.
    fn is_position_in_room(&self, room: &Room, position: &Point3<f64>, test_vertical_bounds: bool) -> bool;

    /// Nearest hit of a ray against the room's anchors passing `filter`.
    /// A non-positive `max_distance` (metres) is unbounded.
    fn raycast_room(
        &self,
        room: &Room,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Option<RawHit>;

    /// Every hit of a ray against the room's anchors passing `filter`,
    /// nearest first.
    fn raycast_room_all(
        &self,
        room: &Room,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Vec<RawHit>;

    /// Closest point on an anchor's surface to a position, with its distance.
    /// Works in engine units.
    fn closest_surface_position(&self, anchor: &Anchor, position: &Point3<f64>) -> Option<(Point3<f64>, f64)> {
        anchor.closest_surface_position(position)
    }
}

/// Pure-Rust backend intersecting rays with anchor planes, volumes and
/// global meshes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeGeometry;

const RAY_EPSILON: f64 = 1e-9;

impl NativeGeometry {
    pub fn new() -> Self {
        Self
    }

    /// All hits in engine units, unsorted.
    fn intersect_room(
        &self,
        room: &Room,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Vec<RawHit> {
        let w2m = room.world_to_meters();
        let origin = origin * w2m;
        let max_distance = if max_distance > 0.0 {
            max_distance * w2m
        } else {
            f64::INFINITY
        };
        let direction = direction.normalize();

        let mut hits = Vec::new();
        for (_, anchor) in room.anchors() {
            if !anchor.passes_label_filter(filter) {
                continue;
            }
            if let Some(hit) = intersect_anchor(anchor, &origin, &direction) {
                if hit.distance <= max_distance {
                    hits.push(RawHit {
                        anchor_uuid: hit.anchor_uuid,
                        distance: hit.distance / w2m,
                        position: hit.position / w2m,
                        normal: hit.normal,
                    });
                }
            }
        }
        hits
    }
}

impl GeometryBackend for NativeGeometry {
    fn is_position_in_room(&self, room: &Room, position: &Point3<f64>, test_vertical_bounds: bool) -> bool {
        let position = position * room.world_to_meters();
        let in_footprint = room
            .floor_anchors()
            .iter()
            .filter_map(|&k| room.anchor(k))
            .any(|floor| {
                let local = floor.to_local(&position);
                floor.is_position_in_boundary(&Point2::new(local.y, local.z))
            });
        if !in_footprint {
            return false;
        }
        if !test_vertical_bounds {
            return true;
        }
        room.room_bounds()
            .is_some_and(|b| position.z >= b.min.z && position.z <= b.max.z)
    }

    fn raycast_room(
        &self,
        room: &Room,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Option<RawHit> {
        self.intersect_room(room, origin, direction, max_distance, filter)
            .into_iter()
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn raycast_room_all(
        &self,
        room: &Room,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Vec<RawHit> {
        let mut hits = self.intersect_room(room, origin, direction, max_distance, filter);
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

/// Nearest intersection of a ray with any component of the anchor, in
/// engine units.
fn intersect_anchor(anchor: &Anchor, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<RawHit> {
    let local_origin = anchor.to_local(origin);
    let local_dir = anchor.pose.rotation.inverse_transform_vector(direction);

    // (distance, local normal)
    let mut best: Option<(f64, Vector3<f64>)> = None;
    let mut consider = |candidate: Option<(f64, Vector3<f64>)>| {
        if let Some((t, n)) = candidate {
            if best.map_or(true, |(bt, _)| t < bt) {
                best = Some((t, n));
            }
        }
    };

    if anchor.plane_bounds.is_some() {
        consider(intersect_plane(anchor, &local_origin, &local_dir));
    }
    if let Some(volume) = &anchor.volume_bounds {
        consider(intersect_box(&volume.min, &volume.max, &local_origin, &local_dir));
    }
    if let Some(mesh) = &anchor.global_mesh {
        consider(intersect_mesh(mesh, &local_origin, &local_dir));
    }

    let (t, local_normal) = best?;
    let mut normal = anchor.pose.rotation * local_normal;
    if normal.dot(direction) > 0.0 {
        normal = -normal;
    }
    Some(RawHit {
        anchor_uuid: anchor.uuid,
        distance: t,
        position: origin + direction * t,
        normal,
    })
}

fn intersect_plane(anchor: &Anchor, origin: &Point3<f64>, dir: &Vector3<f64>) -> Option<(f64, Vector3<f64>)> {
    if dir.x.abs() < RAY_EPSILON {
        return None;
    }
    let t = -origin.x / dir.x;
    if t < 0.0 {
        return None;
    }
    let p = origin + dir * t;
    if !anchor.is_position_in_boundary(&Point2::new(p.y, p.z)) {
        return None;
    }
    Some((t, -Vector3::x()))
}

/// Slab test against a local box. Rays starting inside report the exit face.
fn intersect_box(
    min: &Point3<f64>,
    max: &Point3<f64>,
    origin: &Point3<f64>,
    dir: &Vector3<f64>,
) -> Option<(f64, Vector3<f64>)> {
    let mut t_near = f64::NEG_INFINITY;
    let mut t_far = f64::INFINITY;
    let mut near_axis = 0;
    let mut far_axis = 0;

    for axis in 0..3 {
        if dir[axis].abs() < RAY_EPSILON {
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return None;
            }
            continue;
        }
        let t1 = (min[axis] - origin[axis]) / dir[axis];
        let t2 = (max[axis] - origin[axis]) / dir[axis];
        let (t_enter, t_exit) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        if t_enter > t_near {
            t_near = t_enter;
            near_axis = axis;
        }
        if t_exit < t_far {
            t_far = t_exit;
            far_axis = axis;
        }
        if t_near > t_far {
            return None;
        }
    }
    if t_far < 0.0 {
        return None;
    }

    let mut normal = Vector3::zeros();
    if t_near >= 0.0 {
        normal[near_axis] = -dir[near_axis].signum();
        Some((t_near, normal))
    } else {
        normal[far_axis] = dir[far_axis].signum();
        Some((t_far, normal))
    }
}

/// Möller-Trumbore against every triangle of the mesh.
fn intersect_mesh(mesh: &GlobalMesh, origin: &Point3<f64>, dir: &Vector3<f64>) -> Option<(f64, Vector3<f64>)> {
    let mut best: Option<(f64, Vector3<f64>)> = None;
    for tri in mesh.indices.chunks_exact(3) {
        let (Some(a), Some(b), Some(c)) = (
            mesh.positions.get(tri[0] as usize),
            mesh.positions.get(tri[1] as usize),
            mesh.positions.get(tri[2] as usize),
        ) else {
            continue;
        };
        let e1 = b - a;
        let e2 = c - a;
        let p = dir.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < RAY_EPSILON {
            continue;
        }
        let inv_det = 1.0 / det;
        let s = origin - a;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            continue;
        }
        let q = s.cross(&e1);
        let v = dir.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            continue;
        }
        let t = e2.dot(&q) * inv_det;
        if t < 0.0 {
            continue;
        }
        if best.map_or(true, |(bt, _)| t < bt) {
            best = Some((t, e1.cross(&e2).normalize()));
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels;
    use crate::math::Aabb3;
    use crate::room::tests::{box_room, floor_pose};
    use approx::assert_relative_eq;

    fn initialized_room() -> Room {
        let mut room = box_room(400.0, 300.0, 250.0);
        room.initialize();
        room
    }

    #[test]
    fn position_in_room_checks_footprint_and_height() {
        let room = initialized_room();
        let backend = NativeGeometry::new();
        assert!(backend.is_position_in_room(&room, &Point3::new(1.0, 0.5, 1.0), true));
        assert!(!backend.is_position_in_room(&room, &Point3::new(2.5, 0.0, 1.0), true));
        // Above the ceiling: only inside without the vertical test.
        let above = Point3::new(0.0, 0.0, 3.0);
        assert!(!backend.is_position_in_room(&room, &above, true));
        assert!(backend.is_position_in_room(&room, &above, false));
    }

    #[test]
    fn raycast_down_hits_floor() {
        let room = initialized_room();
        let backend = NativeGeometry::new();
        let hit = backend
            .raycast_room(&room, &Point3::new(0.5, 0.5, 1.0), &-Vector3::z(), 0.0, &LabelFilter::default())
            .unwrap();
        let floor = room.anchor(room.floor_anchors()[0]).unwrap();
        assert_eq!(hit.anchor_uuid, floor.uuid);
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-9);
        assert_relative_eq!(hit.position.z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hit.normal.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn raycast_respects_max_distance_and_filter() {
        let room = initialized_room();
        let backend = NativeGeometry::new();
        let origin = Point3::new(0.0, 0.0, 1.0);
        assert!(backend
            .raycast_room(&room, &origin, &Vector3::x(), 1.0, &LabelFilter::default())
            .is_none());
        let walls_only = LabelFilter::including([labels::WALL_FACE]);
        let hit = backend
            .raycast_room(&room, &origin, &-Vector3::z(), 0.0, &walls_only);
        assert!(hit.is_none());
    }

    #[test]
    fn raycast_hits_volume_top() {
        let mut room = box_room(400.0, 300.0, 250.0);
        let mut pose = floor_pose(0.0);
        pose.translation.vector = Vector3::new(0.0, 0.0, 75.0);
        room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::TABLE], pose).with_volume(Aabb3::new(
            Point3::new(0.0, -50.0, -50.0),
            Point3::new(75.0, 50.0, 50.0),
        )));
        room.initialize();

        let backend = NativeGeometry::new();
        let hits = backend.raycast_room_all(
            &room,
            &Point3::new(0.0, 0.0, 2.0),
            &-Vector3::z(),
            0.0,
            &LabelFilter::default(),
        );
        // Table top, then the floor below it.
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].distance, 1.25, epsilon = 1e-9);
        assert_relative_eq!(hits[0].normal.z, 1.0, epsilon = 1e-9);
        assert_relative_eq!(hits[1].distance, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn ray_hits_global_mesh_triangle() {
        let mesh = GlobalMesh {
            positions: vec![
                Point3::new(0.0, -1.0, -1.0),
                Point3::new(0.0, 1.0, -1.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            indices: vec![0, 1, 2],
        };
        let hit = intersect_mesh(&mesh, &Point3::new(-2.0, 0.0, 0.0), &Vector3::x()).unwrap();
        assert_relative_eq!(hit.0, 2.0, epsilon = 1e-12);
        assert!(intersect_mesh(&mesh, &Point3::new(-2.0, 5.0, 0.0), &Vector3::x()).is_none());
    }
}
