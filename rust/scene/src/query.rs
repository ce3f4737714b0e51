// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point and ray queries against a single room.
//!
//! Anchor counts are small, so every query is a linear scan. Ray
//! intersection and room containment go through the [`GeometryBackend`],
//! which works in metres; results are converted back to engine units here.

use nalgebra::{Point3, Vector3};

use crate::backend::{GeometryBackend, RawHit};
use crate::keys::AnchorKey;
use crate::labels::LabelFilter;
use crate::math::{pose_from_xz, right_vector, safe_normal, up_vector, Pose};
use crate::room::Room;

/// A ray hit in engine units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub anchor: AnchorKey,
    pub distance: f64,
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
}

/// Closest point on some anchor surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub anchor: AnchorKey,
    pub position: Point3<f64>,
    pub distance: f64,
}

/// How a pose is derived when a ray hits the top of a volume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PositioningMethod {
    /// Keep the hit point, face back towards the ray origin.
    #[default]
    Default,
    /// Snap to the nearest top edge, facing out of it.
    Edge,
    /// Snap to the volume origin, facing the nearest side.
    Center,
}

impl Room {
    fn hit_from_raw(&self, raw: &RawHit) -> Option<Hit> {
        let anchor = self.find_anchor_by_uuid(&raw.anchor_uuid)?;
        let w2m = self.world_to_meters();
        Some(Hit {
            anchor,
            distance: raw.distance * w2m,
            position: raw.position * w2m,
            normal: raw.normal,
        })
    }

    pub fn is_position_in_room(&self, backend: &dyn GeometryBackend, position: &Point3<f64>, test_vertical_bounds: bool) -> bool {
        backend.is_position_in_room(self, &(position / self.world_to_meters()), test_vertical_bounds)
    }

    /// Nearest hit along the ray. Hits on anchors the room no longer knows
    /// are dropped.
    pub fn raycast(
        &self,
        backend: &dyn GeometryBackend,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Option<Hit> {
        let w2m = self.world_to_meters();
        let raw = backend.raycast_room(self, &(origin / w2m), direction, max_distance / w2m, filter)?;
        self.hit_from_raw(&raw)
    }

    pub fn raycast_all(
        &self,
        backend: &dyn GeometryBackend,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Vec<Hit> {
        let w2m = self.world_to_meters();
        backend
            .raycast_room_all(self, &(origin / w2m), direction, max_distance / w2m, filter)
            .iter()
            .filter_map(|raw| self.hit_from_raw(raw))
            .collect()
    }

    /// Closest anchor surface to `position` among anchors passing `filter`.
    /// A non-positive `max_distance` is unbounded; otherwise only surfaces
    /// strictly closer than it count.
    pub fn try_get_closest_surface_position(
        &self,
        backend: &dyn GeometryBackend,
        position: &Point3<f64>,
        filter: &LabelFilter,
        max_distance: f64,
    ) -> Option<SurfacePoint> {
        let mut max_distance = if max_distance <= 0.0 { f64::MAX } else { max_distance };
        let mut closest = None;
        for (key, anchor) in self.anchors() {
            if !anchor.passes_label_filter(filter) {
                continue;
            }
            let Some((surface, distance)) = backend.closest_surface_position(anchor, position) else {
                continue;
            };
            if distance < max_distance {
                max_distance = distance;
                closest = Some(SurfacePoint {
                    anchor: key,
                    position: surface,
                    distance,
                });
            }
        }
        closest
    }

    /// First anchor whose volume contains `position`.
    pub fn is_position_in_scene_volume(
        &self,
        position: &Point3<f64>,
        test_vertical_bounds: bool,
        tolerance: f64,
    ) -> Option<AnchorKey> {
        self.anchors()
            .find(|(_, a)| a.is_position_in_volume_bounds(position, test_vertical_bounds, tolerance))
            .map(|(k, _)| k)
    }

    /// The seat pose most aligned with the ray, not the nearest one. Seats
    /// behind the ray origin never qualify.
    pub fn try_get_closest_seat_pose(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<(AnchorKey, Pose)> {
        let mut closest_dot = f64::MIN_POSITIVE;
        let mut closest = None;
        for &key in &self.seats {
            let Some(anchor) = self.anchors.get(key) else {
                continue;
            };
            for pose in &anchor.seat_poses {
                let to_seat = safe_normal(&(Point3::from(pose.translation.vector) - origin));
                let dot = direction.dot(&to_seat);
                if dot <= closest_dot {
                    continue;
                }
                closest_dot = dot;
                closest = Some((key, *pose));
            }
        }
        closest
    }

    /// Placement pose for content dropped where the ray hits the room.
    ///
    /// Forward defaults to the hit normal. Flat planes and volume tops use
    /// `method` to pick a forward that faces back to the viewer or out of a
    /// volume edge. The pose's up is always world Z.
    pub fn best_pose_from_raycast(
        &self,
        backend: &dyn GeometryBackend,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
        method: PositioningMethod,
    ) -> Option<(AnchorKey, Pose)> {
        let hit = self.raycast(backend, origin, direction, max_distance, filter)?;
        let anchor = self.anchor(hit.anchor)?;
        let parallel = self.config().parallel_tolerance;
        let up = Vector3::z();

        let toward_origin = || safe_normal(&Vector3::new(origin.x - hit.position.x, origin.y - hit.position.y, 0.0));

        let mut position = hit.position;
        let mut forward = hit.normal;

        match &anchor.volume_bounds {
            None if hit.normal.dot(&up) >= parallel => {
                forward = toward_origin();
            }
            Some(volume) if hit.normal.dot(&up) >= parallel => {
                let local = anchor.to_local(&hit.position);
                let right = right_vector(&anchor.pose);
                let anchor_up = up_vector(&anchor.pose);
                // Nearest vertical side, first match wins on ties.
                let sides = [
                    ((local.y - volume.min.y).abs(), -right, Point3::new(0.0, volume.min.y, local.z)),
                    ((local.y - volume.max.y).abs(), right, Point3::new(0.0, volume.max.y, local.z)),
                    ((local.z - volume.min.z).abs(), -anchor_up, Point3::new(0.0, local.y, volume.min.z)),
                    ((local.z - volume.max.z).abs(), anchor_up, Point3::new(0.0, local.y, volume.max.z)),
                ];
                let mut shortest = f64::MAX;
                let mut nearest = (Vector3::zeros(), Point3::origin());
                for (distance, side_forward, edge) in sides {
                    if distance < shortest {
                        shortest = distance;
                        nearest = (side_forward, edge);
                    }
                }

                match method {
                    PositioningMethod::Center => {
                        forward = nearest.0;
                        position = anchor.position();
                    }
                    PositioningMethod::Edge => {
                        forward = nearest.0;
                        position = anchor.to_world(&nearest.1);
                    }
                    PositioningMethod::Default => {
                        position = anchor.to_world(&Point3::new(0.0, local.y, local.z));
                        forward = toward_origin();
                    }
                }
            }
            _ => {}
        }

        Some((hit.anchor, pose_from_xz(&position, &forward, &up)))
    }
}
