// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Seat poses along couch anchors.

use nalgebra::{Point3, Vector3};

use crate::anchor::Anchor;
use crate::math::{pose_from_xz, safe_normal, Pose};
use crate::room::Room;

impl Room {
    /// Recomputes the seat poses of every seat anchor.
    pub fn compute_seats(&mut self) {
        let seat_width = self.config().seat_width;
        let mut total = 0usize;
        for &key in &self.seats {
            let Some(anchor) = self.anchors.get_mut(key) else {
                continue;
            };
            anchor.seat_poses = seat_poses(anchor, seat_width);
            total += anchor.seat_poses.len();
        }
        tracing::debug!(room = %self.uuid, seats = total, "Computed seat poses");
    }
}

/// Evenly spaced seats along the longer horizontal extent of the seating
/// surface. Each pose faces away from the back of the seat with Z up.
fn seat_poses(anchor: &Anchor, seat_width: f64) -> Vec<Pose> {
    // (local start, local step, local facing, count)
    let layout = if let Some(volume) = &anchor.volume_bounds {
        let size = volume.size();
        let top = volume.min.x;
        let center = volume.center();
        if size.y >= size.z {
            let count = seat_count(size.y, seat_width);
            let step = size.y / count as f64;
            Some((
                Point3::new(top, volume.min.y + step * 0.5, center.z),
                Vector3::new(0.0, step, 0.0),
                -Vector3::z(),
                count,
            ))
        } else {
            let count = seat_count(size.z, seat_width);
            let step = size.z / count as f64;
            Some((
                Point3::new(top, center.y, volume.min.z + step * 0.5),
                Vector3::new(0.0, 0.0, step),
                -Vector3::y(),
                count,
            ))
        }
    } else if let Some(plane) = &anchor.plane_bounds {
        let size = plane.size();
        let center = plane.center();
        if size.x >= size.y {
            let count = seat_count(size.x, seat_width);
            let step = size.x / count as f64;
            Some((
                Point3::new(0.0, plane.min.x + step * 0.5, center.y),
                Vector3::new(0.0, step, 0.0),
                -Vector3::x(),
                count,
            ))
        } else {
            let count = seat_count(size.y, seat_width);
            let step = size.y / count as f64;
            Some((
                Point3::new(0.0, center.x, plane.min.y + step * 0.5),
                Vector3::new(0.0, 0.0, step),
                -Vector3::x(),
                count,
            ))
        }
    } else {
        None
    };

    let Some((start, step, facing, count)) = layout else {
        return Vec::new();
    };

    let mut forward = anchor.pose.rotation * facing;
    forward.z = 0.0;
    let mut forward = safe_normal(&forward);
    if forward == Vector3::zeros() {
        // Flat seating plane: face along the plane's second axis instead.
        let mut fallback = anchor.pose.rotation * -Vector3::z();
        fallback.z = 0.0;
        forward = safe_normal(&fallback);
    }

    (0..count)
        .map(|i| {
            let local = start + step * i as f64;
            pose_from_xz(&anchor.to_world(&local), &forward, &Vector3::z())
        })
        .collect()
}

fn seat_count(length: f64, seat_width: f64) -> usize {
    ((length / seat_width).floor() as usize).max(1)
}
