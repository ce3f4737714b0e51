// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Anchors: single semantic surfaces or volumes detected in a room.
//!
//! A plane anchor lies in its local YZ plane with the local X axis pointing
//! away from the room. A volume anchor has its local X axis pointing down, so
//! `volume.min.x` is its top and `volume.max.x` its bottom.

use nalgebra::{Point2, Point3, Vector3};
use uuid::Uuid;

use crate::keys::AnchorKey;
use crate::labels::{ComponentTypes, LabelFilter};
use crate::math::{forward_vector, point_in_polygon, Aabb2, Aabb3, Pose, INV_SQRT_2};

/// Triangle mesh attached to a global-mesh anchor, in anchor-local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalMesh {
    pub positions: Vec<Point3<f64>>,
    pub indices: Vec<u32>,
}

/// A detected or authored surface/volume with semantic labels.
#[derive(Debug, Clone)]
pub struct Anchor {
    pub uuid: Uuid,
    pub labels: Vec<String>,
    pub pose: Pose,
    /// Local-space bounding rectangle of the plane boundary (Y, Z).
    pub plane_bounds: Option<Aabb2>,
    /// Plane boundary polygon in local (Y, Z) coordinates.
    pub plane_boundary: Vec<Point2<f64>>,
    /// Local-space oriented box of a scene volume.
    pub volume_bounds: Option<Aabb3>,
    pub global_mesh: Option<GlobalMesh>,

    pub(crate) parent: Option<AnchorKey>,
    pub(crate) children: Vec<AnchorKey>,
    pub(crate) seat_poses: Vec<Pose>,
}

impl Anchor {
    /// Creates an anchor with no plane, volume or mesh.
    pub fn new<I, S>(uuid: Uuid, labels: I, pose: Pose) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            uuid,
            labels: labels.into_iter().map(Into::into).collect(),
            pose,
            plane_bounds: None,
            plane_boundary: Vec::new(),
            volume_bounds: None,
            global_mesh: None,
            parent: None,
            children: Vec::new(),
            seat_poses: Vec::new(),
        }
    }

    /// Attaches a plane. When `boundary` is empty the rectangle itself is used.
    pub fn with_plane(mut self, bounds: Aabb2, boundary: Vec<Point2<f64>>) -> Self {
        self.plane_boundary = if boundary.is_empty() {
            vec![
                bounds.min,
                Point2::new(bounds.max.x, bounds.min.y),
                bounds.max,
                Point2::new(bounds.min.x, bounds.max.y),
            ]
        } else {
            boundary
        };
        self.plane_bounds = Some(bounds);
        self
    }

    /// Attaches a plane whose bounds are derived from its boundary polygon.
    pub fn with_plane_boundary(self, boundary: Vec<Point2<f64>>) -> Self {
        match Aabb2::from_points(&boundary) {
            Some(bounds) => self.with_plane(bounds, boundary),
            None => self,
        }
    }

    pub fn with_volume(mut self, bounds: Aabb3) -> Self {
        self.volume_bounds = Some(bounds);
        self
    }

    pub fn with_global_mesh(mut self, mesh: GlobalMesh) -> Self {
        self.global_mesh = Some(mesh);
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The anchor this one rests on or hangs from, if any.
    pub fn parent(&self) -> Option<AnchorKey> {
        self.parent
    }

    pub fn children(&self) -> &[AnchorKey] {
        &self.children
    }

    /// Seat poses computed for couch anchors when the room is initialised.
    pub fn seat_poses(&self) -> &[Pose] {
        &self.seat_poses
    }

    pub fn component_types(&self) -> ComponentTypes {
        let mut types = ComponentTypes::empty();
        if self.plane_bounds.is_some() {
            types |= ComponentTypes::PLANE;
        }
        if self.volume_bounds.is_some() {
            types |= ComponentTypes::VOLUME;
        }
        if self.global_mesh.is_some() {
            types |= ComponentTypes::MESH;
        }
        types
    }

    /// Label test plus a check that the anchor carries one of the filter's
    /// component types.
    pub fn passes_label_filter(&self, filter: &LabelFilter) -> bool {
        filter.component_types.intersects(self.component_types()) && filter.passes(&self.labels)
    }

    /// World position of the anchor origin.
    pub fn position(&self) -> Point3<f64> {
        self.pose.translation.vector.into()
    }

    /// Room-facing normal of the plane (local -X in world space).
    pub fn plane_normal(&self) -> Vector3<f64> {
        -forward_vector(&self.pose)
    }

    /// Whether the plane lies flat (floor, ceiling, table top).
    pub fn is_horizontal(&self) -> bool {
        forward_vector(&self.pose).z.abs() >= INV_SQRT_2
    }

    pub fn to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        self.pose.transform_point(local)
    }

    pub fn to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        self.pose.inverse_transform_point(world)
    }

    /// Maps a point in plane space (local Y, Z) to world space.
    pub fn plane_to_world(&self, p: &Point2<f64>) -> Point3<f64> {
        self.to_world(&Point3::new(0.0, p.x, p.y))
    }

    /// Tests a plane-space point against the boundary polygon.
    pub fn is_position_in_boundary(&self, p: &Point2<f64>) -> bool {
        point_in_polygon(p, &self.plane_boundary)
    }

    /// Tests a world position against the volume box, grown by `tolerance`.
    ///
    /// With `test_vertical_bounds` unset the box is treated as infinitely tall.
    pub fn is_position_in_volume_bounds(
        &self,
        world: &Point3<f64>,
        test_vertical_bounds: bool,
        tolerance: f64,
    ) -> bool {
        let Some(volume) = &self.volume_bounds else {
            return false;
        };
        let local = self.to_local(world);
        let within = |v: f64, min: f64, max: f64| v >= min - tolerance && v <= max + tolerance;
        (!test_vertical_bounds || within(local.x, volume.min.x, volume.max.x))
            && within(local.y, volume.min.y, volume.max.y)
            && within(local.z, volume.min.z, volume.max.z)
    }

    /// Closest point on the plane rectangle or volume box, with its distance.
    ///
    /// Points inside a volume are their own closest point (distance zero).
    /// Returns `None` for anchors without a plane or volume.
    pub fn closest_surface_position(&self, world: &Point3<f64>) -> Option<(Point3<f64>, f64)> {
        let local = self.to_local(world);
        let mut best: Option<(Point3<f64>, f64)> = None;

        if let Some(plane) = &self.plane_bounds {
            let p = plane.closest_point(&Point2::new(local.y, local.z));
            let candidate = Point3::new(0.0, p.x, p.y);
            let distance = (candidate - local).norm();
            best = Some((candidate, distance));
        }
        if let Some(volume) = &self.volume_bounds {
            let candidate = volume.closest_point(&local);
            let distance = (candidate - local).norm();
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((candidate, distance));
            }
        }

        best.map(|(p, d)| (self.to_world(&p), d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::{FLOOR, TABLE};
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Translation3, UnitQuaternion};

    fn table() -> Anchor {
        // X axis pointing down: rotate +90° about Y.
        let rotation = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2);
        let pose = Isometry3::from_parts(Translation3::new(0.0, 0.0, 100.0), rotation);
        Anchor::new(Uuid::new_v4(), [TABLE], pose).with_volume(Aabb3::new(
            Point3::new(0.0, -50.0, -30.0),
            Point3::new(100.0, 50.0, 30.0),
        ))
    }

    #[test]
    fn volume_axis_points_down() {
        let a = table();
        assert_relative_eq!(forward_vector(&a.pose).z, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn volume_containment_with_and_without_vertical_test() {
        let a = table();
        // Inside the box (top at z=100, bottom at z=0).
        assert!(a.is_position_in_volume_bounds(&Point3::new(0.0, 10.0, 50.0), true, 0.0));
        // Above the box: only inside when vertical bounds are ignored.
        let above = Point3::new(0.0, 10.0, 150.0);
        assert!(!a.is_position_in_volume_bounds(&above, true, 0.0));
        assert!(a.is_position_in_volume_bounds(&above, false, 0.0));
        // Tolerance grows the box.
        let beside = Point3::new(0.0, 52.0, 50.0);
        assert!(!a.is_position_in_volume_bounds(&beside, true, 0.0));
        assert!(a.is_position_in_volume_bounds(&beside, true, 3.0));
    }

    #[test]
    fn closest_surface_of_volume() {
        let a = table();
        let (p, d) = a.closest_surface_position(&Point3::new(0.0, 0.0, 130.0)).unwrap();
        assert_relative_eq!(d, 30.0, epsilon = 1e-9);
        assert_relative_eq!(p.z, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn plane_boundary_defaults_to_rectangle() {
        let a = Anchor::new(Uuid::new_v4(), [FLOOR], Pose::identity()).with_plane(
            Aabb2::new(Point2::new(-1.0, -1.0), Point2::new(1.0, 1.0)),
            Vec::new(),
        );
        assert_eq!(a.plane_boundary.len(), 4);
        assert!(a.is_position_in_boundary(&Point2::new(0.5, 0.5)));
        assert!(!a.is_position_in_boundary(&Point2::new(1.5, 0.5)));
    }

    #[test]
    fn label_filter_checks_component_types() {
        let a = table();
        assert!(a.passes_label_filter(&LabelFilter::default()));
        let planes_only = LabelFilter::default().with_component_types(ComponentTypes::PLANE);
        assert!(!a.passes_label_filter(&planes_only));
    }
}
