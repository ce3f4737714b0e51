// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounding boxes, polygon helpers and pose utilities.
//!
//! Engine space is X forward, Y right, Z up. Poses are rigid
//! (`Isometry3`), so inverse transforms are exact.

use nalgebra::{Isometry3, Matrix3, Point2, Point3, Rotation3, UnitQuaternion, Vector2, Vector3};

/// Rigid transform of an anchor or room.
pub type Pose = Isometry3<f64>;

/// Cosine threshold above which two unit normals count as the same direction.
pub const NORMALS_PARALLEL_THRESHOLD: f64 = 0.999845;

/// `1 / sqrt(2)`: the cosine of 45°.
pub const INV_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// An axis-aligned 2D box in an anchor's plane space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb2 {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Aabb2 {
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self { min, max }
    }

    /// Smallest box containing all points, or `None` for an empty slice.
    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bounds = Self::new(*first, *first);
        for p in rest {
            bounds.min = bounds.min.inf(p);
            bounds.max = bounds.max.sup(p);
        }
        Some(bounds)
    }

    pub fn size(&self) -> Vector2<f64> {
        self.max - self.min
    }

    /// Half of the size.
    pub fn extent(&self) -> Vector2<f64> {
        self.size() * 0.5
    }

    pub fn area(&self) -> f64 {
        let size = self.size();
        size.x * size.y
    }

    pub fn center(&self) -> Point2<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn closest_point(&self, p: &Point2<f64>) -> Point2<f64> {
        p.sup(&self.min).inf(&self.max)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }
}

/// An axis-aligned 3D box, either in an anchor's local space (volume bounds)
/// or in world space (room bounds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb3 {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb3 {
    pub fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Grows the box to contain `p`.
    pub fn include(&mut self, p: &Point3<f64>) {
        self.min = self.min.inf(p);
        self.max = self.max.sup(p);
    }

    /// Smallest box containing all points, or `None` when there are none.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Point3<f64>>,
    {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Self::new(*first, *first);
        for p in iter {
            bounds.include(p);
        }
        Some(bounds)
    }

    pub fn size(&self) -> Vector3<f64> {
        self.max - self.min
    }

    /// Half of the size.
    pub fn extent(&self) -> Vector3<f64> {
        self.size() * 0.5
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    pub fn volume(&self) -> f64 {
        let size = self.size();
        size.x * size.y * size.z
    }

    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        p.sup(&self.min).inf(&self.max)
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self::new(self.min * factor, self.max * factor)
    }
}

/// Even-odd crossing test of a point against a closed polygon.
///
/// An empty or degenerate polygon contains nothing.
pub fn point_in_polygon(p: &Point2<f64>, polygon: &[Point2<f64>]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let a = &polygon[i];
        let b = &polygon[j];
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Unsigned polygon area (shoelace formula).
pub fn polygon_area(polygon: &[Point2<f64>]) -> f64 {
    signed_area(polygon).abs()
}

fn signed_area(polygon: &[Point2<f64>]) -> f64 {
    let n = polygon.len();
    let mut twice_area = 0.0;
    for i in 0..n {
        let p1 = &polygon[i];
        let p2 = &polygon[(i + 1) % n];
        twice_area += p1.x * p2.y - p2.x * p1.y;
    }
    twice_area * 0.5
}

/// Area centroid of a simple polygon.
///
/// Falls back to the vertex average when the polygon has no area.
pub fn polygon_centroid(polygon: &[Point2<f64>]) -> Point2<f64> {
    let n = polygon.len();
    if n == 0 {
        return Point2::origin();
    }
    let area = signed_area(polygon);
    if area.abs() < 1e-12 {
        let sum = polygon.iter().fold(Vector2::zeros(), |acc, p| acc + p.coords);
        return Point2::from(sum / n as f64);
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let p1 = &polygon[i];
        let p2 = &polygon[(i + 1) % n];
        let cross = p1.x * p2.y - p2.x * p1.y;
        cx += (p1.x + p2.x) * cross;
        cy += (p1.y + p2.y) * cross;
    }
    let factor = 1.0 / (6.0 * area);
    Point2::new(cx * factor, cy * factor)
}

/// Horizontal distance between two points, ignoring height.
pub fn dist_2d(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Normalizes `v`, returning zero for (near) zero-length input.
pub fn safe_normal(v: &Vector3<f64>) -> Vector3<f64> {
    let len = v.norm();
    if len < 1e-8 {
        Vector3::zeros()
    } else {
        v / len
    }
}

/// Whether two unit vectors point the same way.
pub fn coincident(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    a.dot(b) >= NORMALS_PARALLEL_THRESHOLD
}

/// The pose's local X axis in world space.
pub fn forward_vector(pose: &Pose) -> Vector3<f64> {
    pose.rotation * Vector3::x()
}

/// The pose's local Y axis in world space.
pub fn right_vector(pose: &Pose) -> Vector3<f64> {
    pose.rotation * Vector3::y()
}

/// The pose's local Z axis in world space.
pub fn up_vector(pose: &Pose) -> Vector3<f64> {
    pose.rotation * Vector3::z()
}

/// Rotation whose X axis is `forward` and whose Z axis is as close to `up`
/// as possible.
///
/// A degenerate forward falls back to world X; an up parallel to forward
/// falls back to world Y as the helper axis.
pub fn rotation_from_xz(forward: &Vector3<f64>, up: &Vector3<f64>) -> UnitQuaternion<f64> {
    let mut x = safe_normal(forward);
    if x == Vector3::zeros() {
        x = Vector3::x();
    }
    let mut y = up.cross(&x);
    if y.norm() < 1e-8 {
        y = Vector3::y() - x * x.dot(&Vector3::y());
        if y.norm() < 1e-8 {
            y = Vector3::z().cross(&x);
        }
    }
    let y = y.normalize();
    let z = x.cross(&y);
    let rotation = Rotation3::from_matrix_unchecked(Matrix3::from_columns(&[x, y, z]));
    UnitQuaternion::from_rotation_matrix(&rotation)
}

/// Builds a pose from a position and a rotation built by [`rotation_from_xz`].
pub fn pose_from_xz(position: &Point3<f64>, forward: &Vector3<f64>, up: &Vector3<f64>) -> Pose {
    Isometry3::from_parts(position.coords.into(), rotation_from_xz(forward, up))
}

/// Linear interpolation.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
