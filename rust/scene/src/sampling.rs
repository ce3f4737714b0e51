// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Random placement on room surfaces and inside the room.
//!
//! Every operation takes the random number generator from the caller, so a
//! seeded generator reproduces the same placements.

use nalgebra::{Point2, Point3, Vector3};
use rand::Rng;

use crate::backend::GeometryBackend;
use crate::keys::AnchorKey;
use crate::labels::{self, LabelFilter};
use crate::math::{Aabb2, Aabb3};
use crate::room::Room;

/// Which surfaces are eligible for placement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpawnLocation {
    /// Every plane and every volume face.
    #[default]
    AnySurface,
    /// Walls and the side faces of volumes.
    VerticalSurfaces,
    /// Horizontal planes except ceilings, and volume tops.
    OnTopOfSurface,
    /// Ceilings and volume bottoms.
    HangingDown,
}

/// One face of a volume's local box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxSide {
    XPos,
    XNeg,
    YPos,
    YNeg,
    ZPos,
    ZNeg,
}

impl BoxSide {
    /// All sides in face-index order.
    pub const ALL: [BoxSide; 6] = [
        BoxSide::XPos,
        BoxSide::XNeg,
        BoxSide::YPos,
        BoxSide::YNeg,
        BoxSide::ZPos,
        BoxSide::ZNeg,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Outward normal in the volume's local space.
    pub fn normal(self) -> Vector3<f64> {
        match self {
            BoxSide::XPos => Vector3::x(),
            BoxSide::XNeg => -Vector3::x(),
            BoxSide::YPos => Vector3::y(),
            BoxSide::YNeg => -Vector3::y(),
            BoxSide::ZPos => Vector3::z(),
            BoxSide::ZNeg => -Vector3::z(),
        }
    }

    /// The face rectangle in the two local axes spanning it.
    pub fn face_bounds(self, volume: &Aabb3) -> Aabb2 {
        let (min, max) = (&volume.min, &volume.max);
        match self {
            BoxSide::XPos | BoxSide::XNeg => Aabb2::new(Point2::new(min.y, min.z), Point2::new(max.y, max.z)),
            BoxSide::YPos | BoxSide::YNeg => Aabb2::new(Point2::new(min.x, min.z), Point2::new(max.x, max.z)),
            BoxSide::ZPos | BoxSide::ZNeg => Aabb2::new(Point2::new(min.x, min.y), Point2::new(max.x, max.y)),
        }
    }

    /// Lifts a face-space point onto the face, in the volume's local space.
    pub fn face_to_local(self, p: &Point2<f64>, volume: &Aabb3) -> Point3<f64> {
        match self {
            BoxSide::XPos => Point3::new(volume.max.x, p.x, p.y),
            BoxSide::XNeg => Point3::new(volume.min.x, p.x, p.y),
            BoxSide::YPos => Point3::new(p.x, volume.max.y, p.y),
            BoxSide::YNeg => Point3::new(p.x, volume.min.y, p.y),
            BoxSide::ZPos => Point3::new(p.x, p.y, volume.max.z),
            BoxSide::ZNeg => Point3::new(p.x, p.y, volume.min.z),
        }
    }

    fn eligible(self, location: SpawnLocation) -> bool {
        match location {
            SpawnLocation::AnySurface => true,
            // Local X is vertical on volumes, so the X faces are top and bottom.
            SpawnLocation::VerticalSurfaces => self.index() >= 2,
            SpawnLocation::OnTopOfSurface => self == BoxSide::XNeg,
            SpawnLocation::HangingDown => self == BoxSide::XPos,
        }
    }
}

/// A sampling candidate: an anchor plane or one face of its volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub anchor: AnchorKey,
    /// Area left once the edge margin is removed on every side.
    pub usable_area: f64,
    /// Face-space rectangle (plane bounds or face bounds).
    pub bounds: Aabb2,
    /// The volume face, or `None` for a plane.
    pub side: Option<BoxSide>,
}

impl Surface {
    pub fn is_plane(&self) -> bool {
        self.side.is_none()
    }
}

/// A sampled placement point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Point3<f64>,
    pub normal: Vector3<f64>,
    pub anchor: AnchorKey,
}

/// Index chosen by walking the surfaces and subtracting their areas from
/// `value`. The last surface absorbs any rounding left over.
pub fn pick_weighted(surfaces: &[Surface], mut value: f64) -> usize {
    let last = surfaces.len().saturating_sub(1);
    for (index, surface) in surfaces[..last].iter().enumerate() {
        value -= surface.usable_area;
        if value <= 0.0 {
            return index;
        }
    }
    last
}

impl Room {
    /// Planes and volume faces eligible for `location` whose sides are both
    /// longer than twice `min_distance_to_edge`.
    pub fn collect_surfaces(
        &self,
        location: SpawnLocation,
        min_distance_to_edge: f64,
        filter: &LabelFilter,
    ) -> Vec<Surface> {
        let min_width = 2.0 * min_distance_to_edge;
        let usable = |bounds: &Aabb2| {
            let size = bounds.size();
            (size.x > min_width && size.y > min_width).then(|| (size.x - min_width) * (size.y - min_width))
        };

        let mut surfaces = Vec::new();
        for (key, anchor) in self.anchors() {
            if !filter.passes(&anchor.labels) {
                continue;
            }

            if let Some(bounds) = &anchor.plane_bounds {
                let horizontal = anchor.is_horizontal();
                let ceiling = anchor.has_label(labels::CEILING);
                let skip = match location {
                    SpawnLocation::AnySurface => false,
                    SpawnLocation::VerticalSurfaces => horizontal,
                    SpawnLocation::OnTopOfSurface => !horizontal || ceiling,
                    SpawnLocation::HangingDown => !ceiling,
                };
                if !skip {
                    if let Some(usable_area) = usable(bounds) {
                        surfaces.push(Surface {
                            anchor: key,
                            usable_area,
                            bounds: *bounds,
                            side: None,
                        });
                    }
                }
            }

            if let Some(volume) = &anchor.volume_bounds {
                for side in BoxSide::ALL {
                    if !side.eligible(location) {
                        continue;
                    }
                    let bounds = side.face_bounds(volume);
                    if let Some(usable_area) = usable(&bounds) {
                        surfaces.push(Surface {
                            anchor: key,
                            usable_area,
                            bounds,
                            side: Some(side),
                        });
                    }
                }
            }
        }
        surfaces
    }

    /// Area-weighted random point on the eligible surfaces, at least
    /// `min_distance_to_edge` away from their edges.
    ///
    /// Returns `None` when no surface qualifies or every attempt landed
    /// outside a plane's boundary polygon.
    pub fn generate_random_position_on_surface<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        location: SpawnLocation,
        min_distance_to_edge: f64,
        filter: &LabelFilter,
    ) -> Option<SurfaceSample> {
        let surfaces = self.collect_surfaces(location, min_distance_to_edge, filter);
        if surfaces.is_empty() {
            return None;
        }
        let total_area: f64 = surfaces.iter().map(|s| s.usable_area).sum();
        let margin = min_distance_to_edge;

        for _ in 0..self.config().surface_sample_iterations {
            let surface = &surfaces[pick_weighted(&surfaces, rng.gen_range(0.0..=total_area))];
            let Some(anchor) = self.anchor(surface.anchor) else {
                continue;
            };
            let bounds = &surface.bounds;
            let p = Point2::new(
                rng.gen_range(bounds.min.x + margin..=bounds.max.x - margin),
                rng.gen_range(bounds.min.y + margin..=bounds.max.y - margin),
            );

            match (surface.side, &anchor.volume_bounds) {
                (Some(side), Some(volume)) => {
                    return Some(SurfaceSample {
                        position: anchor.to_world(&side.face_to_local(&p, volume)),
                        normal: anchor.pose.rotation * side.normal(),
                        anchor: surface.anchor,
                    });
                }
                (Some(_), None) => continue,
                (None, _) => {
                    if !anchor.is_position_in_boundary(&p) {
                        continue;
                    }
                    return Some(SurfaceSample {
                        position: anchor.plane_to_world(&p),
                        normal: anchor.plane_normal(),
                        anchor: surface.anchor,
                    });
                }
            }
        }
        tracing::debug!(room = %self.uuid, surfaces = surfaces.len(), "No surface position found");
        None
    }

    /// Random point inside the room, at least `min_distance_to_surface` from
    /// every wall and, with `avoid_volumes`, outside every volume.
    pub fn generate_random_position_in_room<R: Rng + ?Sized>(
        &self,
        backend: &dyn GeometryBackend,
        rng: &mut R,
        min_distance_to_surface: f64,
        avoid_volumes: bool,
    ) -> Option<Point3<f64>> {
        if self.floors.is_empty() {
            return None;
        }
        let bounds = self.room_bounds?;
        // No point can satisfy a margin wider than half the room.
        if min_distance_to_surface > bounds.extent().min() {
            return None;
        }

        let margin = min_distance_to_surface;
        let walls = LabelFilter::including([labels::WALL_FACE]);
        for _ in 0..self.config().room_position_iterations {
            let position = Point3::new(
                rng.gen_range(bounds.min.x + margin..=bounds.max.x - margin),
                rng.gen_range(bounds.min.y + margin..=bounds.max.y - margin),
                rng.gen_range(bounds.min.z + margin..=bounds.max.z - margin),
            );
            if !self.is_position_in_room(backend, &position, true) {
                continue;
            }
            if margin > 0.0
                && self
                    .try_get_closest_surface_position(backend, &position, &walls, margin)
                    .is_some()
            {
                continue;
            }
            if avoid_volumes && self.is_position_in_scene_volume(&position, true, margin).is_some() {
                continue;
            }
            return Some(position);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchor::Anchor;
    use crate::backend::NativeGeometry;
    use crate::room::tests::{box_room, floor_pose};
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    fn furnished_room() -> (Room, AnchorKey) {
        let mut room = box_room(400.0, 300.0, 250.0);
        let mut pose = floor_pose(0.0);
        pose.translation.vector = Vector3::new(100.0, 50.0, 75.0);
        let table = room.add_anchor(Anchor::new(Uuid::new_v4(), [labels::TABLE], pose).with_volume(Aabb3::new(
            Point3::new(0.0, -40.0, -60.0),
            Point3::new(75.0, 40.0, 60.0),
        )));
        room.initialize();
        (room, table)
    }

    #[test]
    fn on_top_uses_horizontal_planes_and_volume_tops() {
        let (room, table) = furnished_room();
        let surfaces = room.collect_surfaces(SpawnLocation::OnTopOfSurface, 0.0, &LabelFilter::default());
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].anchor, room.floor_anchors()[0]);
        assert!(surfaces[0].is_plane());
        assert_eq!(surfaces[1].anchor, table);
        assert_eq!(surfaces[1].side, Some(BoxSide::XNeg));
    }

    #[test]
    fn hanging_down_uses_ceilings_and_volume_bottoms() {
        let (room, _) = furnished_room();
        let surfaces = room.collect_surfaces(SpawnLocation::HangingDown, 0.0, &LabelFilter::default());
        assert_eq!(surfaces.len(), 2);
        assert_eq!(surfaces[0].anchor, room.ceiling_anchors()[0]);
        assert_eq!(surfaces[1].side, Some(BoxSide::XPos));
    }

    #[test]
    fn vertical_uses_walls_and_side_faces() {
        let (room, _) = furnished_room();
        let surfaces = room.collect_surfaces(SpawnLocation::VerticalSurfaces, 0.0, &LabelFilter::default());
        let planes = surfaces.iter().filter(|s| s.is_plane()).count();
        assert_eq!(planes, 4);
        assert_eq!(surfaces.len() - planes, 4);
        assert_eq!(
            room.collect_surfaces(SpawnLocation::AnySurface, 0.0, &LabelFilter::default()).len(),
            12
        );
    }

    #[test]
    fn small_surfaces_are_dropped_by_margin() {
        let (room, table) = furnished_room();
        // Table top is 80 wide: a 40 margin leaves nothing.
        let surfaces = room.collect_surfaces(SpawnLocation::OnTopOfSurface, 40.0, &LabelFilter::default());
        assert!(surfaces.iter().all(|s| s.anchor != table));
        let surfaces = room.collect_surfaces(SpawnLocation::OnTopOfSurface, 10.0, &LabelFilter::default());
        let top = surfaces.iter().find(|s| s.anchor == table).unwrap();
        assert_relative_eq!(top.usable_area, 60.0 * 100.0);
    }

    #[test]
    fn pick_weighted_falls_back_to_last() {
        let surface = |area| Surface {
            anchor: AnchorKey::default(),
            usable_area: area,
            bounds: Aabb2::new(Point2::origin(), Point2::new(1.0, 1.0)),
            side: None,
        };
        let surfaces = [surface(1.0), surface(3.0)];
        assert_eq!(pick_weighted(&surfaces, 0.5), 0);
        assert_eq!(pick_weighted(&surfaces, 1.0), 0);
        assert_eq!(pick_weighted(&surfaces, 2.0), 1);
        assert_eq!(pick_weighted(&surfaces, 10.0), 1);
    }

    #[test]
    fn samples_on_table_top_respect_margin() {
        let (room, table) = furnished_room();
        let filter = LabelFilter::including([labels::TABLE]);
        let mut rng = StdRng::seed_from_u64(7);
        let anchor = room.anchor(table).unwrap();
        for _ in 0..200 {
            let sample = room
                .generate_random_position_on_surface(&mut rng, SpawnLocation::OnTopOfSurface, 10.0, &filter)
                .unwrap();
            assert_eq!(sample.anchor, table);
            assert_relative_eq!(sample.position.z, 75.0, epsilon = 1e-9);
            assert_relative_eq!(sample.normal.z, 1.0, epsilon = 1e-9);
            let local = anchor.to_local(&sample.position);
            assert!(local.y.abs() <= 30.0 + 1e-9);
            assert!(local.z.abs() <= 50.0 + 1e-9);
        }
    }

    #[test]
    fn samples_on_l_shaped_floor_stay_inside_boundary() {
        let mut room = Room::new(Uuid::new_v4(), Default::default());
        let boundary = vec![
            Point2::new(0.0, 0.0),
            Point2::new(400.0, 0.0),
            Point2::new(400.0, 200.0),
            Point2::new(200.0, 200.0),
            Point2::new(200.0, 400.0),
            Point2::new(0.0, 400.0),
        ];
        let floor = room.add_anchor(
            Anchor::new(Uuid::new_v4(), [labels::FLOOR], floor_pose(0.0)).with_plane_boundary(boundary),
        );
        room.initialize();

        let mut rng = StdRng::seed_from_u64(42);
        let anchor = room.anchor(floor).unwrap();
        for _ in 0..300 {
            let sample = room
                .generate_random_position_on_surface(&mut rng, SpawnLocation::AnySurface, 20.0, &LabelFilter::default())
                .unwrap();
            let local = anchor.to_local(&sample.position);
            let p = Point2::new(local.y, local.z);
            assert!(anchor.is_position_in_boundary(&p));
            assert!(p.x >= 20.0 - 1e-9 && p.x <= 380.0 + 1e-9);
            assert!(p.y >= 20.0 - 1e-9 && p.y <= 380.0 + 1e-9);
        }
    }

    #[test]
    fn no_eligible_surface_fails() {
        let (room, _) = furnished_room();
        let mut rng = StdRng::seed_from_u64(1);
        let filter = LabelFilter::including([labels::BED]);
        assert!(room
            .generate_random_position_on_surface(&mut rng, SpawnLocation::AnySurface, 0.0, &filter)
            .is_none());
    }

    #[test]
    fn random_room_position_keeps_clear_of_walls_and_volumes() {
        let (room, _) = furnished_room();
        let backend = NativeGeometry::new();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..50 {
            let p = room
                .generate_random_position_in_room(&backend, &mut rng, 20.0, true)
                .unwrap();
            assert!(p.x.abs() <= 180.0 + 1e-9);
            assert!(p.y.abs() <= 130.0 + 1e-9);
            assert!(room.is_position_in_scene_volume(&p, true, 20.0).is_none());
        }
    }

    #[test]
    fn random_room_position_rejects_oversized_margin() {
        let (room, _) = furnished_room();
        let mut rng = StdRng::seed_from_u64(3);
        // Half the room height is 125.
        assert!(room
            .generate_random_position_in_room(&NativeGeometry::new(), &mut rng, 126.0, false)
            .is_none());

        let empty = Room::new(Uuid::new_v4(), Default::default());
        assert!(empty
            .generate_random_position_in_room(&NativeGeometry::new(), &mut rng, 0.0, false)
            .is_none());
    }
}
