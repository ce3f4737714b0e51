// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rooms: arena-owned collections of anchors bounding one physical space.
//!
//! The [`Room`] exclusively owns its anchors. Anchors live in a slot map with
//! stable generational keys; the room additionally keeps insertion order and
//! derived subsets (floors, ceilings, walls, seats) so queries can scan only
//! the anchors they care about. Parent/child links between anchors are keys
//! into the same arena and are scrubbed when an anchor is removed.

use nalgebra::{Point2, Point3, Vector2};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use uuid::Uuid;

use crate::anchor::Anchor;
use crate::config::SceneConfig;
use crate::keys::AnchorKey;
use crate::labels;
use crate::math::{lerp, polygon_area, polygon_centroid, Aabb3, Pose};

/// Scene model a room was captured with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SceneModel {
    #[default]
    V1,
    V2,
    V2FallbackV1,
}

/// One contiguous physical space and the anchors that bound and furnish it.
#[derive(Debug, Clone)]
pub struct Room {
    pub uuid: Uuid,
    pub pose: Pose,
    pub scene_model: SceneModel,

    config: SceneConfig,

    // Anchor storage and insertion order
    pub(crate) anchors: SlotMap<AnchorKey, Anchor>,
    pub(crate) order: Vec<AnchorKey>,

    // Derived subsets
    pub(crate) floors: Vec<AnchorKey>,
    pub(crate) ceilings: Vec<AnchorKey>,
    pub(crate) walls: Vec<AnchorKey>,
    pub(crate) seats: Vec<AnchorKey>,
    pub(crate) global_mesh: Option<AnchorKey>,

    // Cached geometry, rebuilt by `initialize`
    pub(crate) room_bounds: Option<Aabb3>,
    pub(crate) room_edges: Vec<Point3<f64>>,
    pub(crate) key_wall: Option<AnchorKey>,
}

impl Room {
    /// Creates an empty room.
    pub fn new(uuid: Uuid, config: SceneConfig) -> Self {
        Self {
            uuid,
            pose: Pose::identity(),
            scene_model: SceneModel::default(),
            config,
            anchors: SlotMap::with_key(),
            order: Vec::new(),
            floors: Vec::new(),
            ceilings: Vec::new(),
            walls: Vec::new(),
            seats: Vec::new(),
            global_mesh: None,
            room_bounds: None,
            room_edges: Vec::new(),
            key_wall: None,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn world_to_meters(&self) -> f64 {
        self.config.world_to_meters
    }

    // --- Anchor storage ---

    /// Adds an anchor and files it under the subsets its labels select.
    pub fn add_anchor(&mut self, anchor: Anchor) -> AnchorKey {
        tracing::info!(
            labels = %anchor.labels.join("-"),
            anchor = %anchor.uuid,
            room = %self.uuid,
            "Add anchor to room"
        );
        let key = self.anchors.insert(anchor);
        self.order.push(key);
        self.index_anchor(key);
        key
    }

    /// Removes an anchor, scrubbing it from every subset and every other
    /// anchor's parent/child links.
    pub fn remove_anchor(&mut self, key: AnchorKey) -> Option<Anchor> {
        let mut anchor = self.anchors.remove(key)?;
        self.order.retain(|k| *k != key);
        self.unindex_anchor(key);
        for other in self.anchors.values_mut() {
            if other.parent == Some(key) {
                other.parent = None;
            }
            other.children.retain(|k| *k != key);
        }
        anchor.parent = None;
        anchor.children.clear();
        tracing::info!(anchor = %anchor.uuid, room = %self.uuid, "Remove anchor from room");
        Some(anchor)
    }

    /// Re-files an anchor after its labels changed.
    pub(crate) fn reindex_anchor(&mut self, key: AnchorKey) {
        self.unindex_anchor(key);
        self.index_anchor(key);
    }

    fn index_anchor(&mut self, key: AnchorKey) {
        let Some(anchor) = self.anchors.get(key) else {
            return;
        };
        if anchor.has_label(labels::FLOOR) {
            self.floors.push(key);
        }
        if anchor.has_label(labels::CEILING) {
            self.ceilings.push(key);
        }
        if labels::WALL_LABELS.iter().any(|l| anchor.has_label(l)) {
            self.walls.push(key);
        }
        if anchor.has_label(labels::GLOBAL_MESH) {
            self.global_mesh = Some(key);
        }
        if anchor.has_label(labels::COUCH) {
            self.seats.push(key);
        }
    }

    fn unindex_anchor(&mut self, key: AnchorKey) {
        self.floors.retain(|k| *k != key);
        self.ceilings.retain(|k| *k != key);
        self.walls.retain(|k| *k != key);
        self.seats.retain(|k| *k != key);
        if self.global_mesh == Some(key) {
            self.global_mesh = None;
        }
        if self.key_wall == Some(key) {
            self.key_wall = None;
        }
    }

    pub fn anchor(&self, key: AnchorKey) -> Option<&Anchor> {
        self.anchors.get(key)
    }

    /// Mutable access to an anchor. Call [`Room::initialize`] after moving or
    /// reshaping anchors so cached bounds and the hierarchy are rebuilt.
    pub fn anchor_mut(&mut self, key: AnchorKey) -> Option<&mut Anchor> {
        self.anchors.get_mut(key)
    }

    /// All anchors in insertion order.
    pub fn anchors(&self) -> impl Iterator<Item = (AnchorKey, &Anchor)> + '_ {
        self.order
            .iter()
            .filter_map(move |&k| self.anchors.get(k).map(|a| (k, a)))
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn find_anchor_by_uuid(&self, uuid: &Uuid) -> Option<AnchorKey> {
        self.anchors().find(|(_, a)| a.uuid == *uuid).map(|(k, _)| k)
    }

    pub fn floor_anchors(&self) -> &[AnchorKey] {
        &self.floors
    }

    pub fn ceiling_anchors(&self) -> &[AnchorKey] {
        &self.ceilings
    }

    pub fn wall_anchors(&self) -> &[AnchorKey] {
        &self.walls
    }

    pub fn seat_anchors(&self) -> &[AnchorKey] {
        &self.seats
    }

    pub fn global_mesh_anchor(&self) -> Option<AnchorKey> {
        self.global_mesh
    }

    pub fn is_wall_anchor(&self, key: AnchorKey) -> bool {
        self.walls.contains(&key)
    }

    /// World bounds of the floor and ceiling outlines.
    pub fn room_bounds(&self) -> Option<&Aabb3> {
        self.room_bounds.as_ref()
    }

    /// Floor outline corners in world space, flattened to z = 0.
    pub fn room_edges(&self) -> &[Point3<f64>] {
        &self.room_edges
    }

    // --- Lifecycle ---

    /// Rebuilds every derived structure after anchors were added or changed.
    pub fn initialize(&mut self) {
        self.compute_room_bounds();
        self.compute_anchor_hierarchy();
        self.compute_seats();
        self.compute_room_edges();
        self.key_wall = None;
    }

    /// Removes all anchors and resets the room to an empty state.
    pub fn clear(&mut self) {
        self.anchors.clear();
        self.order.clear();
        self.floors.clear();
        self.ceilings.clear();
        self.walls.clear();
        self.seats.clear();
        self.global_mesh = None;
        self.room_bounds = None;
        self.room_edges.clear();
        self.key_wall = None;
    }

    pub fn compute_room_bounds(&mut self) {
        let outline = self
            .floors
            .iter()
            .chain(self.ceilings.iter())
            .filter_map(|&k| self.anchors.get(k))
            .flat_map(|a| a.plane_boundary.iter().map(move |p| a.plane_to_world(p)))
            .collect::<Vec<_>>();
        self.room_bounds = Aabb3::from_points(&outline);
    }

    pub fn compute_room_edges(&mut self) {
        if self.floors.is_empty() {
            tracing::warn!(room = %self.uuid, "Floor anchor not set, can not compute room edges");
            return;
        }
        if self.floors.len() > 1 {
            // Room edges are only defined for a single floor.
            return;
        }
        self.room_edges = self
            .floors
            .iter()
            .filter_map(|&k| self.anchors.get(k))
            .flat_map(|a| {
                a.plane_boundary.iter().map(move |p| {
                    let mut edge = a.plane_to_world(p);
                    edge.z = 0.0;
                    edge
                })
            })
            .collect();
    }

    // --- Label queries ---

    /// Whether every requested label occurs on some anchor. Each anchor label
    /// satisfies at most one request, so duplicates must occur twice.
    pub fn does_room_have<S: AsRef<str>>(&self, wanted: &[S]) -> bool {
        if wanted.is_empty() {
            return true;
        }
        let mut remaining: Vec<&str> = wanted.iter().map(AsRef::as_ref).collect();
        for (_, anchor) in self.anchors() {
            for label in &anchor.labels {
                if let Some(i) = remaining.iter().position(|r| *r == label.as_str()) {
                    remaining.remove(i);
                    if remaining.is_empty() {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn anchors_by_label(&self, label: &str) -> Vec<AnchorKey> {
        self.anchors()
            .filter(|(_, a)| a.has_label(label))
            .map(|(k, _)| k)
            .collect()
    }

    pub fn first_anchor_by_label(&self, label: &str) -> Option<AnchorKey> {
        self.anchors().find(|(_, a)| a.has_label(label)).map(|(k, _)| k)
    }

    /// The anchor with the given label covering the largest area: the plane
    /// rectangle, or for volumes the vertical Y×Z face.
    pub fn largest_surface(&self, label: &str) -> Option<AnchorKey> {
        let mut largest = None;
        let mut largest_area = 0.0;
        for (key, anchor) in self.anchors() {
            if !anchor.has_label(label) {
                continue;
            }
            let area = if let Some(plane) = &anchor.plane_bounds {
                plane.area()
            } else if let Some(volume) = &anchor.volume_bounds {
                let size = volume.size();
                size.y * size.z
            } else {
                0.0
            };
            if area > largest_area {
                largest_area = area;
                largest = Some(key);
            }
        }
        largest
    }

    /// The longest wall with no room corner behind it.
    ///
    /// `tolerance` absorbs anchor imprecision: an adjacent corner that sits a
    /// hair behind the wall plane is still accepted. The result is cached
    /// until the room is re-initialised.
    pub fn key_wall(&mut self, tolerance: f64) -> Option<AnchorKey> {
        if let Some(key) = self.key_wall {
            return Some(key);
        }

        let mut sorted: Vec<(AnchorKey, f64)> = self
            .walls
            .iter()
            .filter_map(|&k| {
                let a = self.anchors.get(k)?;
                Some((k, a.plane_bounds.map_or(0.0, |b| b.extent().x)))
            })
            .collect();
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        for &(key, _) in sorted.iter().rev() {
            let Some(wall) = self.anchors.get(key) else {
                continue;
            };
            let forward = -wall.plane_normal();
            let origin = wall.position();
            let no_points_behind = self.room_edges.iter().all(|corner| {
                let to_corner = (corner - origin) - forward * tolerance;
                (-forward).dot(&to_corner) >= 0.0
            });
            if no_points_behind {
                self.key_wall = Some(key);
                return Some(key);
            }
        }
        None
    }

    /// Area-weighted centre of the floor outlines. `z` picks the height as a
    /// fraction between the room's lowest and highest point.
    ///
    /// Returns the origin when the room lacks a floor or ceiling.
    pub fn compute_centroid(&self, z: f64) -> Point3<f64> {
        if self.floors.is_empty() || self.ceilings.is_empty() {
            return Point3::origin();
        }
        let z = z.clamp(0.0, 1.0);

        let mut total_area = 0.0;
        let mut centroid = Vector2::zeros();
        for anchor in self.floors.iter().filter_map(|&k| self.anchors.get(k)) {
            let local = polygon_centroid(&anchor.plane_boundary);
            let world = anchor.plane_to_world(&Point2::new(local.x, local.y));
            let weight = polygon_area(&anchor.plane_boundary) * anchor.plane_normal().z;
            centroid += Vector2::new(world.x, world.y) * weight;
            total_area += weight;
        }
        if total_area > 0.0 {
            centroid /= total_area;
        }

        let (min_z, max_z) = self
            .room_bounds
            .map_or((0.0, 0.0), |b| (b.min.z, b.max.z));
        Point3::new(centroid.x, centroid.y, lerp(min_z, max_z, z))
    }
}
