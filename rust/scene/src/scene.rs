// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The scene: every discovered room, the discovery dispatcher and queries
//! that span rooms.
//!
//! Rooms are created and mutated only through [`Scene::dispatch`], which
//! applies one discovery event at a time and then notifies listeners.

use nalgebra::{Point3, Vector3};
use rand::Rng;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{GeometryBackend, NativeGeometry};
use crate::config::SceneConfig;
use crate::error::{Error, Result};
use crate::events::{scale_pose, SceneEvent, SceneListener};
use crate::interior::{InteriorPlacement, SpawnGroup};
use crate::keys::{AnchorKey, RoomKey};
use crate::labels::LabelFilter;
use crate::math::Pose;
use crate::query::{Hit, PositioningMethod, SurfacePoint};
use crate::room::Room;

/// Progress of the most recent discovery or load request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LoadStatus {
    #[default]
    None,
    Busy,
    Complete,
    Failed,
}

/// All rooms of the current scene plus the collaborators queries need.
pub struct Scene {
    rooms: SlotMap<RoomKey, Room>,
    order: Vec<RoomKey>,
    config: SceneConfig,
    backend: Box<dyn GeometryBackend>,
    listeners: Vec<Box<dyn SceneListener>>,
    load_status: LoadStatus,
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("rooms", &self.order.len())
            .field("config", &self.config)
            .field("listeners", &self.listeners.len())
            .field("load_status", &self.load_status)
            .finish()
    }
}

impl Scene {
    /// Creates an empty scene backed by [`NativeGeometry`].
    pub fn new(config: SceneConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            rooms: SlotMap::with_key(),
            order: Vec::new(),
            config,
            backend: Box::new(NativeGeometry::new()),
            listeners: Vec::new(),
            load_status: LoadStatus::None,
        })
    }

    /// Replaces the geometry backend.
    pub fn with_backend(mut self, backend: Box<dyn GeometryBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn GeometryBackend {
        self.backend.as_ref()
    }

    pub fn add_listener(&mut self, listener: Box<dyn SceneListener>) {
        self.listeners.push(listener);
    }

    pub fn load_status(&self) -> LoadStatus {
        self.load_status
    }

    // --- Rooms ---

    pub fn room(&self, key: RoomKey) -> Option<&Room> {
        self.rooms.get(key)
    }

    /// Mutable access to a room. Call [`Room::initialize`] after changing
    /// its anchors.
    pub fn room_mut(&mut self, key: RoomKey) -> Option<&mut Room> {
        self.rooms.get_mut(key)
    }

    /// All rooms in discovery order.
    pub fn rooms(&self) -> impl Iterator<Item = (RoomKey, &Room)> + '_ {
        self.order
            .iter()
            .filter_map(move |&k| self.rooms.get(k).map(|r| (k, r)))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn find_room_by_uuid(&self, uuid: &Uuid) -> Option<RoomKey> {
        self.rooms().find(|(_, r)| r.uuid == *uuid).map(|(k, _)| k)
    }

    fn require_room(&self, uuid: &Uuid) -> Result<RoomKey> {
        self.find_room_by_uuid(uuid).ok_or(Error::RoomNotFound(*uuid))
    }

    fn remove_room(&mut self, key: RoomKey) -> Option<Room> {
        let room = self.rooms.remove(key)?;
        self.order.retain(|k| *k != key);
        info!(room = %room.uuid, anchors = room.anchor_count(), "Remove room");
        Some(room)
    }

    /// Drops every room and resets the load status.
    pub fn clear_scene(&mut self) {
        self.load_status = LoadStatus::None;
        self.rooms.clear();
        self.order.clear();
        info!("Cleared scene");
    }

    // --- Discovery ---

    /// Marks the start of a discovery or load request.
    pub fn begin_load(&mut self) -> Result<()> {
        if self.load_status == LoadStatus::Busy {
            return Err(Error::LoadInProgress);
        }
        self.load_status = LoadStatus::Busy;
        Ok(())
    }

    /// Ends a request that failed before discovery could report back.
    pub(crate) fn fail_load(&mut self) {
        self.load_status = LoadStatus::Failed;
        self.notify(|l| l.on_scene_loaded(false));
    }

    fn notify(&mut self, mut f: impl FnMut(&mut dyn SceneListener)) {
        for listener in self.listeners.iter_mut() {
            f(listener.as_mut());
        }
    }

    /// Applies one discovery event and notifies listeners.
    ///
    /// Events naming a room or anchor the scene does not know fail with
    /// [`Error::RoomNotFound`] or [`Error::AnchorNotFound`] and leave the
    /// scene untouched.
    pub fn dispatch(&mut self, event: SceneEvent) -> Result<()> {
        let w2m = self.config.world_to_meters;
        match event {
            SceneEvent::RoomDiscovered(data) => {
                let mut room = Room::new(data.uuid, self.config.clone());
                room.pose = scale_pose(&data.pose, w2m);
                room.scene_model = data.scene_model;
                let key = self.rooms.insert(room);
                self.order.push(key);
                info!(room = %data.uuid, "Discovered room");
            }
            SceneEvent::AnchorAdded { room, anchor } => {
                let room_key = self.require_room(&room)?;
                let anchor_key = self.rooms[room_key].add_anchor(anchor.to_anchor(w2m));
                self.notify(|l| l.on_anchor_created(room_key, anchor_key));
            }
            SceneEvent::RoomAdded { room } => {
                let key = self.require_room(&room)?;
                self.rooms[key].initialize();
                info!(room = %room, anchors = self.rooms[key].anchor_count(), "Room ready");
                self.notify(|l| l.on_room_created(key));
            }
            SceneEvent::RoomUpdated {
                old_uuid,
                room: data,
                significant,
            } => {
                let key = self.require_room(&old_uuid)?;
                let room = &mut self.rooms[key];
                room.uuid = data.uuid;
                room.pose = scale_pose(&data.pose, w2m);
                room.scene_model = data.scene_model;
                if significant {
                    room.initialize();
                    debug!(room = %data.uuid, "Room updated");
                    self.notify(|l| l.on_room_updated(key));
                }
            }
            SceneEvent::RoomRemoved { room } => {
                let key = self.require_room(&room)?;
                self.notify(|l| l.on_room_removed(key));
                self.remove_room(key);
            }
            SceneEvent::AnchorUpdated {
                room,
                anchor,
                significant,
            } => {
                let room_key = self.require_room(&room)?;
                let target = &mut self.rooms[room_key];
                let anchor_key = target.find_anchor_by_uuid(&anchor.uuid).ok_or(Error::AnchorNotFound {
                    room,
                    anchor: anchor.uuid,
                })?;
                if let Some(existing) = target.anchor_mut(anchor_key) {
                    anchor.apply_to(existing, w2m);
                }
                target.reindex_anchor(anchor_key);
                if significant {
                    self.notify(|l| l.on_anchor_updated(room_key, anchor_key));
                }
            }
            SceneEvent::AnchorRemoved { room, anchor } => {
                let room_key = self.require_room(&room)?;
                let anchor_key = self.rooms[room_key]
                    .find_anchor_by_uuid(&anchor)
                    .ok_or(Error::AnchorNotFound { room, anchor })?;
                self.notify(|l| l.on_anchor_removed(room_key, anchor_key));
                self.rooms[room_key].remove_anchor(anchor_key);
            }
            SceneEvent::DiscoveryFinished { success } => {
                self.load_status = if success {
                    LoadStatus::Complete
                } else {
                    LoadStatus::Failed
                };
                if success {
                    info!(rooms = self.room_count(), "Scene loaded");
                } else {
                    warn!("Scene discovery failed");
                }
                self.notify(|l| l.on_scene_loaded(success));
            }
        }
        Ok(())
    }

    // --- Queries across rooms ---

    /// The first room containing `head`, else the first room.
    pub fn current_room(&self, head: Option<&Point3<f64>>) -> Option<RoomKey> {
        if let Some(head) = head {
            let containing = self
                .rooms()
                .find(|(_, r)| r.is_position_in_room(self.backend(), head, true));
            if let Some((key, _)) = containing {
                return Some(key);
            }
        }
        self.order.first().copied()
    }

    /// Nearest hit over every room.
    pub fn raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Option<(RoomKey, Hit)> {
        let mut max_distance = max_distance;
        let mut nearest = None;
        for (key, room) in self.rooms() {
            if let Some(hit) = room.raycast(self.backend(), origin, direction, max_distance, filter) {
                // Later rooms must beat this hit.
                max_distance = hit.distance;
                nearest = Some((key, hit));
            }
        }
        nearest
    }

    /// Every hit over every room, grouped by room in discovery order.
    pub fn raycast_all(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
    ) -> Vec<(RoomKey, Hit)> {
        self.rooms()
            .flat_map(|(key, room)| {
                room.raycast_all(self.backend(), origin, direction, max_distance, filter)
                    .into_iter()
                    .map(move |hit| (key, hit))
            })
            .collect()
    }

    /// Closest anchor surface over every room. A non-positive `max_distance`
    /// is unbounded.
    pub fn try_get_closest_surface_position(
        &self,
        position: &Point3<f64>,
        filter: &LabelFilter,
        max_distance: f64,
    ) -> Option<(RoomKey, SurfacePoint)> {
        let mut max_distance = max_distance;
        let mut closest = None;
        for (key, room) in self.rooms() {
            if let Some(point) = room.try_get_closest_surface_position(self.backend(), position, filter, max_distance) {
                max_distance = point.distance;
                closest = Some((key, point));
            }
        }
        closest
    }

    /// Each room's best-aligned seat; among those, the one whose couch is
    /// nearest the ray origin wins.
    pub fn try_get_closest_seat_pose(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<(RoomKey, AnchorKey, Pose)> {
        let mut closest_distance_sq = f64::MAX;
        let mut closest = None;
        for (key, room) in self.rooms() {
            let Some((anchor_key, pose)) = room.try_get_closest_seat_pose(origin, direction) else {
                continue;
            };
            let Some(anchor) = room.anchor(anchor_key) else {
                continue;
            };
            let distance_sq = (origin - anchor.position()).norm_squared();
            if distance_sq < closest_distance_sq {
                closest_distance_sq = distance_sq;
                closest = Some((key, anchor_key, pose));
            }
        }
        closest
    }

    /// Placement pose from every room; the pose nearest the ray origin wins.
    pub fn best_pose_from_raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
        max_distance: f64,
        filter: &LabelFilter,
        method: PositioningMethod,
    ) -> Option<(RoomKey, AnchorKey, Pose)> {
        let mut closest_distance_sq = f64::MAX;
        let mut closest = None;
        for (key, room) in self.rooms() {
            let Some((anchor_key, pose)) =
                room.best_pose_from_raycast(self.backend(), origin, direction, max_distance, filter, method)
            else {
                continue;
            };
            let distance_sq = (origin.coords - pose.translation.vector).norm_squared();
            if distance_sq < closest_distance_sq {
                closest_distance_sq = distance_sq;
                closest = Some((key, anchor_key, pose));
            }
        }
        closest
    }

    /// First volume containing `position`, searching rooms in order.
    pub fn is_position_in_scene_volume(
        &self,
        position: &Point3<f64>,
        test_vertical_bounds: bool,
        tolerance: f64,
    ) -> Option<(RoomKey, AnchorKey)> {
        self.rooms().find_map(|(key, room)| {
            room.is_position_in_scene_volume(position, test_vertical_bounds, tolerance)
                .map(|anchor| (key, anchor))
        })
    }

    /// Key wall of the current room, using the configured tolerance.
    pub fn key_wall(&mut self, head: Option<&Point3<f64>>) -> Option<(RoomKey, AnchorKey)> {
        let key = self.current_room(head)?;
        let tolerance = self.config.key_wall_tolerance;
        let wall = self.rooms.get_mut(key)?.key_wall(tolerance)?;
        Some((key, wall))
    }

    /// Largest surface with `label` in the current room.
    pub fn largest_surface(&self, head: Option<&Point3<f64>>, label: &str) -> Option<(RoomKey, AnchorKey)> {
        let key = self.current_room(head)?;
        let anchor = self.rooms.get(key)?.largest_surface(label)?;
        Some((key, anchor))
    }

    /// Interior plans of every room, concatenated in room order.
    pub fn plan_interior<R: Rng + ?Sized>(
        &self,
        groups: &FxHashMap<String, SpawnGroup>,
        rng: &mut R,
        fallback_to_procedural: bool,
    ) -> Vec<(RoomKey, InteriorPlacement)> {
        let mut plan = Vec::new();
        for (key, room) in self.rooms() {
            plan.extend(
                room.plan_interior(groups, rng, fallback_to_procedural)
                    .into_iter()
                    .map(|placement| (key, placement)),
            );
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RoomAnchorData, SceneAnchorData};
    use crate::labels;
    use crate::math::{Aabb2, Aabb3};
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Point2, Translation3, UnitQuaternion};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn floor_data(height: f64, size: f64) -> SceneAnchorData {
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, height),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), std::f64::consts::FRAC_PI_2),
        );
        let half = size / 2.0;
        SceneAnchorData::new(Uuid::new_v4(), [labels::FLOOR], pose)
            .with_plane(Aabb2::new(Point2::new(-half, -half), Point2::new(half, half)), Vec::new())
    }

    fn ceiling_data(height: f64, size: f64) -> SceneAnchorData {
        let pose = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, height),
            UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -std::f64::consts::FRAC_PI_2),
        );
        let half = size / 2.0;
        SceneAnchorData::new(Uuid::new_v4(), [labels::CEILING], pose)
            .with_plane(Aabb2::new(Point2::new(-half, -half), Point2::new(half, half)), Vec::new())
    }

    /// Discovers a 4 m square room of height 2.5 m.
    fn discover_room(scene: &mut Scene) -> Uuid {
        let uuid = Uuid::new_v4();
        scene.dispatch(SceneEvent::RoomDiscovered(RoomAnchorData::new(uuid))).unwrap();
        for anchor in [floor_data(0.0, 4.0), ceiling_data(2.5, 4.0)] {
            scene
                .dispatch(SceneEvent::AnchorAdded { room: uuid, anchor })
                .unwrap();
        }
        scene.dispatch(SceneEvent::RoomAdded { room: uuid }).unwrap();
        uuid
    }

    #[derive(Default)]
    struct Recorder {
        events: Rc<RefCell<Vec<String>>>,
    }

    impl SceneListener for Recorder {
        fn on_room_created(&mut self, _room: RoomKey) {
            self.events.borrow_mut().push("room_created".into());
        }

        fn on_room_removed(&mut self, _room: RoomKey) {
            self.events.borrow_mut().push("room_removed".into());
        }

        fn on_anchor_created(&mut self, _room: RoomKey, _anchor: AnchorKey) {
            self.events.borrow_mut().push("anchor_created".into());
        }

        fn on_anchor_updated(&mut self, _room: RoomKey, _anchor: AnchorKey) {
            self.events.borrow_mut().push("anchor_updated".into());
        }

        fn on_anchor_removed(&mut self, _room: RoomKey, _anchor: AnchorKey) {
            self.events.borrow_mut().push("anchor_removed".into());
        }

        fn on_scene_loaded(&mut self, success: bool) {
            self.events.borrow_mut().push(format!("loaded:{success}"));
        }
    }

    #[test]
    fn discovery_builds_and_initialises_room() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        scene.add_listener(Box::new(Recorder { events: events.clone() }));

        let uuid = discover_room(&mut scene);
        scene.dispatch(SceneEvent::DiscoveryFinished { success: true }).unwrap();

        let key = scene.find_room_by_uuid(&uuid).unwrap();
        let room = scene.room(key).unwrap();
        assert_eq!(room.anchor_count(), 2);
        let bounds = room.room_bounds().unwrap();
        assert_relative_eq!(bounds.size().z, 250.0, epsilon = 1e-9);
        assert_relative_eq!(bounds.size().x, 400.0, epsilon = 1e-9);
        assert_eq!(scene.load_status(), LoadStatus::Complete);
        assert_eq!(
            *events.borrow(),
            ["anchor_created", "anchor_created", "room_created", "loaded:true"]
        );
    }

    #[test]
    fn unknown_uuids_are_errors() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let missing = Uuid::new_v4();
        let err = scene
            .dispatch(SceneEvent::RoomAdded { room: missing })
            .unwrap_err();
        assert!(matches!(err, Error::RoomNotFound(u) if u == missing));

        let room = discover_room(&mut scene);
        let err = scene
            .dispatch(SceneEvent::AnchorRemoved { room, anchor: missing })
            .unwrap_err();
        assert!(matches!(err, Error::AnchorNotFound { anchor, .. } if anchor == missing));
    }

    #[test]
    fn anchor_update_and_removal() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let events = Rc::new(RefCell::new(Vec::new()));
        let room = discover_room(&mut scene);
        scene.add_listener(Box::new(Recorder { events: events.clone() }));

        let table = SceneAnchorData::new(Uuid::new_v4(), [labels::TABLE], Pose::translation(0.0, 0.0, 0.7))
            .with_volume(Aabb3::new(Point3::new(0.0, -0.5, -0.5), Point3::new(0.7, 0.5, 0.5)));
        scene
            .dispatch(SceneEvent::AnchorAdded { room, anchor: table.clone() })
            .unwrap();

        // Relabelling to a couch files the anchor under seats.
        let mut couch = table.clone();
        couch.labels = vec![labels::COUCH.to_string()];
        scene
            .dispatch(SceneEvent::AnchorUpdated {
                room,
                anchor: couch,
                significant: true,
            })
            .unwrap();
        let key = scene.find_room_by_uuid(&room).unwrap();
        assert_eq!(scene.room(key).unwrap().seat_anchors().len(), 1);

        scene
            .dispatch(SceneEvent::AnchorRemoved { room, anchor: table.uuid })
            .unwrap();
        let r = scene.room(key).unwrap();
        assert_eq!(r.anchor_count(), 2);
        assert!(r.seat_anchors().is_empty());
        assert_eq!(*events.borrow(), ["anchor_created", "anchor_updated", "anchor_removed"]);
    }

    #[test]
    fn room_update_and_removal() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let old = discover_room(&mut scene);
        let renamed = Uuid::new_v4();
        let mut data = RoomAnchorData::new(renamed);
        data.pose = Pose::translation(1.0, 0.0, 0.0);
        scene
            .dispatch(SceneEvent::RoomUpdated {
                old_uuid: old,
                room: data,
                significant: true,
            })
            .unwrap();
        assert!(scene.find_room_by_uuid(&old).is_none());
        let key = scene.find_room_by_uuid(&renamed).unwrap();
        assert_relative_eq!(scene.room(key).unwrap().pose.translation.vector.x, 100.0);

        scene.dispatch(SceneEvent::RoomRemoved { room: renamed }).unwrap();
        assert_eq!(scene.room_count(), 0);
        assert!(scene.current_room(None).is_none());
    }

    #[test]
    fn load_while_busy_is_rejected() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        scene.begin_load().unwrap();
        assert!(matches!(scene.begin_load(), Err(Error::LoadInProgress)));
        scene.dispatch(SceneEvent::DiscoveryFinished { success: false }).unwrap();
        assert_eq!(scene.load_status(), LoadStatus::Failed);
        assert!(scene.begin_load().is_ok());

        scene.clear_scene();
        assert_eq!(scene.load_status(), LoadStatus::None);
    }

    #[test]
    fn current_room_prefers_the_one_containing_the_head() {
        let mut scene = Scene::new(SceneConfig::default()).unwrap();
        let first = discover_room(&mut scene);

        // A second room 10 m along +X.
        let second = Uuid::new_v4();
        scene.dispatch(SceneEvent::RoomDiscovered(RoomAnchorData::new(second))).unwrap();
        let mut floor = floor_data(0.0, 4.0);
        floor.pose.translation.vector.x = 10.0;
        let mut ceiling = ceiling_data(2.5, 4.0);
        ceiling.pose.translation.vector.x = 10.0;
        for anchor in [floor, ceiling] {
            scene.dispatch(SceneEvent::AnchorAdded { room: second, anchor }).unwrap();
        }
        scene.dispatch(SceneEvent::RoomAdded { room: second }).unwrap();

        let head = Point3::new(1000.0, 0.0, 160.0);
        let current = scene.current_room(Some(&head)).unwrap();
        assert_eq!(scene.room(current).unwrap().uuid, second);

        let outside = Point3::new(-5000.0, 0.0, 160.0);
        let current = scene.current_room(Some(&outside)).unwrap();
        assert_eq!(scene.room(current).unwrap().uuid, first);

        // Straight down from above the second room hits its floor only.
        let (room, hit) = scene
            .raycast(&Point3::new(1000.0, 0.0, 100.0), &-Vector3::z(), 0.0, &LabelFilter::default())
            .unwrap();
        assert_eq!(scene.room(room).unwrap().uuid, second);
        assert_relative_eq!(hit.distance, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SceneConfig {
            world_to_meters: -1.0,
            ..SceneConfig::default()
        };
        assert!(matches!(Scene::new(config), Err(Error::InvalidConfig(_))));
    }
}
