// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Discovery events and scene listeners.
//!
//! Discovery reports rooms and anchors in metres. The scene scales every
//! payload by its `world_to_meters` factor when the event is applied.

use nalgebra::{Point2, Translation3};
use uuid::Uuid;

use crate::anchor::{Anchor, GlobalMesh};
use crate::keys::{AnchorKey, RoomKey};
use crate::math::{Aabb2, Aabb3, Pose};
use crate::room::SceneModel;

/// Scales the translation of a pose, leaving its rotation untouched.
pub(crate) fn scale_pose(pose: &Pose, factor: f64) -> Pose {
    Pose::from_parts(Translation3::from(pose.translation.vector * factor), pose.rotation)
}

/// Room properties as reported by discovery, in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomAnchorData {
    pub uuid: Uuid,
    pub pose: Pose,
    pub scene_model: SceneModel,
}

impl RoomAnchorData {
    pub fn new(uuid: Uuid) -> Self {
        Self {
            uuid,
            pose: Pose::identity(),
            scene_model: SceneModel::default(),
        }
    }
}

/// Anchor properties as reported by discovery, in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAnchorData {
    pub uuid: Uuid,
    pub labels: Vec<String>,
    pub pose: Pose,
    pub plane_bounds: Option<Aabb2>,
    pub plane_boundary: Vec<Point2<f64>>,
    pub volume_bounds: Option<Aabb3>,
    pub global_mesh: Option<GlobalMesh>,
}

impl SceneAnchorData {
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
        }
    }

    pub fn with_plane(mut self, bounds: Aabb2, boundary: Vec<Point2<f64>>) -> Self {
        self.plane_bounds = Some(bounds);
        self.plane_boundary = boundary;
        self
    }

    pub fn with_volume(mut self, bounds: Aabb3) -> Self {
        self.volume_bounds = Some(bounds);
        self
    }

    pub fn with_global_mesh(mut self, mesh: GlobalMesh) -> Self {
        self.global_mesh = Some(mesh);
        self
    }

    /// Builds an anchor in engine units.
    pub fn to_anchor(&self, world_to_meters: f64) -> Anchor {
        let mut anchor = Anchor::new(self.uuid, self.labels.iter().cloned(), Pose::identity());
        self.apply_to(&mut anchor, world_to_meters);
        anchor
    }

    /// Overwrites an existing anchor's properties, keeping its hierarchy
    /// links and seats until the room is re-initialised.
    pub fn apply_to(&self, anchor: &mut Anchor, world_to_meters: f64) {
        anchor.uuid = self.uuid;
        anchor.labels = self.labels.clone();
        anchor.pose = scale_pose(&self.pose, world_to_meters);
        anchor.plane_bounds = self.plane_bounds.map(|b| b.scaled(world_to_meters));
        anchor.plane_boundary = self
            .plane_boundary
            .iter()
            .map(|p| p * world_to_meters)
            .collect();
        // A plane reported without a boundary uses its rectangle.
        if anchor.plane_boundary.is_empty() {
            if let Some(bounds) = anchor.plane_bounds {
                anchor.plane_boundary = vec![
                    bounds.min,
                    Point2::new(bounds.max.x, bounds.min.y),
                    bounds.max,
                    Point2::new(bounds.min.x, bounds.max.y),
                ];
            }
        }
        anchor.volume_bounds = self.volume_bounds.map(|b| b.scaled(world_to_meters));
        anchor.global_mesh = self.global_mesh.as_ref().map(|mesh| GlobalMesh {
            positions: mesh.positions.iter().map(|p| p * world_to_meters).collect(),
            indices: mesh.indices.clone(),
        });
    }

    /// Reads an anchor back into metres.
    pub fn from_anchor(anchor: &Anchor, world_to_meters: f64) -> Self {
        let m2w = 1.0 / world_to_meters;
        Self {
            uuid: anchor.uuid,
            labels: anchor.labels.clone(),
            pose: scale_pose(&anchor.pose, m2w),
            plane_bounds: anchor.plane_bounds.map(|b| b.scaled(m2w)),
            plane_boundary: anchor.plane_boundary.iter().map(|p| p * m2w).collect(),
            volume_bounds: anchor.volume_bounds.map(|b| b.scaled(m2w)),
            global_mesh: anchor.global_mesh.as_ref().map(|mesh| GlobalMesh {
                positions: mesh.positions.iter().map(|p| p * m2w).collect(),
                indices: mesh.indices.clone(),
            }),
        }
    }
}

/// A discovery callback, replayed into the scene by [`crate::Scene::dispatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum SceneEvent {
    /// A room was found; its anchors follow before [`SceneEvent::RoomAdded`].
    RoomDiscovered(RoomAnchorData),
    /// An anchor belonging to a discovered room.
    AnchorAdded { room: Uuid, anchor: SceneAnchorData },
    /// Every anchor of the room has been delivered.
    RoomAdded { room: Uuid },
    /// Room properties changed. `old_uuid` identifies the room before the change.
    RoomUpdated {
        old_uuid: Uuid,
        room: RoomAnchorData,
        significant: bool,
    },
    RoomRemoved { room: Uuid },
    /// Anchor properties changed. A significant change is broadcast to listeners.
    AnchorUpdated {
        room: Uuid,
        anchor: SceneAnchorData,
        significant: bool,
    },
    AnchorRemoved { room: Uuid, anchor: Uuid },
    /// The discovery or load request finished.
    DiscoveryFinished { success: bool },
}

/// Observer of scene changes. Every method defaults to doing nothing.
///
/// Removal callbacks fire before the room or anchor is dropped, so the key
/// still resolves inside the callback.
pub trait SceneListener {
    fn on_room_created(&mut self, _room: RoomKey) {}

    fn on_room_updated(&mut self, _room: RoomKey) {}

    fn on_room_removed(&mut self, _room: RoomKey) {}

    fn on_anchor_created(&mut self, _room: RoomKey, _anchor: AnchorKey) {}

    fn on_anchor_updated(&mut self, _room: RoomKey, _anchor: AnchorKey) {}

    fn on_anchor_removed(&mut self, _room: RoomKey, _anchor: AnchorKey) {}

    fn on_scene_loaded(&mut self, _success: bool) {}
}
