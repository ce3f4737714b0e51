// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON snapshots of a scene.
//!
//! Snapshots are in metres, like discovery data. Loading a snapshot replaces
//! the current rooms and replays it through [`Scene::dispatch`] as a
//! discovery run, so listeners see the same callbacks a device scan produces.

use nalgebra::{Point2, Point3, Quaternion, Translation3, UnitQuaternion};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anchor::GlobalMesh;
use crate::error::{Error, Result};
use crate::events::{RoomAnchorData, SceneAnchorData, SceneEvent};
use crate::math::{Aabb2, Aabb3, Pose};
use crate::room::SceneModel;
use crate::scene::Scene;

/// Serializable representation of every room in a scene.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    pub rooms: Vec<RoomSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub uuid: Uuid,
    #[serde(default)]
    pub scene_model: SceneModel,
    #[serde(default)]
    pub pose: PoseSnapshot,
    pub anchors: Vec<AnchorSnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorSnapshot {
    pub uuid: Uuid,
    pub labels: Vec<String>,
    pub pose: PoseSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<RectSnapshot>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub boundary: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<BoxSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshSnapshot>,
}

/// Position and rotation. The rotation is a quaternion in `[x, y, z, w]` order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoseSnapshot {
    pub position: [f64; 3],
    pub rotation: [f64; 4],
}

impl Default for PoseSnapshot {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectSnapshot {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxSnapshot {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub positions: Vec<[f64; 3]>,
    pub indices: Vec<u32>,
}

impl From<&Pose> for PoseSnapshot {
    fn from(pose: &Pose) -> Self {
        let t = pose.translation.vector;
        let q = pose.rotation.coords;
        Self {
            position: [t.x, t.y, t.z],
            rotation: [q.x, q.y, q.z, q.w],
        }
    }
}

impl From<PoseSnapshot> for Pose {
    fn from(snap: PoseSnapshot) -> Self {
        let [x, y, z] = snap.position;
        let [qx, qy, qz, qw] = snap.rotation;
        let q = Quaternion::new(qw, qx, qy, qz);
        // A zero quaternion cannot be normalised.
        let rotation = if q.norm() > f64::EPSILON {
            UnitQuaternion::from_quaternion(q)
        } else {
            UnitQuaternion::identity()
        };
        Pose::from_parts(Translation3::new(x, y, z), rotation)
    }
}

impl AnchorSnapshot {
    fn from_data(data: &SceneAnchorData) -> Self {
        Self {
            uuid: data.uuid,
            labels: data.labels.clone(),
            pose: PoseSnapshot::from(&data.pose),
            plane: data.plane_bounds.map(|b| RectSnapshot {
                min: [b.min.x, b.min.y],
                max: [b.max.x, b.max.y],
            }),
            boundary: data.plane_boundary.iter().map(|p| [p.x, p.y]).collect(),
            volume: data.volume_bounds.map(|b| BoxSnapshot {
                min: [b.min.x, b.min.y, b.min.z],
                max: [b.max.x, b.max.y, b.max.z],
            }),
            mesh: data.global_mesh.as_ref().map(|mesh| MeshSnapshot {
                positions: mesh.positions.iter().map(|p| [p.x, p.y, p.z]).collect(),
                indices: mesh.indices.clone(),
            }),
        }
    }

    fn to_data(&self) -> SceneAnchorData {
        let mut data = SceneAnchorData::new(self.uuid, self.labels.iter().cloned(), self.pose.into());
        data.plane_bounds = self
            .plane
            .map(|r| Aabb2::new(Point2::from(r.min), Point2::from(r.max)));
        data.plane_boundary = self.boundary.iter().map(|&p| Point2::from(p)).collect();
        // Bounds can be derived from a bare boundary.
        if data.plane_bounds.is_none() {
            data.plane_bounds = Aabb2::from_points(&data.plane_boundary);
        }
        data.volume_bounds = self
            .volume
            .map(|b| Aabb3::new(Point3::from(b.min), Point3::from(b.max)));
        data.global_mesh = self.mesh.as_ref().map(|mesh| GlobalMesh {
            positions: mesh.positions.iter().map(|&p| Point3::from(p)).collect(),
            indices: mesh.indices.clone(),
        });
        data
    }
}

impl SceneSnapshot {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Discovery events that rebuild the snapshot's rooms, without the
    /// final `DiscoveryFinished`.
    pub fn to_events(&self) -> Vec<SceneEvent> {
        let mut events = Vec::new();
        for room in &self.rooms {
            events.push(SceneEvent::RoomDiscovered(RoomAnchorData {
                uuid: room.uuid,
                pose: room.pose.into(),
                scene_model: room.scene_model,
            }));
            for anchor in &room.anchors {
                events.push(SceneEvent::AnchorAdded {
                    room: room.uuid,
                    anchor: anchor.to_data(),
                });
            }
            events.push(SceneEvent::RoomAdded { room: room.uuid });
        }
        events
    }
}

impl Scene {
    /// Creates a snapshot of every room, in metres.
    pub fn to_snapshot(&self) -> SceneSnapshot {
        let w2m = self.config().world_to_meters;
        let rooms = self
            .rooms()
            .map(|(_, room)| RoomSnapshot {
                uuid: room.uuid,
                scene_model: room.scene_model,
                pose: PoseSnapshot::from(&crate::events::scale_pose(&room.pose, 1.0 / w2m)),
                anchors: room
                    .anchors()
                    .map(|(_, anchor)| AnchorSnapshot::from_data(&SceneAnchorData::from_anchor(anchor, w2m)))
                    .collect(),
            })
            .collect();
        SceneSnapshot { rooms }
    }

    /// Serializes the scene to a JSON string.
    pub fn save_scene_to_json(&self) -> Result<String> {
        self.to_snapshot().to_json()
    }

    /// Replaces the scene with the rooms of a JSON snapshot.
    ///
    /// Fails with [`Error::LoadInProgress`] while another load is running.
    /// Any other failure leaves the load status at `Failed`.
    pub fn load_scene_from_json(&mut self, json: &str) -> Result<()> {
        self.begin_load()?;
        let snapshot = match SceneSnapshot::from_json(json) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Failed to parse scene snapshot");
                self.fail_load();
                return Err(e);
            }
        };
        self.load_snapshot(&snapshot)
    }

    /// Replaces the scene with the rooms of a snapshot. The load status must
    /// already be `Busy`.
    fn load_snapshot(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        let existing: Vec<Uuid> = self.rooms().map(|(_, r)| r.uuid).collect();
        let removals = existing
            .into_iter()
            .map(|room| SceneEvent::RoomRemoved { room });
        for event in removals.chain(snapshot.to_events()) {
            if let Err(e) = self.dispatch(event) {
                tracing::error!(error = %e, "Failed to replay scene snapshot");
                self.fail_load();
                return Err(e);
            }
        }
        self.dispatch(SceneEvent::DiscoveryFinished { success: true })
    }
}
