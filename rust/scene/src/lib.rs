// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # MRUK Scene
//!
//! Room and anchor model for mixed-reality scene understanding.
//!
//! A [`Scene`] holds the rooms reported by scene discovery. Each [`Room`]
//! owns its [`Anchor`]s (floors, ceilings, walls, furniture volumes, global
//! meshes) in a slot map, so parent/child links are generational keys that
//! cannot dangle. On top of that model the crate provides:
//!
//! - **Hierarchy inference**: wall art and doors under walls, furniture
//!   under floors, stacked volumes under the volume they rest on.
//! - **Surface sampling**: area-weighted random points on planes and volume
//!   faces, filtered by label and spawn location.
//! - **Spatial queries**: raycasts, closest surface, seat poses, placement
//!   poses, through a pluggable [`GeometryBackend`].
//! - **Room layout**: wall chaining and continuous texture coordinates
//!   around the wall loop, plus interior planning.
//! - **Discovery**: [`SceneEvent`]s applied by [`Scene::dispatch`] and JSON
//!   snapshots replayed through the same path.
//!
//! Lengths are engine units (centimetres by default); discovery data and
//! the geometry backend use metres.

pub mod anchor;
pub mod backend;
pub mod config;
pub mod error;
pub mod events;
pub mod hierarchy;
pub mod interior;
pub mod keys;
pub mod labels;
pub mod layout;
pub mod math;
pub mod query;
pub mod room;
pub mod sampling;
pub mod scene;
pub mod seats;
pub mod serialization;

pub use anchor::{Anchor, GlobalMesh};
pub use backend::{GeometryBackend, NativeGeometry, RawHit};
pub use config::SceneConfig;
pub use error::{Error, Result};
pub use events::{RoomAnchorData, SceneAnchorData, SceneEvent, SceneListener};
pub use interior::{FallbackToProcedural, InteriorPlacement, SelectionMode, SpawnActor, SpawnGroup};
pub use keys::{AnchorKey, RoomKey};
pub use labels::{ComponentTypes, LabelFilter};
pub use layout::{seamless_factor, AnchorPlaneUvs, PlaneUv, TexCoordModeU, TexCoordModeV, TexCoordModes};
pub use math::{Aabb2, Aabb3, Pose};
pub use query::{Hit, PositioningMethod, SurfacePoint};
pub use room::{Room, SceneModel};
pub use sampling::{BoxSide, SpawnLocation, Surface, SurfaceSample};
pub use scene::{LoadStatus, Scene};
pub use serialization::SceneSnapshot;
