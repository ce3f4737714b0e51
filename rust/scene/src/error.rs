// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for scene operations.
//!
//! Spatial queries never fail; they degrade to "no match". Errors are only
//! raised by the discovery dispatcher, snapshot loading and configuration.

use uuid::Uuid;

/// Result type alias for scene operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or loading a scene.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An event referenced a room that has not been discovered.
    #[error("room not found: {0}")]
    RoomNotFound(Uuid),

    /// An event referenced an anchor that is not part of its room.
    #[error("anchor {anchor} not found in room {room}")]
    AnchorNotFound { room: Uuid, anchor: Uuid },

    /// A load was requested while another one is still running.
    #[error("a scene load is already in progress")]
    LoadInProgress,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
