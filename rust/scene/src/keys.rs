// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Arena keys for rooms and anchors.
//!
//! Keys are created by `slotmap::SlotMap` and stay valid while other entries
//! are removed (generational indices), so a stale parent or child link can
//! never resolve to a different anchor.

use slotmap::new_key_type;

new_key_type! {
    /// Key for an anchor inside its room's arena.
    pub struct AnchorKey;

    /// Key for a room inside the scene.
    pub struct RoomKey;
}
