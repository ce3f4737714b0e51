// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Semantic labels and label filters.

use bitflags::bitflags;

pub const FLOOR: &str = "FLOOR";
pub const CEILING: &str = "CEILING";
pub const WALL_FACE: &str = "WALL_FACE";
pub const INVISIBLE_WALL_FACE: &str = "INVISIBLE_WALL_FACE";
pub const INNER_WALL_FACE: &str = "INNER_WALL_FACE";
pub const OTHER_ROOM_FACE: &str = "OTHER_ROOM_FACE";
pub const TABLE: &str = "TABLE";
pub const COUCH: &str = "COUCH";
pub const DOOR_FRAME: &str = "DOOR_FRAME";
pub const WINDOW_FRAME: &str = "WINDOW_FRAME";
pub const OTHER: &str = "OTHER";
pub const STORAGE: &str = "STORAGE";
pub const BED: &str = "BED";
pub const SCREEN: &str = "SCREEN";
pub const LAMP: &str = "LAMP";
pub const PLANT: &str = "PLANT";
pub const WALL_ART: &str = "WALL_ART";
pub const GLOBAL_MESH: &str = "GLOBAL_MESH";
pub const TABLETOP: &str = "TABLETOP";
pub const SITTING_AREA: &str = "SITTING_AREA";
pub const SLEEPING_AREA: &str = "SLEEPING_AREA";
pub const STORAGE_TOP: &str = "STORAGE_TOP";
pub const UNKNOWN: &str = "UNKNOWN";

/// Labels that make an anchor part of the room's wall loop.
pub const WALL_LABELS: [&str; 4] = [WALL_FACE, INVISIBLE_WALL_FACE, INNER_WALL_FACE, OTHER_ROOM_FACE];

bitflags! {
    /// Geometric components an anchor may carry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ComponentTypes: u8 {
        const PLANE = 1 << 0;
        const VOLUME = 1 << 1;
        const MESH = 1 << 2;
    }
}

/// Selects anchors by semantic label and component type.
///
/// Excluded labels win over included ones. An empty include list accepts
/// every label that is not excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelFilter {
    pub included: Vec<String>,
    pub excluded: Vec<String>,
    pub component_types: ComponentTypes,
}

impl Default for LabelFilter {
    fn default() -> Self {
        Self {
            included: Vec::new(),
            excluded: Vec::new(),
            component_types: ComponentTypes::all(),
        }
    }
}

impl LabelFilter {
    /// A filter that only accepts the given labels.
    pub fn including<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            included: labels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// A filter that accepts everything except the given labels.
    pub fn excluding<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: labels.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Returns a copy restricted to the given component types.
    pub fn with_component_types(mut self, types: ComponentTypes) -> Self {
        self.component_types = types;
        self
    }

    /// Tests a label set against the include/exclude lists.
    pub fn passes<S: AsRef<str>>(&self, labels: &[S]) -> bool {
        let has = |wanted: &String| labels.iter().any(|l| l.as_ref() == wanted);
        if self.excluded.iter().any(has) {
            return false;
        }
        if self.included.is_empty() {
            return true;
        }
        self.included.iter().any(has)
    }
}
