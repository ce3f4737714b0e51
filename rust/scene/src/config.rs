// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scene configuration, optionally overridden from environment variables.

use crate::error::{Error, Result};

/// Tunables shared by every room of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneConfig {
    /// Engine units per metre (100 means centimetres).
    pub world_to_meters: f64,
    /// Distance an anchor may sit off its parent's surface and still be attached.
    pub offset_tolerance: f64,
    /// Attempts made by surface sampling before giving up.
    pub surface_sample_iterations: usize,
    /// Attempts made by random room position generation before giving up.
    pub room_position_iterations: usize,
    /// Width of a single seat along a couch, in engine units.
    pub seat_width: f64,
    /// Minimum dot product for a hit normal to count as pointing up.
    pub parallel_tolerance: f64,
    /// Slack used when checking whether room corners lie behind a wall.
    pub key_wall_tolerance: f64,
}

impl SceneConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            world_to_meters: env_or("MRUK_WORLD_TO_METERS", defaults.world_to_meters),
            offset_tolerance: env_or("MRUK_OFFSET_TOLERANCE", defaults.offset_tolerance),
            surface_sample_iterations: env_or(
                "MRUK_SURFACE_SAMPLE_ITERATIONS",
                defaults.surface_sample_iterations,
            ),
            room_position_iterations: env_or(
                "MRUK_ROOM_POSITION_ITERATIONS",
                defaults.room_position_iterations,
            ),
            seat_width: env_or("MRUK_SEAT_WIDTH", defaults.seat_width),
            parallel_tolerance: defaults.parallel_tolerance,
            key_wall_tolerance: env_or("MRUK_KEY_WALL_TOLERANCE", defaults.key_wall_tolerance),
        }
    }

    /// Checks that scales and tolerances are usable.
    pub fn validate(&self) -> Result<()> {
        if !(self.world_to_meters > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "world_to_meters must be positive, got {}",
                self.world_to_meters
            )));
        }
        if self.offset_tolerance < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "offset_tolerance must not be negative, got {}",
                self.offset_tolerance
            )));
        }
        if !(self.seat_width > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "seat_width must be positive, got {}",
                self.seat_width
            )));
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            world_to_meters: 100.0,
            offset_tolerance: 4.0,
            surface_sample_iterations: 1000,
            room_position_iterations: 2000,
            seat_width: 60.0,
            parallel_tolerance: 0.999,
            key_wall_tolerance: 0.1,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
