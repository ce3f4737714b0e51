// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wall chaining and texture coordinate layout for procedural wall meshes.

use nalgebra::{Point3, Vector2};

use crate::anchor::Anchor;
use crate::keys::AnchorKey;
use crate::labels;
use crate::math::dist_2d;
use crate::room::Room;

/// Length per texture repeat that divides `perimeter` into a whole number of
/// repeats close to `step`. At least one repeat is used.
pub fn seamless_factor(perimeter: f64, step: f64) -> f64 {
    let mut repeats = (perimeter / step).round();
    if repeats <= 0.0 || repeats.is_nan() {
        repeats = 1.0;
    }
    perimeter / repeats
}

/// Horizontal texture coordinate mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TexCoordModeU {
    /// The texture spans the whole wall loop once.
    #[default]
    Stretch,
    /// One repeat per metre.
    Metric,
    /// Roughly one repeat per metre, adjusted so the loop closes without a seam.
    MetricSeamless,
    /// Same scale as the vertical axis.
    MaintainAspectRatio,
    /// Vertical scale, adjusted so the loop closes without a seam.
    MaintainAspectRatioSeamless,
}

/// Vertical texture coordinate mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TexCoordModeV {
    /// The texture spans the wall height once.
    #[default]
    Stretch,
    /// One repeat per metre.
    Metric,
    /// Same scale as the horizontal axis.
    MaintainAspectRatio,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TexCoordModes {
    pub u: TexCoordModeU,
    pub v: TexCoordModeV,
}

impl TexCoordModes {
    pub fn new(u: TexCoordModeU, v: TexCoordModeV) -> Self {
        Self { u, v }
    }
}

/// UV offset and scale for one texture channel of a plane mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneUv {
    pub offset: Vector2<f64>,
    pub scale: Vector2<f64>,
}

/// Per-channel UV adjustments for one wall.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorPlaneUvs {
    pub anchor: AnchorKey,
    pub uvs: Vec<PlaneUv>,
}

fn plane_width(anchor: &Anchor) -> f64 {
    anchor.plane_bounds.map_or(0.0, |b| b.size().x)
}

/// World position of a wall's left (min) or right (max) edge at its origin height.
fn wall_edge(anchor: &Anchor, max: bool) -> Point3<f64> {
    let y = anchor
        .plane_bounds
        .map_or(0.0, |b| if max { b.max.x } else { b.min.x });
    anchor.to_world(&Point3::new(0.0, y, 0.0))
}

impl Room {
    /// Walls ordered so each one starts where the previous one ends.
    ///
    /// Starts from the last wall and greedily appends the wall whose left
    /// edge is horizontally nearest the chain's right edge.
    pub fn compute_connected_walls(&self) -> Vec<AnchorKey> {
        let mut remaining: Vec<AnchorKey> = self
            .walls
            .iter()
            .copied()
            .filter(|&k| self.anchors.contains_key(k))
            .collect();
        let Some(first) = remaining.pop() else {
            return Vec::new();
        };

        let mut connected = Vec::with_capacity(remaining.len() + 1);
        connected.push(first);
        let mut tail = first;
        while !remaining.is_empty() {
            let max_edge = wall_edge(&self.anchors[tail], true);
            let mut closest_index = 0;
            let mut closest_distance = f64::MAX;
            for (i, &key) in remaining.iter().enumerate() {
                let distance = dist_2d(&max_edge, &wall_edge(&self.anchors[key], false));
                if distance < closest_distance {
                    closest_distance = distance;
                    closest_index = i;
                }
            }
            tail = remaining.remove(closest_index);
            connected.push(tail);
        }
        connected
    }

    /// UV offsets and scales that tile textures continuously around the
    /// wall loop, one entry per texture channel in `modes`.
    ///
    /// Invisible walls take up space in the loop but get no entry. An empty
    /// `modes` slice means a single stretched channel.
    pub fn compute_wall_mesh_uv_adjustments(&self, modes: &[TexCoordModes]) -> Vec<AnchorPlaneUvs> {
        let walls = self.compute_connected_walls();
        let perimeter: f64 = walls.iter().map(|&k| plane_width(&self.anchors[k])).sum();
        let w2m = self.world_to_meters();
        let wall_height = self.room_bounds.map_or(0.0, |b| b.size().z);
        let seamless_w2m = seamless_factor(perimeter, w2m);

        let default_modes = [TexCoordModes::default()];
        let modes = if modes.is_empty() { &default_modes[..] } else { modes };

        let mut u_offset = 0.0;
        let mut adjusted = Vec::with_capacity(walls.len());
        for key in walls {
            let anchor = &self.anchors[key];
            let wall_width = plane_width(anchor);
            let uvs = modes
                .iter()
                .map(|mode| {
                    // V first: the aspect-preserving U modes depend on it.
                    let mut denominator_v = match mode.v {
                        TexCoordModeV::Metric => w2m,
                        TexCoordModeV::Stretch | TexCoordModeV::MaintainAspectRatio => wall_height,
                    };
                    let denominator_u = match mode.u {
                        TexCoordModeU::Stretch => perimeter,
                        TexCoordModeU::Metric => w2m,
                        TexCoordModeU::MetricSeamless => seamless_w2m,
                        TexCoordModeU::MaintainAspectRatio => denominator_v,
                        TexCoordModeU::MaintainAspectRatioSeamless => seamless_factor(perimeter, denominator_v),
                    };
                    if mode.v == TexCoordModeV::MaintainAspectRatio {
                        denominator_v = denominator_u;
                    }
                    PlaneUv {
                        offset: Vector2::new(u_offset / denominator_u, 0.0),
                        scale: Vector2::new(wall_width / denominator_u, wall_height / denominator_v),
                    }
                })
                .collect();
            if !anchor.has_label(labels::INVISIBLE_WALL_FACE) {
                adjusted.push(AnchorPlaneUvs { anchor: key, uvs });
            }
            u_offset += wall_width;
        }
        adjusted
    }
}
