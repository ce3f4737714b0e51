// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MRUK Inspect - summarise and query a JSON scene snapshot.
//!
//! Prints, for every room, its anchor counts, the anchor hierarchy, the
//! connected wall loop with texture coordinates and the key wall. Optional
//! flags run a raycast or draw random surface positions.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use mruk_scene::{Anchor, LabelFilter, PositioningMethod, Room, RoomKey, Scene, SceneConfig, SpawnLocation};
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect a scene snapshot")]
struct Args {
    /// Scene snapshot (JSON, metres)
    scene: PathBuf,

    /// Engine units per metre; overrides MRUK_WORLD_TO_METERS
    #[arg(long)]
    world_to_meters: Option<f64>,

    /// Ray as `ox,oy,oz,dx,dy,dz` in engine units
    #[arg(long, value_parser = parse_ray)]
    raycast: Option<Ray>,

    /// Number of random surface positions to draw from the current room
    #[arg(long, default_value_t = 0)]
    sample: usize,

    /// Seed for surface sampling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Surfaces eligible for sampling
    #[arg(long, value_enum, default_value_t = Location::Any)]
    spawn_location: Location,

    /// Minimum distance of sampled positions from surface edges
    #[arg(long, default_value_t = 0.0)]
    margin: f64,
}

#[derive(Debug, Clone, Copy)]
struct Ray {
    origin: Point3<f64>,
    direction: Vector3<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Location {
    Any,
    Vertical,
    Top,
    Hanging,
}

impl From<Location> for SpawnLocation {
    fn from(location: Location) -> Self {
        match location {
            Location::Any => SpawnLocation::AnySurface,
            Location::Vertical => SpawnLocation::VerticalSurfaces,
            Location::Top => SpawnLocation::OnTopOfSurface,
            Location::Hanging => SpawnLocation::HangingDown,
        }
    }
}

fn parse_ray(s: &str) -> Result<Ray, String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("invalid number '{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let [ox, oy, oz, dx, dy, dz] = values[..] else {
        return Err(format!("expected 6 comma-separated values, got {}", values.len()));
    };
    let direction = Vector3::new(dx, dy, dz);
    if direction.norm() == 0.0 {
        return Err("ray direction must not be zero".into());
    }
    Ok(Ray {
        origin: Point3::new(ox, oy, oz),
        direction: direction.normalize(),
    })
}

fn describe(anchor: &Anchor) -> String {
    format!("{} {}", anchor.labels.join("-"), anchor.uuid)
}

fn print_room(room: &mut Room, key_wall_tolerance: f64) {
    println!("Room {} ({:?})", room.uuid, room.scene_model);
    println!(
        "  anchors: {} (floors {}, ceilings {}, walls {}, seats {})",
        room.anchor_count(),
        room.floor_anchors().len(),
        room.ceiling_anchors().len(),
        room.wall_anchors().len(),
        room.seat_anchors().len()
    );
    if let Some(bounds) = room.room_bounds() {
        println!(
            "  bounds: ({:.1}, {:.1}, {:.1}) - ({:.1}, {:.1}, {:.1})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }

    println!("  hierarchy:");
    for (_, anchor) in room.anchors() {
        if anchor.children().is_empty() {
            continue;
        }
        println!("    {}", describe(anchor));
        for &child in anchor.children() {
            if let Some(child) = room.anchor(child) {
                println!("      - {}", describe(child));
            }
        }
    }

    println!("  wall loop:");
    for wall in room.compute_wall_mesh_uv_adjustments(&[]) {
        let Some(anchor) = room.anchor(wall.anchor) else {
            continue;
        };
        for uv in &wall.uvs {
            println!(
                "    {} offset ({:.3}, {:.3}) scale ({:.3}, {:.3})",
                describe(anchor),
                uv.offset.x,
                uv.offset.y,
                uv.scale.x,
                uv.scale.y
            );
        }
    }

    match room.key_wall(key_wall_tolerance) {
        Some(key) => {
            if let Some(anchor) = room.anchor(key) {
                println!("  key wall: {}", describe(anchor));
            }
        }
        None => println!("  key wall: none"),
    }
}

fn run_raycast(scene: &Scene, ray: &Ray) {
    let filter = LabelFilter::default();
    let Some((room_key, hit)) = scene.raycast(&ray.origin, &ray.direction, 0.0, &filter) else {
        println!("Raycast: no hit");
        return;
    };
    let Some(anchor) = scene.room(room_key).and_then(|r| r.anchor(hit.anchor)) else {
        return;
    };
    println!(
        "Raycast: {} at {:.1} ({:.1}, {:.1}, {:.1}), normal ({:.2}, {:.2}, {:.2})",
        describe(anchor),
        hit.distance,
        hit.position.x,
        hit.position.y,
        hit.position.z,
        hit.normal.x,
        hit.normal.y,
        hit.normal.z
    );

    if let Some((_, _, pose)) =
        scene.best_pose_from_raycast(&ray.origin, &ray.direction, 0.0, &filter, PositioningMethod::Default)
    {
        let t = pose.translation.vector;
        println!("  best pose: ({:.1}, {:.1}, {:.1})", t.x, t.y, t.z);
    }
    if let Some((room_key, anchor_key, pose)) = scene.try_get_closest_seat_pose(&ray.origin, &ray.direction) {
        if let Some(anchor) = scene.room(room_key).and_then(|r| r.anchor(anchor_key)) {
            let t = pose.translation.vector;
            println!("  closest seat: {} at ({:.1}, {:.1}, {:.1})", describe(anchor), t.x, t.y, t.z);
        }
    }
}

fn run_sampling(scene: &Scene, room_key: RoomKey, args: &Args) {
    let Some(room) = scene.room(room_key) else {
        return;
    };
    let mut rng = StdRng::seed_from_u64(args.seed);
    let filter = LabelFilter::default();
    println!("Samples ({:?}):", args.spawn_location);
    for _ in 0..args.sample {
        match room.generate_random_position_on_surface(&mut rng, args.spawn_location.into(), args.margin, &filter) {
            Some(sample) => {
                let label = room.anchor(sample.anchor).map(describe).unwrap_or_default();
                println!(
                    "  ({:.1}, {:.1}, {:.1}) on {}",
                    sample.position.x, sample.position.y, sample.position.z, label
                );
            }
            None => {
                println!("  no eligible surface");
                break;
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let mut config = SceneConfig::from_env();
    if let Some(world_to_meters) = args.world_to_meters {
        config.world_to_meters = world_to_meters;
    }
    let key_wall_tolerance = config.key_wall_tolerance;
    let mut scene = Scene::new(config)?;

    let json = std::fs::read_to_string(&args.scene)
        .with_context(|| format!("failed to read {}", args.scene.display()))?;
    scene
        .load_scene_from_json(&json)
        .with_context(|| format!("failed to load {}", args.scene.display()))?;
    tracing::info!(rooms = scene.room_count(), path = %args.scene.display(), "Loaded scene");

    if scene.room_count() == 0 {
        bail!("{} contains no rooms", args.scene.display());
    }

    let keys: Vec<RoomKey> = scene.rooms().map(|(k, _)| k).collect();
    for &key in &keys {
        if let Some(room) = scene.room_mut(key) {
            print_room(room, key_wall_tolerance);
        }
    }

    if let Some(ray) = &args.raycast {
        run_raycast(&scene, ray);
    }

    if args.sample > 0 {
        if let Some(current) = scene.current_room(None) {
            run_sampling(&scene, current, &args);
        }
    }

    Ok(())
}
