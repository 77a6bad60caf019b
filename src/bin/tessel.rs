//! Tessel CLI - subdivision statistics for a synthetic flyby.
//!
//! Descends an observer from three radii out to the surface above a chosen
//! base vertex, running one full pass per frame and printing how the
//! triangle hierarchy responds.
//!
//! Run `tessel --help` for the available knobs.

use clap::Parser;

use tessel::prelude::*;
use tessel::terrain::icosphere;

#[derive(Parser)]
#[command(name = "tessel")]
#[command(version, about = "Terrain subdivision flyby statistics", long_about = None)]
struct Cli {
    /// Maximum subdivision depth
    #[arg(long, default_value = "6")]
    level_max: usize,

    /// Fixed-point scale exponent (units per meter = 2^scale)
    #[arg(long, default_value = "10")]
    scale: u32,

    /// Planet radius in meters
    #[arg(long, default_value = "6371000")]
    radius: f64,

    /// Maximum terrain elevation in meters
    #[arg(long, default_value = "9000")]
    height: f64,

    /// Number of descent frames
    #[arg(short, long, default_value = "16")]
    frames: usize,

    /// Base vertex to descend toward (0..12)
    #[arg(long, default_value = "0")]
    vertex: usize,

    /// Check all structural invariants after every frame
    #[arg(long)]
    check: bool,
}

fn main() {
    let cli = Cli::parse();

    let config = TerrainConfig::geometric(cli.level_max, cli.scale, cli.radius, cli.height);
    let mut terrain = match TerrainSkeleton::new(&config) {
        Ok(terrain) => terrain,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };
    let mut scratch = Scratchpad::new(&config);
    scratch.on_subdivide = Box::new(icosphere::project_new_midpoints);

    let surface = terrain.positions[cli.vertex.min(11)];

    for frame in 0..cli.frames.max(1) {
        // Ease from three radii out down to the surface.
        let progress = (frame + 1) as f64 / cli.frames.max(1) as f64;
        let factor = 3.0 - 2.0 * progress;
        let pos = surface.map(|c| (c as f64 * factor) as i64);

        update(&mut terrain, &mut scratch, pos);
        if cli.check {
            check_invariants(&terrain);
        }

        let mut per_level = vec![0usize; cli.level_max + 1];
        for group in terrain.skel.alive_groups() {
            per_level[terrain.skel.group(group).depth as usize] += 4;
        }

        println!(
            "frame {:>3}  altitude {:>12.0} m  checks {:>7}  groups {:>7}  tris/level {:?}",
            frame,
            (factor - 1.0) * cli.radius,
            scratch.distance_check_count,
            terrain.skel.group_count(),
            per_level,
        );
    }
}
