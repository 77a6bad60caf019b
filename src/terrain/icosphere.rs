//! Base icosahedron seeding and sphere projection.
//!
//! The root mesh is the regular icosahedron: 12 vertices, 20 faces, stored as
//! five depth-0 groups with no parent. Root neighbor links are wired by
//! matching directed edges, so the face table's winding is the only source of
//! truth for adjacency.
//!
//! [`project_new_midpoints`] is the standard `on_subdivide` hook for a bare
//! sphere: new edge midpoints are pushed out to the planet radius along their
//! direction from the center. Hosts that displace terrain replace it with
//! their own heightfield sampling, keeping the same contract (fill every
//! `is_new` midpoint, then refresh the group centers).

use std::collections::HashMap;

use nalgebra::Vector3;

use super::TerrainSkeleton;
use crate::algo::SubdivideEvent;
use crate::mesh::{TriId, VertexId};

/// The golden ratio.
const PHI: f64 = 1.618033988749894848204586834365638117720309179805762862135448622;

/// Un-normalized coordinates of the 12 icosahedron vertices.
const VERTICES: [[f64; 3]; 12] = [
    [0.0, -1.0, -PHI],
    [0.0, -1.0, PHI],
    [0.0, 1.0, -PHI],
    [0.0, 1.0, PHI],
    [-1.0, -PHI, 0.0],
    [-1.0, PHI, 0.0],
    [1.0, -PHI, 0.0],
    [1.0, PHI, 0.0],
    [-PHI, 0.0, -1.0],
    [-PHI, 0.0, 1.0],
    [PHI, 0.0, -1.0],
    [PHI, 0.0, 1.0],
];

/// The 20 faces, wound consistently outward.
const FACES: [[usize; 3]; 20] = [
    [0, 2, 10],
    [0, 10, 6],
    [0, 6, 4],
    [0, 4, 8],
    [0, 8, 2],
    [3, 1, 11],
    [3, 11, 7],
    [3, 7, 5],
    [3, 5, 9],
    [3, 9, 1],
    [2, 7, 10],
    [2, 5, 7],
    [8, 5, 2],
    [8, 9, 5],
    [4, 9, 8],
    [4, 1, 9],
    [6, 1, 4],
    [6, 11, 1],
    [10, 11, 6],
    [10, 7, 11],
];

/// Bound on how far displaced terrain at `depth` can protrude over a flat
/// triangle face, as a fraction of the planet radius.
///
/// Chord-sagitta bound: a triangle at depth `d` spans an arc of at most the
/// icosahedron edge arc halved `d` times, and the sphere (plus anything
/// standing on it) bulges over the chord's midplane by `1 - cos(arc / 2)`
/// radii. Monotonically decreasing with depth.
pub fn tower_over_horizon(depth: usize) -> f64 {
    let edge_arc = (1.0f64 / 5.0f64.sqrt()).acos();
    let half_arc = edge_arc / f64::powi(2.0, depth as i32 + 1);
    1.0 - half_arc.cos()
}

/// Seed `terrain` with the base icosahedron.
///
/// Creates the 12 vertices and five root groups, wires all 30 root edges,
/// writes fixed-point positions, unit normals, and the root tri centers.
pub(crate) fn seed(terrain: &mut TerrainSkeleton) {
    let radius_units = terrain.radius * terrain.unit_scale();

    let ids: [VertexId; 12] = std::array::from_fn(|_| terrain.skel.create_vertex());

    let mut tris: Vec<TriId> = Vec::with_capacity(20);
    for chunk in FACES.chunks(4) {
        let corners: [[VertexId; 3]; 4] =
            std::array::from_fn(|i| chunk[i].map(|v| ids[v]));
        let group = terrain.skel.create_root_group(corners);
        for sibling in 0..4 {
            tris.push(group.triangle(sibling));
        }
    }

    // Wire neighbors by matching directed edges: with consistent winding,
    // every edge appears once forward and once reversed.
    let mut edge_map: HashMap<(usize, usize), (TriId, usize)> = HashMap::new();
    for (face, &tri) in FACES.iter().zip(&tris) {
        for edge in 0..3 {
            let a = face[edge];
            let b = face[(edge + 1) % 3];
            if let Some(&(other, other_edge)) = edge_map.get(&(b, a)) {
                terrain.skel.connect(tri, edge, other, other_edge);
            } else {
                edge_map.insert((a, b), (tri, edge));
            }
        }
    }

    terrain.grow_to_capacity();
    for (raw, &id) in VERTICES.iter().zip(&ids) {
        let dir = Vector3::new(raw[0], raw[1], raw[2]).normalize();
        terrain.positions[id.index()] = dir.map(|c| (c * radius_units) as i64);
        terrain.normals[id.index()] = dir.map(|c| c as f32);
    }

    let groups: Vec<_> = terrain.skel.alive_groups().collect();
    for group in groups {
        terrain.calc_tri_centers(group);
    }
}

/// Standard `on_subdivide` hook for an undisplaced sphere.
///
/// Every freshly allocated midpoint is placed on the sphere surface along the
/// direction of its edge's midpoint, its normal set to that direction, and
/// the group's four centers are recomputed.
pub fn project_new_midpoints(event: &SubdivideEvent, terrain: &mut TerrainSkeleton) {
    let radius_units = terrain.radius * terrain.unit_scale();
    for edge in 0..3 {
        let midpoint = event.midpoints[edge];
        if !midpoint.is_new {
            continue;
        }
        let a = terrain.positions[event.corners[edge].index()];
        let b = terrain.positions[event.corners[(edge + 1) % 3].index()];
        let mid = a.map(|c| c / 2) + b.map(|c| c / 2);
        let dir = mid.map(|c| c as f64).normalize();
        terrain.positions[midpoint.id.index()] = dir.map(|c| (c * radius_units) as i64);
        terrain.normals[midpoint.id.index()] = dir.map(|c| c as f32);
    }
    terrain.calc_tri_centers(event.group);
}
