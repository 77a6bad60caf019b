//! Full-graph invariant checking.
//!
//! [`check_invariants`] walks every alive triangle and asserts the structural
//! rules the engines maintain incrementally. It is meant for test builds and
//! stress harnesses; the passes themselves never need it.

use crate::mesh::parent_edge_of;
use crate::terrain::TerrainSkeleton;

/// Assert every structural invariant of the skeleton.
///
/// Checked per triangle:
/// - neighbor links are symmetric;
/// - a missing neighbor link implies the parent's neighbor across the
///   corresponding edge exists and is *not* subdivided (otherwise the link
///   should have been installed);
/// - no leaf has two or more subdivided neighbors (Rule A);
/// - subdivided triangles have all three neighbors present (Rule B);
/// - center siblings are enclosed by their own group;
/// - the per-level frontier bit-vectors agree with a fresh scan.
///
/// # Panics
/// Panics with a description of the first violation found.
pub fn check_invariants(terrain: &TerrainSkeleton) {
    for group_id in terrain.skel.alive_groups() {
        let group = terrain.skel.group(group_id);
        for sibling in 0..4 {
            let tri = group_id.triangle(sibling);
            let triangle = &group.triangles[sibling];

            let mut subdivided_neighbors = 0;
            let mut leaf_neighbors = 0;
            for edge in 0..3 {
                let neighbor = triangle.neighbors[edge];
                if neighbor.is_valid() {
                    let back = terrain
                        .skel
                        .tri(neighbor)
                        .neighbors
                        .iter()
                        .position(|&n| n == tri);
                    assert!(
                        back.is_some(),
                        "asymmetric neighbor link {:?} <-> {:?}",
                        tri,
                        neighbor
                    );
                    if terrain.skel.is_subdivided(neighbor) {
                        subdivided_neighbors += 1;
                    } else {
                        leaf_neighbors += 1;
                    }
                } else {
                    assert_ne!(sibling, 3, "center sibling missing a link: {:?}", tri);
                    assert_ne!(edge, 1, "missing center link on corner child {:?}", tri);
                    assert!(
                        !triangle.is_subdivided(),
                        "Rule B violation: subdivided {:?} lacks an outer neighbor",
                        tri
                    );
                    let parent = group.parent;
                    assert!(parent.is_valid(), "root triangles always have neighbors: {:?}", tri);
                    let parent_neighbor =
                        terrain.skel.tri(parent).neighbors[parent_edge_of(sibling, edge)];
                    assert!(
                        parent_neighbor.is_valid(),
                        "Rule B violation at the parent of {:?}",
                        tri
                    );
                    assert!(
                        !terrain.skel.is_subdivided(parent_neighbor),
                        "{:?} should be linked across its outer edge",
                        tri
                    );
                }
            }

            if !triangle.is_subdivided() {
                assert!(
                    subdivided_neighbors < 2,
                    "Rule A violation: leaf {:?} has {} subdivided neighbors",
                    tri,
                    subdivided_neighbors
                );
            }

            if sibling == 3 && group.parent.is_valid() {
                for neighbor in triangle.neighbors {
                    assert_eq!(
                        neighbor.group(),
                        group_id,
                        "center sibling {:?} reaches outside its group",
                        tri
                    );
                }
            }

            // Frontier tables exist for depths 0..level_max; the deepest
            // triangles have no table of their own.
            let depth = group.depth as usize;
            if depth < terrain.levels.len() {
                let level = &terrain.levels[depth];
                if triangle.is_subdivided() {
                    assert_eq!(
                        level.has_non_subdivided_neighbor.test(tri.index()),
                        leaf_neighbors != 0,
                        "stale has_non_subdivided_neighbor for {:?}",
                        tri
                    );
                    assert!(
                        !level.has_subdivided_neighbor.test(tri.index()),
                        "has_subdivided_neighbor set on subdivided {:?}",
                        tri
                    );
                } else {
                    assert_eq!(
                        level.has_subdivided_neighbor.test(tri.index()),
                        subdivided_neighbors != 0,
                        "stale has_subdivided_neighbor for {:?}",
                        tri
                    );
                    assert!(
                        !level.has_non_subdivided_neighbor.test(tri.index()),
                        "has_non_subdivided_neighbor set on leaf {:?}",
                        tri
                    );
                }
            }
        }
    }
}
