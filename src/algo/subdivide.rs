//! Distance-driven refinement.
//!
//! Two rules keep the mesh crack-free while levels mix:
//!
//! - **Rule A** — no leaf triangle may have two or more subdivided neighbors
//!   at its own level. A second subdivided neighbor forces the leaf to
//!   subdivide immediately.
//! - **Rule B** — a corner child's same-level neighbor across the parent's
//!   edge must exist, i.e. the parent's neighbor across that edge must itself
//!   be subdivided. Subdividing a triangle whose outer neighbor is missing
//!   forces the parent's neighbor to subdivide first, which can pull the
//!   pass back to a shallower level mid-drain.
//!
//! [`subdivide_triangle`] applies one subdivision and everything it entails:
//! frontier-table upkeep, cross-group neighbor pairing, and the recursive
//! rule enforcement. [`subdivide_level_by_distance`] drains one level's
//! distance-test queue, and [`subdivide_pass`] runs a whole frame's
//! refinement from the 20 roots down.

use crate::algo::Scratchpad;
use crate::algo::SubdivideEvent;
use crate::mesh::{parent_edge_of, GroupSide, TriGroupId, TriId};
use crate::terrain::{is_distance_near, TerrainSkeleton, WorldVec};

/// Subdivide `tri` at level `lvl` and restore all invariants.
///
/// Creates (or reuses) the three edge midpoints, allocates the child group,
/// seeds the deeper distance queue when one exists, invokes the
/// `on_subdivide` hook, rewires neighbor links across every already
/// subdivided neighbor, and recursively subdivides wherever Rule A or Rule B
/// demands it. Rule B recursions mark the shallower level as needing another
/// drain via `scratch.level_need_process`.
///
/// # Panics
/// Panics when `tri` is already subdivided, or when a Rule B repair would be
/// needed at level 0 or for a center sibling (both impossible in a
/// consistent skeleton).
pub fn subdivide_triangle(
    terrain: &mut TerrainSkeleton,
    scratch: &mut Scratchpad,
    tri: TriId,
    lvl: usize,
    has_next_level: bool,
) -> TriGroupId {
    debug_assert!(terrain.skel.group_exists(tri.group()), "stale triangle {:?}", tri);

    // The skeleton call below rewires storage; snapshot what we need first.
    let snapshot = *terrain.skel.tri(tri);
    assert!(!snapshot.is_subdivided(), "{:?} is already subdivided", tri);
    let corners = snapshot.vertices;
    let neighbors = snapshot.neighbors;

    let midpoints = terrain.skel.vertex_create_middles(&corners);
    let group = terrain.skel.subdivide(tri, midpoints.map(|m| m.id));

    terrain.grow_to_capacity();
    scratch.grow(terrain.skel.group_capacity() * 4);

    if has_next_level {
        for sibling in 0..4 {
            let child = group.triangle(sibling);
            scratch.levels[lvl + 1].distance_test_next.push(child);
            scratch.distance_test_done.set(child.index());
        }
    }

    let event = SubdivideEvent { parent: tri, group, corners, midpoints };
    (scratch.on_subdivide)(&event, terrain);

    // Only leaves carry this bit.
    terrain.levels[lvl].has_subdivided_neighbor.clear_bit(tri.index());

    let mut has_leaf_neighbor = false;

    // Wire up against every existing neighbor.
    for edge in 0..3 {
        let neighbor = neighbors[edge];
        if !neighbor.is_valid() {
            continue;
        }
        let neighbor_children = terrain.skel.tri(neighbor).children;
        if neighbor_children.is_valid() {
            let neighbor_edge = terrain.skel.tri(neighbor).find_neighbor_index(tri);
            let pairings = terrain.skel.group_set_neighboring(
                GroupSide { group, edge },
                GroupSide { group: neighbor_children, edge: neighbor_edge },
            );

            if has_next_level {
                // A subdivided child across the new link is a frontier on
                // both sides of it.
                for pairing in pairings {
                    if terrain.skel.is_subdivided(pairing.theirs) {
                        let next_level = &mut terrain.levels[lvl + 1];
                        next_level.has_subdivided_neighbor.set(pairing.ours.index());
                        next_level.has_non_subdivided_neighbor.set(pairing.theirs.index());
                    }
                }
            }

            // The neighbor lost a leaf neighbor (us); recompute its frontier bit.
            let neighbor_tri = *terrain.skel.tri(neighbor);
            let any_leaf = neighbor_tri.neighbors.iter().any(|&other| {
                other.is_valid() && other != tri && !terrain.skel.is_subdivided(other)
            });
            let tables = &mut terrain.levels[lvl];
            if any_leaf {
                tables.has_non_subdivided_neighbor.set(neighbor.index());
            } else {
                tables.has_non_subdivided_neighbor.clear_bit(neighbor.index());
            }
        } else {
            has_leaf_neighbor = true;
            terrain.levels[lvl].has_subdivided_neighbor.set(neighbor.index());
        }
    }

    if has_leaf_neighbor {
        terrain.levels[lvl].has_non_subdivided_neighbor.set(tri.index());
    } else {
        terrain.levels[lvl].has_non_subdivided_neighbor.clear_bit(tri.index());
    }

    // Rule enforcement; these recursions can install new links on `tri`, so
    // re-read its neighbors every iteration.
    for edge in 0..3 {
        let neighbor = terrain.skel.tri(tri).neighbors[edge];
        if neighbor.is_valid() {
            if terrain.skel.is_subdivided(neighbor) {
                continue;
            }
            // Rule A: we just became the neighbor's subdivided neighbor; a
            // second one anywhere else forces it to subdivide too.
            let neighbor_tri = *terrain.skel.tri(neighbor);
            let other_subdivided = neighbor_tri.neighbors.iter().any(|&other| {
                other.is_valid() && other != tri && terrain.skel.is_subdivided(other)
            });
            if other_subdivided {
                subdivide_triangle(terrain, scratch, neighbor, lvl, has_next_level);
                scratch.grow(terrain.skel.group_capacity() * 4);
                scratch.distance_test_done.set(neighbor.index());
            } else if !scratch.distance_test_done.test(neighbor.index()) {
                // No violation; let the floodfill consider it.
                scratch.levels[lvl].distance_test_next.push(neighbor);
                scratch.distance_test_done.set(neighbor.index());
            }
        } else {
            // Rule B: our outer neighbor is missing because the parent's
            // neighbor across this edge is a leaf. Subdivide it now.
            assert_ne!(tri.sibling(), 3, "center triangles are always surrounded by their siblings");
            assert!(lvl > 0, "root triangles always have neighbors");

            let parent = terrain.skel.group(tri.group()).parent;
            assert!(parent.is_valid(), "non-root group must have a parent");

            let parent_edge = parent_edge_of(tri.sibling(), edge);
            let parent_neighbor = terrain.skel.tri(parent).neighbors[parent_edge];
            assert!(parent_neighbor.is_valid(), "parent-level neighbor must exist");

            subdivide_triangle(terrain, scratch, parent_neighbor, lvl - 1, true);
            scratch.distance_test_done.set(parent_neighbor.index());
            scratch.level_need_process = scratch.level_need_process.min(lvl - 1);
        }
    }

    group
}

/// Drain one level's distance-test queue, refining every near triangle.
///
/// Near triangles that are already subdivided forward their four children to
/// the deeper queue; near leaves subdivide. Whenever a Rule B repair pulls
/// `level_need_process` below `lvl`, the shallower level is drained to
/// completion before this one resumes.
///
/// # Panics
/// Panics unless `lvl == scratch.level_need_process`: levels must be
/// processed shallowest-first.
pub fn subdivide_level_by_distance(
    terrain: &mut TerrainSkeleton,
    scratch: &mut Scratchpad,
    pos: WorldVec,
    lvl: usize,
) {
    assert_eq!(lvl, scratch.level_need_process, "levels must be drained in order");
    let has_next_level = lvl + 1 < scratch.level_max;

    while !scratch.levels[lvl].distance_test_next.is_empty() {
        let mut processing = std::mem::take(&mut scratch.levels[lvl].distance_test_processing);
        std::mem::swap(&mut processing, &mut scratch.levels[lvl].distance_test_next);

        scratch.grow(terrain.skel.group_capacity() * 4);

        for &tri in &processing {
            debug_assert!(scratch.distance_test_done.test(tri.index()));
            let center = terrain.tri_centers[tri.index()];
            let near = is_distance_near(pos, center, scratch.threshold_subdiv[lvl]);
            scratch.distance_check_count += 1;

            if near {
                let children = terrain.skel.tri(tri).children;
                if children.is_valid() {
                    if has_next_level {
                        for sibling in 0..4 {
                            let child = children.triangle(sibling);
                            scratch.levels[lvl + 1].distance_test_next.push(child);
                            scratch.distance_test_done.set(child.index());
                        }
                    }
                } else {
                    subdivide_triangle(terrain, scratch, tri, lvl, has_next_level);
                }
            }

            // A Rule B repair shallowed the frontier; drain it first.
            while scratch.level_need_process != lvl {
                let shallower = scratch.level_need_process;
                subdivide_level_by_distance(terrain, scratch, pos, shallower);
            }
        }

        processing.clear();
        scratch.levels[lvl].distance_test_processing = processing;
    }

    assert_eq!(lvl, scratch.level_need_process);
    scratch.level_need_process += 1;
}

/// Run a whole frame's refinement for one observer position.
///
/// Seeds all 20 root triangles, then drains levels shallowest-first. Resets
/// the per-pass distance-check counter on entry and the `distance_test_done`
/// set on exit.
pub fn subdivide_pass(terrain: &mut TerrainSkeleton, scratch: &mut Scratchpad, pos: WorldVec) {
    scratch.distance_check_count = 0;
    scratch.level_need_process = 0;
    scratch.grow(terrain.skel.group_capacity() * 4);

    let roots: Vec<TriId> = terrain.skel.root_triangles().collect();
    for tri in roots {
        if !scratch.distance_test_done.test(tri.index()) {
            scratch.levels[0].distance_test_next.push(tri);
            scratch.distance_test_done.set(tri.index());
        }
    }

    for lvl in 0..scratch.level_max {
        subdivide_level_by_distance(terrain, scratch, pos, lvl);
    }

    scratch.distance_test_done.clear_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::check_invariants;
    use crate::terrain::{icosphere, TerrainConfig};

    fn planet(config: &TerrainConfig) -> (TerrainSkeleton, Scratchpad) {
        let terrain = TerrainSkeleton::new(config).unwrap();
        let mut scratch = Scratchpad::new(config);
        scratch.on_subdivide = Box::new(icosphere::project_new_midpoints);
        (terrain, scratch)
    }

    #[test]
    fn test_observer_at_planet_center_refines_nothing() {
        let config = TerrainConfig::geometric(3, 10, 100.0, 0.0)
            .with_thresholds(vec![3, 2, 1], vec![6, 4, 2]);
        let (mut terrain, mut scratch) = planet(&config);

        subdivide_pass(&mut terrain, &mut scratch, WorldVec::zeros());

        assert_eq!(terrain.skel.group_count(), 5);
        assert_eq!(scratch.distance_check_count, 20);
        check_invariants(&terrain);
    }

    #[test]
    fn test_single_root_subdivision_bit_pattern() {
        let config = TerrainConfig::geometric(3, 10, 100.0, 0.0);
        let (mut terrain, mut scratch) = planet(&config);

        let target = terrain.skel.root_triangles().next().unwrap();
        let pos = terrain.tri_centers[target.index()];

        // Pick a level-0 threshold that reaches only the target's center.
        let min_other = terrain
            .skel
            .root_triangles()
            .filter(|&t| t != target)
            .map(|t| {
                let d = terrain.tri_centers[t.index()] - pos;
                d.map(|c| c as f64).norm() as i64
            })
            .min()
            .unwrap();
        assert!(min_other > 4);
        scratch.threshold_subdiv = vec![min_other - 1, 2, 1];
        scratch.threshold_unsubdiv = vec![(min_other - 1) * 2, 4, 2];

        subdivide_pass(&mut terrain, &mut scratch, pos);

        assert_eq!(terrain.skel.group_count(), 6, "exactly one new group");
        assert!(terrain.skel.is_subdivided(target));
        // 20 roots tested, plus the 4 new children at level 1.
        assert_eq!(scratch.distance_check_count, 24);

        let level0 = &terrain.levels[0];
        assert_eq!(level0.has_subdivided_neighbor.count_ones(), 3);
        for neighbor in terrain.skel.tri(target).neighbors {
            assert!(!terrain.skel.is_subdivided(neighbor));
            assert!(level0.has_subdivided_neighbor.test(neighbor.index()));
        }
        assert_eq!(level0.has_non_subdivided_neighbor.count_ones(), 1);
        assert!(level0.has_non_subdivided_neighbor.test(target.index()));

        check_invariants(&terrain);
    }

    #[test]
    fn test_rule_a_forces_shared_neighbor() {
        let config = TerrainConfig::geometric(2, 10, 100.0, 0.0);
        let (mut terrain, mut scratch) = planet(&config);

        let pinched = terrain.skel.root_triangles().next().unwrap();
        let [first, second, _] = terrain.skel.tri(pinched).neighbors;

        subdivide_triangle(&mut terrain, &mut scratch, first, 0, true);
        assert!(!terrain.skel.is_subdivided(pinched), "one subdivided neighbor is fine");

        // The second subdivision gives `pinched` two subdivided neighbors;
        // Rule A must subdivide it without any distance involvement.
        subdivide_triangle(&mut terrain, &mut scratch, second, 0, true);
        assert!(terrain.skel.is_subdivided(pinched));

        check_invariants(&terrain);
    }

    #[test]
    fn test_rule_b_forces_parent_neighbors() {
        let config = TerrainConfig::geometric(4, 10, 100.0, 0.0);
        let (mut terrain, mut scratch) = planet(&config);

        // Hover just above a base vertex: the deepest levels demand
        // neighbors that only exist after Rule B repairs.
        let pos = terrain.positions[0];
        subdivide_pass(&mut terrain, &mut scratch, pos);
        check_invariants(&terrain);

        // At least one triangle must have been subdivided despite sitting
        // outside its level's distance threshold.
        let mut forced = 0usize;
        for group_id in terrain.skel.alive_groups().collect::<Vec<_>>() {
            let depth = terrain.skel.group(group_id).depth as usize;
            if depth >= scratch.level_max {
                continue;
            }
            for sibling in 0..4 {
                let tri = group_id.triangle(sibling);
                if terrain.skel.is_subdivided(tri)
                    && !is_distance_near(
                        pos,
                        terrain.tri_centers[tri.index()],
                        scratch.threshold_subdiv[depth],
                    )
                {
                    forced += 1;
                }
            }
        }
        assert!(forced > 0, "expected rule-driven subdivisions beyond the thresholds");
    }

    #[test]
    fn test_repeat_pass_is_stable() {
        let config = TerrainConfig::geometric(3, 10, 100.0, 0.0);
        let (mut terrain, mut scratch) = planet(&config);

        let pos = terrain.positions[3];
        subdivide_pass(&mut terrain, &mut scratch, pos);
        let groups_after_first = terrain.skel.group_count();
        check_invariants(&terrain);

        subdivide_pass(&mut terrain, &mut scratch, pos);
        assert_eq!(terrain.skel.group_count(), groups_after_first);
        check_invariants(&terrain);
    }
}
