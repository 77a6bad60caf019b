//! Distance-driven coarsening.
//!
//! Coarsening runs in three phases per level so that rule checking can see
//! the complete candidate set before anything is torn down:
//!
//! 1. [`unsubdivide_level_by_distance`] floodfills outward from the
//!    subdivided/leaf frontier, marking every subdivided triangle (with four
//!    leaf children) that sits beyond the *unsubdivide* threshold. The
//!    coarsen threshold exceeds the refine threshold at every level, so a
//!    hovering observer never makes the mesh thrash.
//! 2. [`unsubdivide_level_check_rules`] rejects candidates whose removal
//!    would leave a neighbor violating Rule A or Rule B, cascading each
//!    rejection into neighboring candidates it may invalidate.
//! 3. [`unsubdivide_level_commit`] repairs the frontier tables, notifies the
//!    host, and removes the surviving candidates' child groups.
//!
//! [`unsubdivide_pass`] runs the phases for every level, deepest first, so a
//! level's children are already gone by the time their parents are examined.

use crate::algo::Scratchpad;
use crate::mesh::TriId;
use crate::terrain::{is_distance_near, TerrainSkeleton, WorldVec};

/// Enqueue `tri` for an unsubdivide distance test when it qualifies:
/// subdivided, all four children leaves, not yet enqueued this pass.
fn maybe_distance_check(
    terrain: &TerrainSkeleton,
    scratch: &mut Scratchpad,
    lvl: usize,
    tri: TriId,
) {
    if scratch.distance_test_done.test(tri.index()) {
        return;
    }
    let children = terrain.skel.tri(tri).children;
    if !children.is_valid() {
        return;
    }
    let group = terrain.skel.group(children);
    if group.triangles.iter().any(|t| t.is_subdivided()) {
        // Parents coarsen only after all of their children have.
        return;
    }
    scratch.levels[lvl].distance_test_next.push(tri);
    scratch.distance_test_done.set(tri.index());
}

/// Phase 1: build the candidate set `try_unsubdiv` for one level.
///
/// Floodfill seeded from `has_non_subdivided_neighbor` — a subdivided
/// triangle next to a leaf is the boundary where coarsening can start — and
/// spread through neighbors of every triangle found to be far enough away.
pub fn unsubdivide_level_by_distance(
    terrain: &TerrainSkeleton,
    scratch: &mut Scratchpad,
    pos: WorldVec,
    lvl: usize,
) {
    scratch.grow(terrain.skel.group_capacity() * 4);

    for index in terrain.levels[lvl].has_non_subdivided_neighbor.ones() {
        maybe_distance_check(terrain, scratch, lvl, TriId::new(index));
    }

    while !scratch.levels[lvl].distance_test_next.is_empty() {
        let mut processing = std::mem::take(&mut scratch.levels[lvl].distance_test_processing);
        std::mem::swap(&mut processing, &mut scratch.levels[lvl].distance_test_next);

        for &tri in &processing {
            debug_assert!(
                terrain.skel.is_subdivided(tri),
                "only subdivided triangles may be queued for coarsening"
            );
            let center = terrain.tri_centers[tri.index()];
            let too_far = !is_distance_near(pos, center, scratch.threshold_unsubdiv[lvl]);

            if too_far {
                scratch.try_unsubdiv.set(tri.index());
                for neighbor in terrain.skel.tri(tri).neighbors {
                    if neighbor.is_valid() {
                        maybe_distance_check(terrain, scratch, lvl, neighbor);
                    }
                }
            }
        }

        processing.clear();
        scratch.levels[lvl].distance_test_processing = processing;
    }
}

/// Whether unsubdividing `tri` would break a rule in its surroundings.
///
/// A neighbor still *counts as subdivided* when it has children and is not
/// itself going to coarsen (`try_unsubdiv` without `cant_unsubdiv`). The
/// candidate is rejected when two or more neighbors still count (Rule A
/// would bite once the candidate is a leaf), or when a counting neighbor's
/// children along the shared edge have children of their own (they would
/// lose the same-level neighbor Rule B requires).
fn violates_rules(terrain: &TerrainSkeleton, scratch: &Scratchpad, tri: TriId) -> bool {
    let triangle = terrain.skel.tri(tri);
    let mut counting_neighbors = 0;

    for &neighbor in &triangle.neighbors {
        if !neighbor.is_valid() {
            continue;
        }
        let neighbor_tri = terrain.skel.tri(neighbor);
        if neighbor_tri.is_subdivided()
            && (!scratch.try_unsubdiv.test(neighbor.index())
                || scratch.cant_unsubdiv.test(neighbor.index()))
        {
            counting_neighbors += 1;

            // The two children along the shared edge are siblings
            // `edge` and `edge + 1` of the neighbor's group.
            let neighbor_edge = neighbor_tri.find_neighbor_index(tri);
            let neighbor_group = terrain.skel.group(neighbor_tri.children);
            if neighbor_group.triangles[neighbor_edge].is_subdivided() {
                return true;
            }
            if neighbor_group.triangles[(neighbor_edge + 1) % 3].is_subdivided() {
                return true;
            }
        }
    }

    counting_neighbors >= 2
}

fn check_recurse(terrain: &TerrainSkeleton, scratch: &mut Scratchpad, tri: TriId) {
    if !violates_rules(terrain, scratch, tri) {
        return;
    }
    scratch.cant_unsubdiv.set(tri.index());

    // Pulling this candidate out of the coarsen set can invalidate its
    // neighbors' checks in turn.
    let neighbors = terrain.skel.tri(tri).neighbors;
    for neighbor in neighbors {
        if neighbor.is_valid()
            && scratch.try_unsubdiv.test(neighbor.index())
            && !scratch.cant_unsubdiv.test(neighbor.index())
        {
            check_recurse(terrain, scratch, neighbor);
        }
    }
}

/// Phase 2: mark every candidate whose removal would violate a rule.
pub fn unsubdivide_level_check_rules(terrain: &TerrainSkeleton, scratch: &mut Scratchpad) {
    let candidates: Vec<usize> = scratch.try_unsubdiv.ones().collect();
    for index in candidates {
        if !scratch.cant_unsubdiv.test(index) {
            check_recurse(terrain, scratch, TriId::new(index));
        }
    }
}

/// Phase 3: apply the surviving candidates and fix up the frontier tables.
pub fn unsubdivide_level_commit(
    terrain: &mut TerrainSkeleton,
    scratch: &mut Scratchpad,
    lvl: usize,
) {
    fn wont_unsubdivide(scratch: &Scratchpad, tri: TriId) -> bool {
        !scratch.try_unsubdiv.test(tri.index()) || scratch.cant_unsubdiv.test(tri.index())
    }

    let candidates: Vec<usize> = scratch.try_unsubdiv.ones().collect();
    for index in candidates {
        if scratch.cant_unsubdiv.test(index) {
            continue;
        }
        let tri = TriId::new(index);
        let triangle = *terrain.skel.tri(tri);

        debug_assert!(
            !terrain.levels[lvl].has_subdivided_neighbor.test(index),
            "subdivided triangles never carry has_subdivided_neighbor"
        );

        for neighbor in triangle.neighbors {
            if !neighbor.is_valid() || !wont_unsubdivide(scratch, neighbor) {
                continue;
            }
            if terrain.skel.is_subdivided(neighbor) {
                // The neighbor is staying subdivided and is about to gain a
                // leaf neighbor (us); both sides become frontier.
                terrain.levels[lvl].has_non_subdivided_neighbor.set(neighbor.index());
                terrain.levels[lvl].has_subdivided_neighbor.set(index);
            } else {
                // Leaf neighbor: recompute whether it still borders any
                // triangle that stays subdivided.
                let neighbor_tri = *terrain.skel.tri(neighbor);
                let still_bordering = neighbor_tri.neighbors.iter().any(|&other| {
                    other.is_valid()
                        && other != tri
                        && wont_unsubdivide(scratch, other)
                        && terrain.skel.is_subdivided(other)
                });
                if still_bordering {
                    terrain.levels[lvl].has_subdivided_neighbor.set(neighbor.index());
                } else {
                    terrain.levels[lvl].has_subdivided_neighbor.clear_bit(neighbor.index());
                }
            }
        }

        // The children are leaves about to vanish; drop their frontier bits.
        if lvl + 1 < terrain.levels.len() {
            let children = triangle.children;
            for sibling in 0..4 {
                terrain.levels[lvl + 1]
                    .has_subdivided_neighbor
                    .clear_bit(children.triangle(sibling).index());
            }
        }
        terrain.levels[lvl].has_non_subdivided_neighbor.clear_bit(index);

        (scratch.on_unsubdivide)(tri, &triangle, terrain);

        terrain.skel.unsubdivide(tri);
    }

    scratch.try_unsubdiv.clear_all();
    scratch.cant_unsubdiv.clear_all();
}

/// Run a whole frame's coarsening for one observer position, deepest level
/// first. Clears the shared `distance_test_done` set on exit so the
/// subsequent refine pass starts clean.
pub fn unsubdivide_pass(terrain: &mut TerrainSkeleton, scratch: &mut Scratchpad, pos: WorldVec) {
    for lvl in (0..scratch.level_max).rev() {
        unsubdivide_level_by_distance(terrain, scratch, pos, lvl);
        unsubdivide_level_check_rules(terrain, scratch);
        unsubdivide_level_commit(terrain, scratch, lvl);
    }
    scratch.distance_test_done.clear_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::{check_invariants, subdivide_pass};
    use crate::terrain::{icosphere, TerrainConfig};

    fn planet(config: &TerrainConfig) -> (TerrainSkeleton, Scratchpad) {
        let terrain = TerrainSkeleton::new(config).unwrap();
        let mut scratch = Scratchpad::new(config);
        scratch.on_subdivide = Box::new(icosphere::project_new_midpoints);
        (terrain, scratch)
    }

    /// Thresholds tuned to the base geometry: a surface observer reaches the
    /// adjacent root faces (their centers sit ~0.61r away) but not the next
    /// ring, and every coarsen threshold stays below the ~0.85r distance from
    /// the planet center to any face center. The far side of the planet stays
    /// at the root level, so coarsening always has a frontier to start from,
    /// and an observer at the center collapses the whole hierarchy.
    fn local_config(level_max: usize) -> TerrainConfig {
        let config = TerrainConfig::geometric(level_max, 10, 100.0, 0.0);
        let radius_units = config.radius_units();
        let mut subdiv = Vec::with_capacity(level_max);
        let mut threshold = radius_units * 65 / 100;
        for _ in 0..level_max {
            subdiv.push(threshold);
            threshold = threshold * 58 / 100;
        }
        let unsubdiv = subdiv.iter().map(|&t| t * 123 / 100).collect();
        config.with_thresholds(subdiv, unsubdiv)
    }

    #[test]
    fn test_round_trip_restores_icosahedron() {
        let config = local_config(4);
        let (mut terrain, mut scratch) = planet(&config);

        let pos = terrain.positions[0];
        subdivide_pass(&mut terrain, &mut scratch, pos);
        assert!(terrain.skel.group_count() > 5);
        check_invariants(&terrain);

        // From the planet center everything is beyond the coarsen
        // thresholds; one pass walks the whole hierarchy back down.
        unsubdivide_pass(&mut terrain, &mut scratch, WorldVec::zeros());
        assert_eq!(terrain.skel.group_count(), 5, "all subdivision groups freed");
        assert_eq!(terrain.skel.root_triangles().count(), 20);
        for lvl in &terrain.levels {
            assert_eq!(lvl.has_subdivided_neighbor.count_ones(), 0);
            assert_eq!(lvl.has_non_subdivided_neighbor.count_ones(), 0);
        }
        check_invariants(&terrain);
    }

    #[test]
    fn test_hysteresis_keeps_mesh_stable_in_band() {
        let config = local_config(3);
        let (mut terrain, mut scratch) = planet(&config);

        let pos = terrain.positions[5];
        subdivide_pass(&mut terrain, &mut scratch, pos);
        let groups = terrain.skel.group_count();

        // Same observer: everything refined is within the (larger) coarsen
        // threshold, so nothing moves.
        unsubdivide_pass(&mut terrain, &mut scratch, pos);
        assert_eq!(terrain.skel.group_count(), groups);
        check_invariants(&terrain);
    }

    #[test]
    fn test_unsubdivide_notifies_host() {
        let config = local_config(3);
        let (mut terrain, mut scratch) = planet(&config);

        use std::cell::Cell;
        use std::rc::Rc;
        let removed = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&removed);
        scratch.on_unsubdivide = Box::new(move |_, _, _| counter.set(counter.get() + 1));

        let pos = terrain.positions[0];
        subdivide_pass(&mut terrain, &mut scratch, pos);
        let created = terrain.skel.group_count() - 5;

        unsubdivide_pass(&mut terrain, &mut scratch, WorldVec::zeros());
        assert_eq!(removed.get(), created, "one notification per removed group");
    }

    #[test]
    fn test_partial_retreat_coarsens_only_deep_levels() {
        let config = local_config(4);
        let (mut terrain, mut scratch) = planet(&config);

        let surface = terrain.positions[0];
        subdivide_pass(&mut terrain, &mut scratch, surface);
        let groups_near = terrain.skel.group_count();

        // Back away to a quarter radius of altitude: the deepest rings
        // collapse but the shallow ones stay.
        let far = surface.map(|c| c + c / 4);
        unsubdivide_pass(&mut terrain, &mut scratch, far);
        subdivide_pass(&mut terrain, &mut scratch, far);

        let groups_far = terrain.skel.group_count();
        assert!(groups_far < groups_near);
        assert!(groups_far > 5, "shallow levels remain subdivided");
        check_invariants(&terrain);
    }
}
