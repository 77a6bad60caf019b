//! Per-pass working state for the subdivision engines.
//!
//! One [`Scratchpad`] is shared by the unsubdivide and subdivide halves of a
//! frame and reused across frames: queues and bit-vectors are cleared, never
//! reallocated, so steady-state passes allocate close to nothing. The
//! scratchpad is always threaded through the engine calls explicitly; there
//! is no process-wide state.

use std::fmt;

use crate::mesh::{BitVec, MaybeNewVertex, TriGroupId, TriId, Triangle, VertexId};
use crate::terrain::{TerrainConfig, TerrainSkeleton};

/// Everything the `on_subdivide` hook needs about one freshly created group.
#[derive(Debug, Copy, Clone)]
pub struct SubdivideEvent {
    /// The triangle that was subdivided.
    pub parent: TriId,
    /// Its new child group.
    pub group: TriGroupId,
    /// The parent's corner vertices, in order.
    pub corners: [VertexId; 3],
    /// The three edge midpoints, in edge order, flagged when newly allocated.
    pub midpoints: [MaybeNewVertex; 3],
}

/// Hook invoked after every subdivision.
///
/// Must write position and normal for every `is_new` midpoint and refresh the
/// group's centers (see [`crate::terrain::icosphere::project_new_midpoints`])
/// before returning; the engine reads the new centers as soon as the deeper
/// level is processed. Must not call back into the subdivision engines.
pub type SubdivideHook = Box<dyn FnMut(&SubdivideEvent, &mut TerrainSkeleton)>;

/// Hook invoked just before a triangle's children are removed.
///
/// The host releases any render/streaming resources keyed on the triangle or
/// its vanishing children. Must not touch neighbor triangles or call back
/// into the subdivision engines.
pub type UnsubdivideHook = Box<dyn FnMut(TriId, &Triangle, &mut TerrainSkeleton)>;

/// Double-buffered distance-test queue for one level.
#[derive(Debug, Clone, Default)]
pub struct ScratchpadLevel {
    /// Triangles queued for the next drain iteration.
    pub distance_test_next: Vec<TriId>,
    /// Drain buffer; swapped with `distance_test_next` each iteration.
    pub distance_test_processing: Vec<TriId>,
}

/// Mutable working state threaded through one full pass.
pub struct Scratchpad {
    /// Per-level distance-test queues.
    pub levels: Vec<ScratchpadLevel>,
    /// Triangles already enqueued for a distance test this pass; prevents
    /// re-enqueueing. Cleared between the unsubdivide and subdivide halves.
    pub distance_test_done: BitVec,
    /// Unsubdivide candidates of the level currently being coarsened.
    pub try_unsubdiv: BitVec,
    /// Candidates rejected by the rule checks.
    pub cant_unsubdiv: BitVec,
    /// Per-level refine thresholds, fixed-point units.
    pub threshold_subdiv: Vec<i64>,
    /// Per-level coarsen thresholds; strictly larger for hysteresis.
    pub threshold_unsubdiv: Vec<i64>,
    /// The shallowest level that still has subdivide work pending. Rule B
    /// forcing a parent subdivision pulls this back down mid-pass.
    pub level_need_process: usize,
    /// Number of levels.
    pub level_max: usize,
    /// Distance tests performed this pass.
    pub distance_check_count: u64,
    /// Observer for new groups.
    pub on_subdivide: SubdivideHook,
    /// Observer for removed groups.
    pub on_unsubdivide: UnsubdivideHook,
}

impl Scratchpad {
    /// Create a scratchpad for the given configuration. Hooks start as
    /// no-ops; hosts install their own before the first pass.
    pub fn new(config: &TerrainConfig) -> Self {
        Self {
            levels: vec![ScratchpadLevel::default(); config.level_max],
            distance_test_done: BitVec::new(),
            try_unsubdiv: BitVec::new(),
            cant_unsubdiv: BitVec::new(),
            threshold_subdiv: config.threshold_subdiv.clone(),
            threshold_unsubdiv: config.threshold_unsubdiv.clone(),
            level_need_process: 0,
            level_max: config.level_max,
            distance_check_count: 0,
            on_subdivide: Box::new(|_, _| {}),
            on_unsubdivide: Box::new(|_, _, _| {}),
        }
    }

    /// Grow the pass-global bit-vectors to cover `tri_capacity` triangles.
    pub(crate) fn grow(&mut self, tri_capacity: usize) {
        if self.distance_test_done.len() < tri_capacity {
            self.distance_test_done.resize(tri_capacity);
        }
        if self.try_unsubdiv.len() < tri_capacity {
            self.try_unsubdiv.resize(tri_capacity);
            self.cant_unsubdiv.resize(tri_capacity);
        }
    }
}

impl fmt::Debug for Scratchpad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scratchpad")
            .field("level_max", &self.level_max)
            .field("level_need_process", &self.level_need_process)
            .field("distance_check_count", &self.distance_check_count)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::TerrainConfig;

    #[test]
    fn test_new_copies_thresholds() {
        let config = TerrainConfig::geometric(4, 8, 50.0, 1.0);
        let scratch = Scratchpad::new(&config);
        assert_eq!(scratch.levels.len(), 4);
        assert_eq!(scratch.threshold_subdiv, config.threshold_subdiv);
        assert_eq!(scratch.threshold_unsubdiv, config.threshold_unsubdiv);
        assert_eq!(scratch.level_need_process, 0);
    }

    #[test]
    fn test_grow_covers_all_bitvectors() {
        let config = TerrainConfig::geometric(2, 8, 50.0, 1.0);
        let mut scratch = Scratchpad::new(&config);
        scratch.grow(100);
        assert!(scratch.distance_test_done.len() >= 100);
        assert!(scratch.try_unsubdiv.len() >= 100);
        assert!(scratch.cant_unsubdiv.len() >= 100);
        // Growing never shrinks.
        scratch.grow(10);
        assert!(scratch.distance_test_done.len() >= 100);
    }
}
