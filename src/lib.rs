//! # Tessel
//!
//! An adaptive tessellation core for planet-scale terrain.
//!
//! Tessel maintains a view-dependent triangular mesh over a sphere: starting
//! from the 20 faces of an icosahedron, triangles near the observer are
//! recursively subdivided and triangles that drift away are merged back,
//! while two adjacency rules guarantee neighboring triangles never differ by
//! more than one subdivision level — no cracks, no T-junctions.
//!
//! ## Features
//!
//! - **Pooled skeleton**: vertices and four-triangle sibling groups in slot
//!   pools with type-safe `u32` handles; midpoint vertices deduplicated per
//!   edge
//! - **Frontier floodfill**: per-level bit-vectors track where subdivided and
//!   unsubdivided triangles touch, so a pass costs O(changed), not O(all)
//! - **Hysteresis**: separate refine and coarsen thresholds keep a hovering
//!   observer from making the mesh thrash
//! - **Host hooks**: geometry (positions, normals, centers) and resource
//!   lifetimes stay host-defined through two callbacks
//!
//! ## Quick start
//!
//! ```
//! use tessel::prelude::*;
//!
//! let config = TerrainConfig::geometric(3, 10, 100.0, 5.0);
//! let mut terrain = TerrainSkeleton::new(&config).unwrap();
//! let mut scratch = Scratchpad::new(&config);
//! scratch.on_subdivide = Box::new(tessel::terrain::icosphere::project_new_midpoints);
//!
//! // Hovering over a base vertex pulls refinement toward it.
//! let observer = terrain.positions[0];
//! tessel::algo::update(&mut terrain, &mut scratch, observer);
//! assert!(terrain.skel.group_count() > 5);
//! check_invariants(&terrain);
//! ```
//!
//! ## Coordinates
//!
//! World positions are 64-bit fixed-point integers (`2^scale` units per
//! meter), so distance tests stay exact at planetary magnitudes; normals are
//! `f32`. Per-triangle centers are biased outward by the maximum possible
//! terrain elevation at their depth, making the distance tests compare
//! against the terrain's bounding envelope rather than the flat face.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;
pub mod terrain;

/// Prelude module for convenient imports.
///
/// ```
/// use tessel::prelude::*;
/// ```
pub mod prelude {
    pub use crate::algo::{
        check_invariants, subdivide_pass, unsubdivide_pass, update, Scratchpad, SubdivideEvent,
    };
    pub use crate::error::{Result, TerrainError};
    pub use crate::mesh::{
        BitVec, MaybeNewVertex, TriGroup, TriGroupId, TriId, Triangle, TriangleSkeleton, VertexId,
    };
    pub use crate::terrain::{
        is_distance_near, Level, NormalVec, TerrainConfig, TerrainSkeleton, WorldVec,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::terrain::icosphere;

    #[test]
    fn test_descend_and_leave() {
        // Thresholds local enough that the far side of the planet stays at
        // the root level, leaving a frontier for coarsening to start from.
        let mut config = TerrainConfig::geometric(3, 10, 100.0, 5.0);
        let radius_units = config.radius_units();
        config.threshold_subdiv = vec![radius_units, radius_units / 2, radius_units / 4];
        config.threshold_unsubdiv = config.threshold_subdiv.iter().map(|&t| t + t / 2).collect();
        let mut terrain = TerrainSkeleton::new(&config).unwrap();
        let mut scratch = Scratchpad::new(&config);
        scratch.on_subdivide = Box::new(icosphere::project_new_midpoints);

        let observer = terrain.positions[0];
        crate::algo::update(&mut terrain, &mut scratch, observer);
        assert!(terrain.skel.group_count() > 5);
        check_invariants(&terrain);

        // Leaving for deep space coarsens everything back to the roots.
        let deep_space = WorldVec::new(0, 0, i64::MAX / 4);
        crate::algo::update(&mut terrain, &mut scratch, deep_space);
        assert_eq!(terrain.skel.group_count(), 5);
        check_invariants(&terrain);
    }
}
