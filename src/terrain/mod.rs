//! Terrain skeleton: per-vertex and per-triangle attributes over the mesh.
//!
//! [`TerrainSkeleton`] wraps [`TriangleSkeleton`] with the data the
//! distance-driven passes need: fixed-point world positions and unit normals
//! per vertex, a biased world-space center per triangle, and one pair of
//! frontier bit-vectors per subdivision level.
//!
//! # Fixed-point coordinates
//!
//! World positions are `Vector3<i64>` with an implicit scale of `2^scale`
//! units per meter. Planet radii in the millions of meters fit comfortably
//! with room for sub-millimeter resolution. Distance tests never leave
//! integer arithmetic; see [`is_distance_near`].
//!
//! # Triangle centers
//!
//! A triangle's stored center is not its centroid: it is the centroid pushed
//! outward along the summed vertex normals by half the maximum height terrain
//! can reach over that triangle at its depth. Distance tests therefore
//! compare against the bounding envelope of displaced terrain rather than
//! the flat face.

use nalgebra::Vector3;

use crate::error::{Result, TerrainError};
use crate::mesh::{BitVec, TriGroupId, TriangleSkeleton};

pub mod icosphere;

/// Fixed-point world-space vector, `2^scale` units per meter.
pub type WorldVec = Vector3<i64>;

/// Unit surface normal.
pub type NormalVec = Vector3<f32>;

/// Frontier tables for one subdivision level.
///
/// These two bit-vectors are the only legal floodfill seeds: subdivide passes
/// start from leaves that touch a subdivided triangle, unsubdivide passes
/// from subdivided triangles that touch a leaf.
#[derive(Debug, Clone, Default)]
pub struct Level {
    /// Set for triangles that are *not* subdivided and have at least one
    /// subdivided same-level neighbor.
    pub has_subdivided_neighbor: BitVec,
    /// Set for triangles that *are* subdivided and have at least one
    /// non-subdivided same-level neighbor.
    pub has_non_subdivided_neighbor: BitVec,
}

/// Configuration of a terrain skeleton and its distance thresholds.
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// Maximum subdivision depth; levels run `0..level_max`.
    pub level_max: usize,
    /// Fixed-point scale exponent: meters map to `2^scale` units.
    pub scale: u32,
    /// Planet radius in meters.
    pub radius: f64,
    /// Maximum terrain elevation above the sphere, in meters.
    pub height: f64,
    /// Per-level "near enough to refine" thresholds, fixed-point units.
    /// Must be strictly decreasing.
    pub threshold_subdiv: Vec<i64>,
    /// Per-level "far enough to coarsen" thresholds, fixed-point units.
    /// Must exceed the subdivide threshold at every level (hysteresis).
    pub threshold_unsubdiv: Vec<i64>,
}

impl TerrainConfig {
    /// Configuration with geometrically shrinking thresholds.
    ///
    /// Level 0 refines within two radii of the observer and each deeper
    /// level halves the range; unsubdivide thresholds add 1.5x hysteresis.
    pub fn geometric(level_max: usize, scale: u32, radius: f64, height: f64) -> Self {
        let radius_units = (radius * f64::from(1u32 << scale.min(31))) as i64;
        let threshold_subdiv: Vec<i64> =
            (0..level_max).map(|l| (radius_units * 2) >> l).collect();
        let threshold_unsubdiv = threshold_subdiv.iter().map(|&t| t + t / 2).collect();
        Self {
            level_max,
            scale,
            radius,
            height,
            threshold_subdiv,
            threshold_unsubdiv,
        }
    }

    /// Replace both threshold tables.
    pub fn with_thresholds(mut self, subdiv: Vec<i64>, unsubdiv: Vec<i64>) -> Self {
        self.threshold_subdiv = subdiv;
        self.threshold_unsubdiv = unsubdiv;
        self
    }

    /// The planet radius in fixed-point units.
    pub fn radius_units(&self) -> i64 {
        (self.radius * f64::from(1u32 << self.scale.min(31))) as i64
    }

    /// Check the configuration invariants.
    pub fn validate(&self) -> Result<()> {
        if self.level_max == 0 {
            return Err(TerrainError::LevelMaxZero);
        }
        if self.threshold_subdiv.len() != self.level_max {
            return Err(TerrainError::ThresholdLength {
                name: "threshold_subdiv",
                got: self.threshold_subdiv.len(),
                expected: self.level_max,
            });
        }
        if self.threshold_unsubdiv.len() != self.level_max {
            return Err(TerrainError::ThresholdLength {
                name: "threshold_unsubdiv",
                got: self.threshold_unsubdiv.len(),
                expected: self.level_max,
            });
        }
        for level in 0..self.level_max - 1 {
            if self.threshold_subdiv[level + 1] >= self.threshold_subdiv[level] {
                return Err(TerrainError::ThresholdNotDecreasing { level });
            }
        }
        for level in 0..self.level_max {
            if self.threshold_unsubdiv[level] <= self.threshold_subdiv[level] {
                return Err(TerrainError::NoHysteresis { level });
            }
        }
        let units = self.radius * f64::from(1u32 << self.scale.min(31));
        if !(self.radius > 0.0) || self.scale > 31 || units >= (1i64 << 62) as f64 {
            return Err(TerrainError::BadRadius {
                radius: self.radius,
                scale: self.scale,
            });
        }
        Ok(())
    }
}

/// The skeleton plus everything the distance-driven passes read and write.
#[derive(Debug)]
pub struct TerrainSkeleton {
    /// The underlying topology.
    pub skel: TriangleSkeleton,
    /// Fixed-point world position per vertex slot.
    pub positions: Vec<WorldVec>,
    /// Unit normal per vertex slot.
    pub normals: Vec<NormalVec>,
    /// Envelope-biased world center per triangle slot.
    pub tri_centers: Vec<WorldVec>,
    /// Frontier tables, one per level `0..level_max`.
    pub levels: Vec<Level>,
    /// Fixed-point scale exponent.
    pub scale: u32,
    /// Planet radius in meters.
    pub radius: f64,
    /// Maximum terrain elevation in meters.
    pub height: f64,
    /// Per-depth bound on how far displaced terrain can protrude over a flat
    /// face, as a fraction of the radius. Monotonically decreasing; one entry
    /// per depth `0..=level_max`.
    tower_over_horizon: Vec<f64>,
}

impl TerrainSkeleton {
    /// Build a terrain skeleton seeded with the base icosahedron.
    pub fn new(config: &TerrainConfig) -> Result<Self> {
        config.validate()?;
        let mut terrain = Self {
            skel: TriangleSkeleton::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            tri_centers: Vec::new(),
            levels: vec![Level::default(); config.level_max],
            scale: config.scale,
            radius: config.radius,
            height: config.height,
            tower_over_horizon: (0..=config.level_max)
                .map(|depth| icosphere::tower_over_horizon(depth))
                .collect(),
        };
        icosphere::seed(&mut terrain);
        Ok(terrain)
    }

    /// Number of subdivision levels.
    #[inline]
    pub fn level_max(&self) -> usize {
        self.levels.len()
    }

    /// Fixed-point units per meter.
    #[inline]
    pub fn unit_scale(&self) -> f64 {
        f64::from(1u32 << self.scale)
    }

    /// The protrusion bound for triangles at `depth`, as a radius fraction.
    #[inline]
    pub fn tower_over_horizon(&self, depth: usize) -> f64 {
        self.tower_over_horizon[depth]
    }

    /// Grow attribute arrays and level bit-vectors to the skeleton's current
    /// capacity. Must be called after any group allocation and before the
    /// new slots are touched.
    pub fn grow_to_capacity(&mut self) {
        let tri_capacity = self.skel.group_capacity() * 4;
        let vertex_capacity = self.skel.vertex_capacity();
        self.positions.resize(vertex_capacity, WorldVec::zeros());
        self.normals.resize(vertex_capacity, NormalVec::zeros());
        self.tri_centers.resize(tri_capacity, WorldVec::zeros());
        for level in &mut self.levels {
            level.has_subdivided_neighbor.resize(tri_capacity);
            level.has_non_subdivided_neighbor.resize(tri_capacity);
        }
    }

    /// Recompute the envelope-biased centers of a group's four triangles.
    ///
    /// For each child: the corner positions are averaged on pre-divided
    /// terms (no 64-bit overflow), then pushed along the summed corner
    /// normals by half the maximum terrain height reachable at this depth.
    pub fn calc_tri_centers(&mut self, group_id: TriGroupId) {
        let group = self.skel.group(group_id);
        let depth = group.depth as usize;
        let corner_sets: [[usize; 3]; 4] = std::array::from_fn(|sibling| {
            let v = group.triangles[sibling].vertices;
            [v[0].index(), v[1].index(), v[2].index()]
        });
        assert!(depth < self.tower_over_horizon.len(), "depth beyond configured levels");

        let max_height = self.height + self.radius * self.tower_over_horizon[depth];
        let rise_factor = 0.5 * max_height * self.unit_scale() / 3.0;

        for (sibling, [va, vb, vc]) in corner_sets.into_iter().enumerate() {
            let pos_avg = self.positions[va].map(|c| c / 3)
                + self.positions[vb].map(|c| c / 3)
                + self.positions[vc].map(|c| c / 3);
            let nrm_sum = self.normals[va] + self.normals[vb] + self.normals[vc];
            let rise = nrm_sum.map(|c| (f64::from(c) * rise_factor) as i64);
            self.tri_centers[group_id.triangle(sibling).index()] = pos_avg + rise;
        }
    }
}

/// Whether two fixed-point points lie within `threshold` of each other.
///
/// Componentwise Chebyshev early-reject (any axis differing by more than the
/// threshold is conclusively far), then an exact squared-Euclidean compare
/// carried out in 128-bit arithmetic. The threshold is an L2 radius.
#[inline]
pub fn is_distance_near(a: WorldVec, b: WorldVec, threshold: i64) -> bool {
    let dx = (a.x as i128 - b.x as i128).unsigned_abs();
    let dy = (a.y as i128 - b.y as i128).unsigned_abs();
    let dz = (a.z as i128 - b.z as i128).unsigned_abs();
    let limit = threshold.max(0) as u128;
    if dx > limit || dy > limit || dz > limit {
        return false;
    }
    dx * dx + dy * dy + dz * dz <= limit * limit
}
