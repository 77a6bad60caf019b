//! Triangle skeleton: pooled storage and subdivision primitives.
//!
//! The skeleton is the topology-only core of the terrain mesh: a pool of
//! vertices and a pool of *triangle groups*, where each group holds the four
//! sibling triangles produced by one 1→4 subdivision. Triangles link to their
//! three same-level neighbors (one per edge), to their child group when
//! subdivided, and through their group back to the parent triangle.
//!
//! # Subdivision layout
//!
//! Edge `i` of a triangle joins corner `i` and corner `(i + 1) % 3`.
//! Subdividing a triangle with corners `(c0, c1, c2)` introduces the three
//! edge midpoints `m01`, `m12`, `m20` and produces:
//!
//! | sibling | corners           | role   |
//! |---------|-------------------|--------|
//! | 0       | `(c0, m01, m20)`  | corner |
//! | 1       | `(c1, m12, m01)`  | corner |
//! | 2       | `(c2, m20, m12)`  | corner |
//! | 3       | `(m01, m12, m20)` | center |
//!
//! Each corner child shares its edge 1 with the center child; its edges 0
//! and 2 lie on the parent's boundary. The two children along parent edge
//! `j` are siblings `j` (via its edge 0) and `(j + 1) % 3` (via its edge 2).
//! These orderings are load-bearing: neighbor pairings between separately
//! subdivided groups ([`TriangleSkeleton::group_set_neighboring`]) only line
//! up because both sides agree on them.
//!
//! Midpoint vertices are deduplicated by unordered corner pair, so two
//! neighboring triangles subdividing at different times share the midpoint of
//! their common edge. Slots are reclaimed through free lists; there is no
//! reference counting.

use std::collections::HashMap;

use super::bitvec::BitVec;
use super::index::{MaybeNewVertex, TriGroupId, TriId, VertexId};

/// One triangle of the skeleton.
#[derive(Debug, Copy, Clone, Default)]
pub struct Triangle {
    /// Corner vertices, ordered; edge `i` joins corners `i` and `(i + 1) % 3`.
    pub vertices: [VertexId; 3],
    /// Same-level neighbor across each edge. May be invalid when the
    /// neighbor's parent is not subdivided.
    pub neighbors: [TriId; 3],
    /// Child group when this triangle is subdivided.
    pub children: TriGroupId,
}

impl Triangle {
    /// The edge index `i` with `self.neighbors[i] == other`.
    ///
    /// # Panics
    /// Panics when `other` is not a neighbor; callers only ask about links
    /// they have already followed in the other direction.
    #[inline]
    pub fn find_neighbor_index(&self, other: TriId) -> usize {
        self.neighbors
            .iter()
            .position(|&n| n == other)
            .expect("triangle is not a neighbor")
    }

    /// Whether this triangle has a child group.
    #[inline]
    pub fn is_subdivided(&self) -> bool {
        self.children.is_valid()
    }
}

/// Four sibling triangles produced by one subdivision.
#[derive(Debug, Clone, Default)]
pub struct TriGroup {
    /// Subdivision depth; root groups are 0.
    pub depth: u8,
    /// The triangle that was subdivided to create this group. Invalid for
    /// root groups.
    pub parent: TriId,
    /// The four siblings; see the module docs for the layout.
    pub triangles: [Triangle; 4],
}

/// One side of a cross-group pairing: a child group and the parent edge
/// (on that parent's numbering) along which it meets the other group.
#[derive(Debug, Copy, Clone)]
pub struct GroupSide {
    /// The child group.
    pub group: TriGroupId,
    /// The parent-level edge index on this side.
    pub edge: usize,
}

/// One of the two same-level neighbor links installed across a shared
/// parent edge.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct EdgePairing {
    /// The child on the first (`a`) side.
    pub ours: TriId,
    /// Its new neighbor on the second (`b`) side.
    pub theirs: TriId,
}

/// The parent-level edge that a corner child's outer edge lies on.
///
/// Only corner children (sibling 0..3) have outer edges, and only their
/// edges 0 and 2 are outer; edge 1 faces the center sibling.
#[inline]
pub fn parent_edge_of(sibling: usize, edge: usize) -> usize {
    debug_assert!(sibling < 3, "center children have no outer edges");
    match edge {
        0 => sibling,
        2 => (sibling + 2) % 3,
        _ => unreachable!("edge 1 faces the center sibling"),
    }
}

/// Pooled triangle/vertex storage with subdivision primitives.
///
/// Purely topological: vertex attributes (positions, normals) live in the
/// terrain layer, indexed by [`VertexId`] slot.
#[derive(Debug, Default)]
pub struct TriangleSkeleton {
    groups: Vec<TriGroup>,
    group_alive: BitVec,
    group_free: Vec<TriGroupId>,
    vertex_next: u32,
    vertex_free: Vec<VertexId>,
    /// Midpoint vertex of each subdivided edge, keyed by unordered corner pair.
    middles: HashMap<(u32, u32), VertexId>,
}

#[inline]
fn edge_key(a: VertexId, b: VertexId) -> (u32, u32) {
    let (a, b) = (a.index() as u32, b.index() as u32);
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl TriangleSkeleton {
    /// Create an empty skeleton.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    /// Number of group slots ever allocated (alive or free).
    #[inline]
    pub fn group_capacity(&self) -> usize {
        self.groups.len()
    }

    /// Number of vertex slots ever allocated (alive or free).
    #[inline]
    pub fn vertex_capacity(&self) -> usize {
        self.vertex_next as usize
    }

    /// Number of currently alive groups.
    #[inline]
    pub fn group_count(&self) -> usize {
        self.group_alive.count_ones()
    }

    /// Whether `group` refers to an alive group slot.
    #[inline]
    pub fn group_exists(&self, group: TriGroupId) -> bool {
        group.is_valid() && self.group_alive.test(group.index())
    }

    /// Get a group by ID.
    #[inline]
    pub fn group(&self, group: TriGroupId) -> &TriGroup {
        debug_assert!(self.group_exists(group), "stale group {:?}", group);
        &self.groups[group.index()]
    }

    /// Get a triangle by ID.
    #[inline]
    pub fn tri(&self, tri: TriId) -> &Triangle {
        debug_assert!(self.group_exists(tri.group()), "stale triangle {:?}", tri);
        &self.groups[tri.group().index()].triangles[tri.sibling()]
    }

    #[inline]
    pub(crate) fn tri_mut(&mut self, tri: TriId) -> &mut Triangle {
        debug_assert!(self.group_exists(tri.group()), "stale triangle {:?}", tri);
        &mut self.groups[tri.group().index()].triangles[tri.sibling()]
    }

    /// Whether the triangle has a child group.
    #[inline]
    pub fn is_subdivided(&self, tri: TriId) -> bool {
        self.tri(tri).is_subdivided()
    }

    /// Iterate over alive group IDs, ascending.
    pub fn alive_groups(&self) -> impl Iterator<Item = TriGroupId> + '_ {
        self.group_alive.ones().map(TriGroupId::new)
    }

    /// Iterate over the triangles of depth-0 groups, in allocation order.
    pub fn root_triangles(&self) -> impl Iterator<Item = TriId> + '_ {
        self.alive_groups()
            .filter(|&g| !self.groups[g.index()].parent.is_valid())
            .flat_map(|g| (0..4).map(move |sibling| g.triangle(sibling)))
    }

    // ==================== Vertices ====================

    /// Allocate a vertex slot.
    pub fn create_vertex(&mut self) -> VertexId {
        if let Some(id) = self.vertex_free.pop() {
            id
        } else {
            let id = VertexId::new(self.vertex_next as usize);
            self.vertex_next += 1;
            id
        }
    }

    /// Return the midpoint vertex of edge `(a, b)`, allocating it when no
    /// neighbor has introduced it yet. Deduplicated by unordered corner pair.
    pub fn vertex_create_middle(&mut self, a: VertexId, b: VertexId) -> MaybeNewVertex {
        let key = edge_key(a, b);
        if let Some(&id) = self.middles.get(&key) {
            return MaybeNewVertex { id, is_new: false };
        }
        let id = self.create_vertex();
        self.middles.insert(key, id);
        MaybeNewVertex { id, is_new: true }
    }

    /// Midpoints for all three edges of a corner triple, in edge order.
    pub fn vertex_create_middles(&mut self, corners: &[VertexId; 3]) -> [MaybeNewVertex; 3] {
        [
            self.vertex_create_middle(corners[0], corners[1]),
            self.vertex_create_middle(corners[1], corners[2]),
            self.vertex_create_middle(corners[2], corners[0]),
        ]
    }

    fn release_middle(&mut self, a: VertexId, b: VertexId) {
        if let Some(id) = self.middles.remove(&edge_key(a, b)) {
            self.vertex_free.push(id);
        }
    }

    // ==================== Groups ====================

    fn alloc_group(&mut self) -> TriGroupId {
        let id = if let Some(id) = self.group_free.pop() {
            self.groups[id.index()] = TriGroup::default();
            id
        } else {
            self.groups.push(TriGroup::default());
            self.group_alive.resize(self.groups.len());
            TriGroupId::new(self.groups.len() - 1)
        };
        self.group_alive.set(id.index());
        id
    }

    /// Create a depth-0 group of four unrelated root triangles.
    ///
    /// Used when seeding the base mesh; neighbor links start out invalid and
    /// are wired afterwards with [`TriangleSkeleton::connect`].
    pub fn create_root_group(&mut self, corners: [[VertexId; 3]; 4]) -> TriGroupId {
        let id = self.alloc_group();
        let group = &mut self.groups[id.index()];
        for (triangle, corners) in group.triangles.iter_mut().zip(corners) {
            triangle.vertices = corners;
        }
        id
    }

    /// Install a bidirectional neighbor link between edge `edge_a` of `a` and
    /// edge `edge_b` of `b`.
    pub fn connect(&mut self, a: TriId, edge_a: usize, b: TriId, edge_b: usize) {
        self.tri_mut(a).neighbors[edge_a] = b;
        self.tri_mut(b).neighbors[edge_b] = a;
    }

    // ==================== Subdivision ====================

    /// Subdivide a leaf triangle into a new four-child group.
    ///
    /// `middles` are the three edge midpoints, in edge order, as returned by
    /// [`TriangleSkeleton::vertex_create_middles`]. The new group's corner
    /// children start with only their center link; outer links are installed
    /// later by [`TriangleSkeleton::group_set_neighboring`].
    ///
    /// # Panics
    /// Panics when the triangle is already subdivided.
    pub fn subdivide(&mut self, tri: TriId, middles: [VertexId; 3]) -> TriGroupId {
        let parent = *self.tri(tri);
        assert!(!parent.is_subdivided(), "triangle {:?} is already subdivided", tri);
        let depth = self.group(tri.group()).depth;
        let [c0, c1, c2] = parent.vertices;
        let [m01, m12, m20] = middles;

        let group_id = self.alloc_group();
        let center = group_id.triangle(3);
        let group = &mut self.groups[group_id.index()];
        group.depth = depth + 1;
        group.parent = tri;
        group.triangles[0].vertices = [c0, m01, m20];
        group.triangles[1].vertices = [c1, m12, m01];
        group.triangles[2].vertices = [c2, m20, m12];
        group.triangles[3].vertices = [m01, m12, m20];

        // Each corner child meets the center across its edge 1; the center
        // sees them on edges (sibling + 2) % 3.
        for sibling in 0..3 {
            group.triangles[sibling].neighbors[1] = center;
        }
        group.triangles[3].neighbors = [
            group_id.triangle(1),
            group_id.triangle(2),
            group_id.triangle(0),
        ];

        self.tri_mut(tri).children = group_id;
        group_id
    }

    /// Undo one subdivision: remove the triangle's child group.
    ///
    /// External neighbor links pointing at the four children are cleared, the
    /// group slot is reclaimed, and each edge midpoint whose opposite
    /// parent-neighbor is not subdivided (so nothing references it anymore)
    /// is released.
    ///
    /// # Panics
    /// Panics when the triangle is not subdivided or any child still has
    /// children of its own.
    pub fn unsubdivide(&mut self, tri: TriId) {
        let parent = *self.tri(tri);
        let group_id = parent.children;
        assert!(group_id.is_valid(), "triangle {:?} is not subdivided", tri);
        let group = self.group(group_id).clone();
        assert!(
            group.triangles.iter().all(|t| !t.is_subdivided()),
            "cannot unsubdivide {:?}: a child is still subdivided",
            tri
        );

        // Detach the children from all external neighbors.
        for sibling in 0..4 {
            let child = group_id.triangle(sibling);
            for neighbor in group.triangles[sibling].neighbors {
                if neighbor.is_valid() && neighbor.group() != group_id {
                    let back = self.tri(neighbor).find_neighbor_index(child);
                    self.tri_mut(neighbor).neighbors[back] = TriId::invalid();
                }
            }
        }

        // Midpoint `j` sits on parent edge `j`. Its only other possible user
        // is the child group of the neighbor across that edge.
        for edge in 0..3 {
            let opposite = parent.neighbors[edge];
            let still_used = opposite.is_valid() && self.is_subdivided(opposite);
            if !still_used {
                self.release_middle(parent.vertices[edge], parent.vertices[(edge + 1) % 3]);
            }
        }

        self.group_alive.clear_bit(group_id.index());
        self.group_free.push(group_id);
        self.tri_mut(tri).children = TriGroupId::invalid();
    }

    /// Pair two child groups whose parents are neighbors.
    ///
    /// `a.edge` / `b.edge` are the parents' own edge indices for the shared
    /// edge. Each parent edge is split into two child edges, so two neighbor
    /// links are installed; they are returned in deterministic order
    /// (`a`-side sibling `edge` first, then sibling `(edge + 1) % 3`).
    pub fn group_set_neighboring(&mut self, a: GroupSide, b: GroupSide) -> [EdgePairing; 2] {
        // The windings of the two parents oppose along the shared edge, so
        // corner `a.edge` on side A coincides with corner `b.edge + 1` on
        // side B, and the child pairs cross over.
        let a_lo = a.group.triangle(a.edge);
        let a_hi = a.group.triangle((a.edge + 1) % 3);
        let b_lo = b.group.triangle(b.edge);
        let b_hi = b.group.triangle((b.edge + 1) % 3);

        // A child's edge 0 lies on its own parent edge; the other side meets
        // it with edge 2 (see `parent_edge_of`).
        self.connect(a_lo, 0, b_hi, 2);
        self.connect(a_hi, 2, b_lo, 0);

        [
            EdgePairing { ours: a_lo, theirs: b_hi },
            EdgePairing { ours: a_hi, theirs: b_lo },
        ]
    }
}
