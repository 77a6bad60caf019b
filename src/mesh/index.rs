//! Index types for skeleton elements.
//!
//! This module provides type-safe index wrappers for vertices, triangles, and
//! triangle groups. All handles are plain `u32` slot indices into the
//! skeleton's pools; `u32::MAX` is the invalid sentinel. Links between
//! elements are always handles, never references, because the adjacency graph
//! is cyclic.
//!
//! Triangle handles carry structure: a [`TriId`] is `group * 4 + sibling`,
//! so the four triangles of a group occupy a contiguous block and the group
//! and sibling index can be recovered without a lookup.

use std::fmt::{self, Debug};

const INVALID: u32 = u32::MAX;

/// A type-safe vertex index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct VertexId(u32);

/// A type-safe triangle index.
///
/// Encodes both the owning group and the sibling slot: the two low bits are
/// the sibling index (0..4), the rest is the group index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TriId(u32);

/// A type-safe triangle-group index.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct TriGroupId(u32);

macro_rules! impl_index_type {
    ($name:ident, $display:literal) => {
        impl $name {
            /// Create a new index from a raw value.
            #[inline]
            pub fn new(index: usize) -> Self {
                debug_assert!(index < INVALID as usize, "index {} out of range", index);
                Self(index as u32)
            }

            /// Create an invalid/null index.
            #[inline]
            pub fn invalid() -> Self {
                Self(INVALID)
            }

            /// Get the raw index value.
            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }

            /// Check if this is a valid (non-null) index.
            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != INVALID
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", $display, self.0)
                } else {
                    write!(f, "{}(INVALID)", $display)
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }
    };
}

impl_index_type!(VertexId, "V");
impl_index_type!(TriId, "T");
impl_index_type!(TriGroupId, "G");

impl TriId {
    /// The group this triangle belongs to.
    #[inline]
    pub fn group(self) -> TriGroupId {
        debug_assert!(self.is_valid());
        TriGroupId(self.0 >> 2)
    }

    /// The sibling slot (0..4) of this triangle within its group.
    ///
    /// Slots 0, 1, 2 are the corner children, slot 3 is the center child.
    #[inline]
    pub fn sibling(self) -> usize {
        debug_assert!(self.is_valid());
        (self.0 & 3) as usize
    }
}

impl TriGroupId {
    /// The triangle occupying sibling slot `sibling` (0..4) of this group.
    #[inline]
    pub fn triangle(self, sibling: usize) -> TriId {
        debug_assert!(self.is_valid());
        debug_assert!(sibling < 4, "sibling {} out of range", sibling);
        TriId(self.0 * 4 + sibling as u32)
    }
}

/// Result of a deduplicated midpoint-vertex lookup.
///
/// `is_new` tells the `on_subdivide` hook which vertices still need their
/// position and normal computed; midpoints shared with an already-subdivided
/// neighbor come back with `is_new == false`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MaybeNewVertex {
    /// The midpoint vertex, existing or freshly allocated.
    pub id: VertexId,
    /// Whether the vertex was allocated by this call.
    pub is_new: bool,
}
