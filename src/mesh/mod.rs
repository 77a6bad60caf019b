//! Core skeleton data structures.
//!
//! This module provides the pooled triangle-group mesh representation used by
//! the terrain layer and the subdivision engines.
//!
//! # Overview
//!
//! The primary type is [`TriangleSkeleton`]: a pool of vertices and a pool of
//! four-triangle sibling groups with parent/child and neighbor links, plus the
//! subdivision, unsubdivision, and cross-group pairing primitives.
//!
//! # Index types
//!
//! Skeleton elements are identified by type-safe `u32` handles:
//! - [`VertexId`] — identifies a vertex slot
//! - [`TriId`] — identifies a triangle (`group * 4 + sibling`)
//! - [`TriGroupId`] — identifies a sibling group
//!
//! # Bit-vectors
//!
//! [`BitVec`] backs every per-level frontier table and per-pass scratch set;
//! its [`BitVec::ones`] iterator is what lets floodfill passes touch only the
//! triangles at the subdivision frontier.

mod bitvec;
mod index;
mod skeleton;

pub use bitvec::{BitVec, Ones};
pub use index::{MaybeNewVertex, TriGroupId, TriId, VertexId};
pub use skeleton::{
    parent_edge_of, EdgePairing, GroupSide, TriGroup, Triangle, TriangleSkeleton,
};
