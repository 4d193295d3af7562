//! Edges of the compute graph.

use serde::{Deserialize, Serialize};
use super::ConceptId;

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

impl Direction {
    /// Whether an edge seen in direction `actual` passes this filter.
    pub fn admits(self, actual: Direction) -> bool {
        self == Direction::Both || self == actual
    }
}

/// The three edge kinds that decompose n-ary relations and ownership.
///
/// | Kind | Source | Target |
/// |------|--------|--------|
/// | `Casting` | relation | casting |
/// | `RolePlayer` | casting | role player |
/// | `Ownership` | owner | attribute |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    Casting,
    RolePlayer,
    Ownership,
}

/// A directed edge between two concepts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub src: ConceptId,
    pub dst: ConceptId,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(src: ConceptId, dst: ConceptId, kind: EdgeKind) -> Self {
        Self { src, dst, kind }
    }

    /// The "other" end of the edge from the given concept.
    pub fn other(&self, from: &ConceptId) -> Option<&ConceptId> {
        if *from == self.src { Some(&self.dst) }
        else if *from == self.dst { Some(&self.src) }
        else { None }
    }
}
