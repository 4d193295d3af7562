//! Free functions shared by every program: liveness, id and type
//! extraction, scope membership and the message scopes of the casting
//! decomposition.
//!
//! ```text
//!   relation ──Casting──► casting ──RolePlayer──► player
//!   owner ──Ownership──► attribute
//! ```

use std::collections::BTreeSet;

use crate::compute::{MessageScope, VertexContext};
use crate::compute::mapreduce::VertexView;
use crate::model::{ConceptId, Direction, EdgeKind, VertexKind};
use crate::storage::Liveness;

// ============================================================================
// Scopes
// ============================================================================

/// Player → the castings it fills.
pub const PLAYER_TO_CASTINGS: MessageScope = MessageScope::new(EdgeKind::RolePlayer, Direction::Incoming);
/// Relation → its castings.
pub const RELATION_TO_CASTINGS: MessageScope = MessageScope::new(EdgeKind::Casting, Direction::Outgoing);
/// Casting → its relation.
pub const CASTING_TO_RELATION: MessageScope = MessageScope::new(EdgeKind::Casting, Direction::Incoming);
/// Casting → its role player.
pub const CASTING_TO_PLAYER: MessageScope = MessageScope::new(EdgeKind::RolePlayer, Direction::Outgoing);
/// Owner → attributes it owns.
pub const OWNER_TO_ATTRIBUTES: MessageScope = MessageScope::new(EdgeKind::Ownership, Direction::Outgoing);
/// Attribute → its owners.
pub const ATTRIBUTE_TO_OWNERS: MessageScope = MessageScope::new(EdgeKind::Ownership, Direction::Incoming);
/// Both ends of every ownership edge.
pub const OWNERSHIP: MessageScope = MessageScope::new(EdgeKind::Ownership, Direction::Both);

/// Every scope a thing can send through.
pub const THING_SCOPES: [MessageScope; 3] = [PLAYER_TO_CASTINGS, RELATION_TO_CASTINGS, OWNERSHIP];
/// Every scope a casting can send through.
pub const CASTING_SCOPES: [MessageScope; 2] = [CASTING_TO_RELATION, CASTING_TO_PLAYER];

// ============================================================================
// Vertex inspection
// ============================================================================

/// False when the backing record vanished after the snapshot was taken.
pub fn is_alive(liveness: &dyn Liveness, id: &ConceptId) -> bool {
    liveness.is_alive(id)
}

pub fn vertex_id<M>(ctx: &VertexContext<'_, M>) -> ConceptId {
    ctx.id().clone()
}

pub fn vertex_type<'a, M>(ctx: &VertexContext<'a, M>) -> &'a str {
    ctx.type_label()
}

/// A thing whose direct type is in the selected-type set.
pub fn is_selected<M>(ctx: &VertexContext<'_, M>, selected: &BTreeSet<String>) -> bool {
    ctx.kind().is_thing() && selected.contains(ctx.type_label())
}

pub fn view_is_selected(view: &VertexView<'_>, selected: &BTreeSet<String>) -> bool {
    view.kind().is_thing() && selected.contains(view.type_label())
}

/// Which end of an ownership edge the other vertex is, as seen from a
/// vertex of `kind` over an edge in `direction`.
///
/// An attribute can own attributes, so for an attribute vertex an
/// ownership edge is ambiguous until its direction is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipEnd {
    /// The neighbour owns this vertex.
    Owner,
    /// The neighbour is owned by this vertex.
    Owned,
}

pub fn ownership_end(kind: VertexKind, direction: Direction) -> Option<OwnershipEnd> {
    match (kind, direction) {
        (VertexKind::Casting, _) => None,
        (_, Direction::Outgoing) => Some(OwnershipEnd::Owned),
        (VertexKind::Attribute, Direction::Incoming) => Some(OwnershipEnd::Owner),
        (_, Direction::Incoming) | (_, Direction::Both) => None,
    }
}

/// Scope that reaches the given end of this vertex's ownership edges.
pub fn ownership_scope(end: OwnershipEnd) -> MessageScope {
    match end {
        OwnershipEnd::Owner => ATTRIBUTE_TO_OWNERS,
        OwnershipEnd::Owned => OWNER_TO_ATTRIBUTES,
    }
}

/// Largest id, lexicographically. The tie-break every label propagation uses.
pub fn max_label<'a>(labels: impl IntoIterator<Item = &'a ConceptId>) -> Option<&'a ConceptId> {
    labels.into_iter().max()
}

/// Superstep ceiling: `floor`, or `per_vertex` supersteps per vertex on
/// graphs large enough to need more.
pub fn ceiling(floor: u32, per_vertex: u32, vertices: usize) -> u32 {
    let scaled = u32::try_from(vertices).unwrap_or(u32::MAX).saturating_mul(per_vertex);
    floor.max(scaled)
}

/// Mix an id with a superstep into a well-spread priority.
pub fn priority(id: &ConceptId, superstep: u32) -> i64 {
    let mut h: u64 = 0x9e37_79b9_7f4a_7c15 ^ u64::from(superstep);
    for b in id.as_str().bytes() {
        h = (h ^ u64::from(b)).wrapping_mul(0x1000_0000_01b3);
    }
    h ^= h >> 30;
    h = h.wrapping_mul(0xbf58_476d_1ce4_e5b9);
    h ^= h >> 27;
    h = h.wrapping_mul(0x94d0_49bb_1331_11eb);
    h ^= h >> 31;
    (h >> 1) as i64
}
