//! Degree centrality.
//!
//! A thing's degree is the number of in-scope relations it plays a role
//! in, plus the in-scope things it owns or is owned by. A relation's degree
//! is the number of its in-scope role players.
//!
//! | Superstep | Vertex | Action |
//! |-----------|--------|--------|
//! | 0 | selected thing | `Player` to its castings, `Relation` to its own castings (relations), `Ownership` over ownership edges |
//! | 1 | casting | active iff it heard `Player` and `Relation`; active castings send `Edge` to both ends |
//! | 1 | selected thing | cache ownership count |
//! | 2 | target thing | `DEGREE` = edges + cached ownerships |
//! | 3 | target thing | persist `DEGREE` (persisting variant only) |
//!
//! `DegreeStatisticsProgram` is the weighting pass of every statistic: an
//! attribute's degree is the number of in-scope owners referencing it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, VertexContext, VertexProgram};
use crate::model::VertexKind;
use crate::Result;
use super::helpers::{self, CASTING_TO_PLAYER, CASTING_TO_RELATION, OWNERSHIP, PLAYER_TO_CASTINGS, RELATION_TO_CASTINGS};

/// Transient key holding a vertex's degree.
pub const DEGREE: &str = "degree";
const OWNERSHIPS: &str = "degree.ownerships";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegreeMessage {
    Player,
    Relation,
    Ownership,
    Edge,
}

/// Marks castings whose relation and role player are both in scope.
pub(crate) fn casting_is_active(messages: &[DegreeMessage]) -> bool {
    messages.contains(&DegreeMessage::Player) && messages.contains(&DegreeMessage::Relation)
}

// ============================================================================
// DegreeProgram
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeProgram {
    /// Things whose edges count.
    pub selected: BTreeSet<String>,
    /// Things whose degree is computed.
    pub targets: BTreeSet<String>,
    /// Result attribute type to persist degrees into.
    pub persist: Option<String>,
}

impl DegreeProgram {
    pub fn new(selected: BTreeSet<String>, targets: BTreeSet<String>) -> Self {
        Self { selected, targets, persist: None }
    }

    pub fn persisting(mut self, result_type: impl Into<String>) -> Self {
        self.persist = Some(result_type.into());
        self
    }

    fn is_target(&self, ctx: &VertexContext<'_, DegreeMessage>) -> bool {
        ctx.kind().is_thing() && self.targets.contains(ctx.type_label())
    }
}

impl VertexProgram for DegreeProgram {
    type Message = DegreeMessage;

    fn name(&self) -> &'static str {
        if self.persist.is_some() { "degree-and-persist" } else { "degree" }
    }

    fn setup(&self, _memory: &mut Memory) {}

    fn compute(&self, ctx: &mut VertexContext<'_, DegreeMessage>, memory: &Memory) {
        match memory.superstep() {
            0 => {
                if helpers::is_selected(ctx, &self.selected) {
                    ctx.send(PLAYER_TO_CASTINGS, DegreeMessage::Player);
                    if ctx.kind() == VertexKind::Relation {
                        ctx.send(RELATION_TO_CASTINGS, DegreeMessage::Relation);
                    }
                    ctx.send(OWNERSHIP, DegreeMessage::Ownership);
                }
            }
            1 => {
                if ctx.kind() == VertexKind::Casting {
                    if casting_is_active(ctx.messages()) {
                        ctx.send(CASTING_TO_RELATION, DegreeMessage::Edge);
                        ctx.send(CASTING_TO_PLAYER, DegreeMessage::Edge);
                    }
                } else if helpers::is_selected(ctx, &self.selected) {
                    let owned = ctx.messages().iter().filter(|m| **m == DegreeMessage::Ownership).count();
                    ctx.set(OWNERSHIPS, owned as i64);
                }
            }
            2 => {
                if self.is_target(ctx) && helpers::is_selected(ctx, &self.selected) {
                    let edges = ctx.messages().iter().filter(|m| **m == DegreeMessage::Edge).count() as i64;
                    let owned = ctx.get_int(OWNERSHIPS).unwrap_or(0);
                    ctx.set(DEGREE, edges + owned);
                }
            }
            _ => {
                if let Some(degree) = ctx.get_int(DEGREE) {
                    ctx.persist(degree);
                }
            }
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        let last = if self.persist.is_some() { 3 } else { 2 };
        Ok(memory.superstep() >= last)
    }

    fn max_iterations(&self, _vertices: usize) -> u32 {
        if self.persist.is_some() { 4 } else { 3 }
    }

    fn persistence(&self, memory: &Memory) -> Option<String> {
        self.persist.clone().filter(|_| memory.superstep() == 3)
    }
}

// ============================================================================
// DegreeStatisticsProgram
// ============================================================================

/// Reference counts of attribute values: the weights of every statistic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeStatisticsProgram {
    /// Owner types in scope.
    pub owners: BTreeSet<String>,
    /// Attribute types whose values are aggregated.
    pub targets: BTreeSet<String>,
}

impl DegreeStatisticsProgram {
    pub fn new(owners: BTreeSet<String>, targets: BTreeSet<String>) -> Self {
        Self { owners, targets }
    }
}

/// Superstep 0 of every weighting pass: owners announce themselves to the
/// attributes they own.
pub(crate) fn announce_ownership<M: Clone>(
    ctx: &mut VertexContext<'_, M>,
    owners: &BTreeSet<String>,
    message: M,
) {
    if helpers::is_selected(ctx, owners) {
        ctx.send(helpers::OWNER_TO_ATTRIBUTES, message);
    }
}

/// Superstep 1 of every weighting pass: a target attribute's weight.
pub(crate) fn is_weighted_target<M>(ctx: &VertexContext<'_, M>, targets: &BTreeSet<String>) -> bool {
    ctx.kind() == VertexKind::Attribute && targets.contains(ctx.type_label())
}

impl VertexProgram for DegreeStatisticsProgram {
    type Message = ();

    fn name(&self) -> &'static str {
        "degree-statistics"
    }

    fn setup(&self, _memory: &mut Memory) {}

    fn compute(&self, ctx: &mut VertexContext<'_, ()>, memory: &Memory) {
        match memory.superstep() {
            0 => announce_ownership(ctx, &self.owners, ()),
            _ => {
                if is_weighted_target(ctx, &self.targets) {
                    let weight = ctx.messages().len() as i64;
                    ctx.set(DEGREE, weight);
                }
            }
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        Ok(memory.superstep() >= 1)
    }

    fn max_iterations(&self, _vertices: usize) -> u32 {
        2
    }
}
