//! Connected components by label propagation.
//!
//! Superstep 0 and 1 decide which castings take part (both their relation
//! and their role player are in scope). From superstep 1 every active
//! casting and selected thing holds a cluster label, initially its own id.
//! From superstep 2 on every participant adopts the lexicographically
//! largest label it hears, rebroadcasting only on change. A superstep in
//! which nobody changed is a fixed point. A casting may hold the winning
//! label; only things are reported as members.
//!
//! With a source concept, only the source seeds a label and the run
//! computes the single component containing it.
//!
//! When persisting, one extra superstep runs after the fixed point in which
//! every labelled thing writes its label through the result writer.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, Operator, VertexContext, VertexProgram};
use crate::model::{ConceptId, VertexKind};
use crate::Result;
use super::helpers::{self, CASTING_SCOPES, PLAYER_TO_CASTINGS, RELATION_TO_CASTINGS, THING_SCOPES};

/// Transient key holding a vertex's cluster label.
pub const CLUSTER_LABEL: &str = "cluster.label";
const ACTIVE: &str = "cluster.active";

const STABLE: &str = "cluster.stable";
const PERSISTING: &str = "cluster.persisting";

/// Ceiling floor; larger graphs get two supersteps per vertex.
pub(crate) const MAX_ITERATIONS: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterMessage {
    Player,
    Relation,
    Label(ConceptId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedComponentsProgram {
    pub selected: BTreeSet<String>,
    /// Compute only the component containing this concept.
    pub source: Option<ConceptId>,
    /// Result attribute type to persist labels into.
    pub persist: Option<String>,
}

impl ConnectedComponentsProgram {
    pub fn new(selected: BTreeSet<String>) -> Self {
        Self { selected, source: None, persist: None }
    }

    pub fn containing(mut self, source: ConceptId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn persisting(mut self, result_type: impl Into<String>) -> Self {
        self.persist = Some(result_type.into());
        self
    }

    fn participates(&self, ctx: &VertexContext<'_, ClusterMessage>) -> bool {
        match ctx.kind() {
            VertexKind::Casting => ctx.get_bool(ACTIVE),
            _ => helpers::is_selected(ctx, &self.selected),
        }
    }

    fn seeds(&self, ctx: &VertexContext<'_, ClusterMessage>) -> bool {
        match &self.source {
            Some(source) => ctx.id() == source,
            None => true,
        }
    }

    fn broadcast(ctx: &mut VertexContext<'_, ClusterMessage>, label: &ConceptId) {
        let scopes: &[_] = if ctx.kind() == VertexKind::Casting { &CASTING_SCOPES } else { &THING_SCOPES };
        for scope in scopes {
            ctx.send(*scope, ClusterMessage::Label(label.clone()));
        }
    }
}

impl VertexProgram for ConnectedComponentsProgram {
    type Message = ClusterMessage;

    fn name(&self) -> &'static str {
        "connected-components"
    }

    fn setup(&self, memory: &mut Memory) {
        memory.register(STABLE, Operator::And, true);
        memory.register(PERSISTING, Operator::Assign, false);
    }

    fn compute(&self, ctx: &mut VertexContext<'_, ClusterMessage>, memory: &Memory) {
        if memory.get_bool(PERSISTING) {
            if ctx.kind().is_thing() {
                if let Some(label) = ctx.get_str(CLUSTER_LABEL).map(str::to_owned) {
                    ctx.persist(label);
                }
            }
            return;
        }

        match memory.superstep() {
            0 => {
                if helpers::is_selected(ctx, &self.selected) {
                    ctx.send(PLAYER_TO_CASTINGS, ClusterMessage::Player);
                    if ctx.kind() == VertexKind::Relation {
                        ctx.send(RELATION_TO_CASTINGS, ClusterMessage::Relation);
                    }
                }
            }
            1 => {
                if ctx.kind() == VertexKind::Casting {
                    let messages = ctx.messages();
                    let active = messages.contains(&ClusterMessage::Player)
                        && messages.contains(&ClusterMessage::Relation);
                    if active {
                        ctx.set(ACTIVE, true);
                    }
                }
                if self.participates(ctx) && self.seeds(ctx) {
                    let own = helpers::vertex_id(ctx);
                    ctx.set(CLUSTER_LABEL, own.clone());
                    Self::broadcast(ctx, &own);
                }
            }
            _ => {
                if !self.participates(ctx) {
                    return;
                }
                let heard = helpers::max_label(ctx.messages().iter().filter_map(|m| match m {
                    ClusterMessage::Label(l) => Some(l),
                    _ => None,
                }));
                let Some(heard) = heard else { return };
                let current = ctx.get_str(CLUSTER_LABEL);
                if current.is_none_or(|c| heard.as_str() > c) {
                    let label = heard.clone();
                    ctx.set(CLUSTER_LABEL, label.clone());
                    ctx.aggregate(STABLE, false);
                    Self::broadcast(ctx, &label);
                }
            }
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        if memory.get_bool(PERSISTING) {
            return Ok(true);
        }
        let stable = memory.superstep() >= 2 && memory.get_bool(STABLE);
        memory.reset(STABLE);
        if !stable {
            return Ok(false);
        }
        if self.persist.is_some() {
            memory.set(PERSISTING, true);
            return Ok(false);
        }
        Ok(true)
    }

    fn max_iterations(&self, vertices: usize) -> u32 {
        helpers::ceiling(MAX_ITERATIONS, 2, vertices)
    }

    fn persistence(&self, memory: &Memory) -> Option<String> {
        self.persist.clone().filter(|_| memory.get_bool(PERSISTING))
    }
}
