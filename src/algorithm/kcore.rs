//! K-core by iterative degree pruning, then clustering of the survivors.
//!
//! Relations are relays, never candidates: a thing's neighbours are the
//! things it shares a relation with, plus its ownership neighbours. Liveness
//! announcements travel thing → casting → relation → casting → thing, so a
//! pruning round is four supersteps long and things act on supersteps
//! 1, 5, 9, ...
//!
//! ```text
//!   ss 0   tokens decide active castings, ownership tokens counted once
//!   ss 1   selected non-relation things become candidates, announce Alive
//!   ss 5+  candidate counts distinct live neighbours (+ cached ownerships)
//!          count >= k: announce again; else drop out, mark unstable
//! ```
//!
//! Ownership neighbours are counted once at superstep 1 and never
//! re-messaged. When a round drops nobody, survivors switch to label
//! propagation over the same relays. The cluster phase ends after four
//! consecutive supersteps without a label change (the longest relay
//! chain). No candidate left means no k-core: `Error::NoResult`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, Operator, VertexContext, VertexProgram};
use crate::model::{ConceptId, VertexKind};
use crate::{Error, Result};
use super::connected_components::CLUSTER_LABEL;
use super::helpers::{
    self, CASTING_TO_PLAYER, CASTING_TO_RELATION, OWNERSHIP, PLAYER_TO_CASTINGS, RELATION_TO_CASTINGS,
};

pub(crate) const CANDIDATE: &str = "kcore.candidate";
const ACTIVE: &str = "kcore.active";
const OWNERSHIPS: &str = "kcore.ownerships";

pub(crate) const STABLE: &str = "kcore.stable";
pub(crate) const EXIST: &str = "kcore.exist";
const CLUSTER_START: &str = "kcore.cluster_start";
const CHANGED: &str = "kcore.changed";
const QUIET: &str = "kcore.quiet";

/// Superstep of the first liveness announcement.
pub(crate) const FIRST_THING_STEP: u32 = 1;
/// Supersteps per relay round.
pub(crate) const ROUND: u32 = 4;
/// Ceiling floor; larger graphs scale with their vertex count.
pub(crate) const MAX_ITERATIONS: u32 = 400;

/// Direction of a relayed message: toward the relation or back to players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hop {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreMessage {
    Player,
    Relation,
    Owner,
    Alive(ConceptId, Hop),
    Label(ConceptId, Hop),
}

// ============================================================================
// Shared pruning machinery (also driven by coreness)
// ============================================================================

pub(crate) fn is_thing_step(superstep: u32) -> bool {
    superstep >= FIRST_THING_STEP && (superstep - FIRST_THING_STEP) % ROUND == 0
}

pub(crate) fn is_candidate_type(ctx: &VertexContext<'_, CoreMessage>, selected: &BTreeSet<String>) -> bool {
    helpers::is_selected(ctx, selected) && ctx.kind() != VertexKind::Relation
}

/// Superstep 0: activity and ownership tokens.
pub(crate) fn bootstrap(ctx: &mut VertexContext<'_, CoreMessage>, selected: &BTreeSet<String>) {
    if !helpers::is_selected(ctx, selected) {
        return;
    }
    ctx.send(PLAYER_TO_CASTINGS, CoreMessage::Player);
    if ctx.kind() == VertexKind::Relation {
        ctx.send(RELATION_TO_CASTINGS, CoreMessage::Relation);
    } else {
        ctx.send(OWNERSHIP, CoreMessage::Owner);
    }
}

/// Superstep 1: castings settle activity, candidates announce themselves.
pub(crate) fn enroll(ctx: &mut VertexContext<'_, CoreMessage>, selected: &BTreeSet<String>) {
    if ctx.kind() == VertexKind::Casting {
        let messages = ctx.messages();
        if messages.contains(&CoreMessage::Player) && messages.contains(&CoreMessage::Relation) {
            ctx.set(ACTIVE, true);
        }
        return;
    }
    if !is_candidate_type(ctx, selected) {
        return;
    }
    let owners = ctx.messages().iter().filter(|m| **m == CoreMessage::Owner).count() as i64;
    ctx.set(OWNERSHIPS, owners);
    ctx.set(CANDIDATE, true);
    announce(ctx);
}

pub(crate) fn announce(ctx: &mut VertexContext<'_, CoreMessage>) {
    let own = helpers::vertex_id(ctx);
    ctx.send(PLAYER_TO_CASTINGS, CoreMessage::Alive(own, Hop::Up));
    ctx.aggregate(EXIST, true);
}

/// Live neighbours of a candidate at a thing step.
pub(crate) fn live_neighbours(ctx: &VertexContext<'_, CoreMessage>) -> i64 {
    let own = ctx.id();
    let ids: BTreeSet<&ConceptId> = ctx
        .messages()
        .iter()
        .filter_map(|m| match m {
            CoreMessage::Alive(id, Hop::Down) if id != own => Some(id),
            _ => None,
        })
        .collect();
    ids.len() as i64 + ctx.get_int(OWNERSHIPS).unwrap_or(0)
}

/// Forward relayed messages through castings and relations. Returns true
/// if the vertex is a relay (and so has nothing else to do).
pub(crate) fn relay(ctx: &mut VertexContext<'_, CoreMessage>, clustering: bool) -> bool {
    match ctx.kind() {
        VertexKind::Casting => {
            if !ctx.get_bool(ACTIVE) {
                return true;
            }
            for m in ctx.messages() {
                let (hop, keep) = match m {
                    CoreMessage::Alive(_, hop) => (*hop, !clustering),
                    CoreMessage::Label(_, hop) => (*hop, clustering),
                    _ => continue,
                };
                if !keep {
                    continue;
                }
                let scope = if hop == Hop::Up { CASTING_TO_RELATION } else { CASTING_TO_PLAYER };
                ctx.send(scope, m.clone());
            }
            true
        }
        VertexKind::Relation => {
            if clustering {
                let best = helpers::max_label(ctx.messages().iter().filter_map(|m| match m {
                    CoreMessage::Label(id, Hop::Up) => Some(id),
                    _ => None,
                }));
                if let Some(best) = best {
                    ctx.send(RELATION_TO_CASTINGS, CoreMessage::Label(best.clone(), Hop::Down));
                }
            } else {
                let ids: BTreeSet<&ConceptId> = ctx
                    .messages()
                    .iter()
                    .filter_map(|m| match m {
                        CoreMessage::Alive(id, Hop::Up) => Some(id),
                        _ => None,
                    })
                    .collect();
                for id in ids {
                    ctx.send(RELATION_TO_CASTINGS, CoreMessage::Alive(id.clone(), Hop::Down));
                }
            }
            true
        }
        _ => false,
    }
}

// ============================================================================
// KCoreProgram
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KCoreProgram {
    pub selected: BTreeSet<String>,
    pub k: i64,
}

impl KCoreProgram {
    pub fn new(selected: BTreeSet<String>, k: i64) -> Self {
        Self { selected, k }
    }

    fn prune(&self, ctx: &mut VertexContext<'_, CoreMessage>, memory: &Memory) {
        let ss = memory.superstep();
        match ss {
            0 => bootstrap(ctx, &self.selected),
            1 => enroll(ctx, &self.selected),
            _ => {
                if relay(ctx, false) || !is_thing_step(ss) || !ctx.get_bool(CANDIDATE) {
                    return;
                }
                if live_neighbours(ctx) >= self.k {
                    announce(ctx);
                } else {
                    ctx.set(CANDIDATE, false);
                    ctx.aggregate(STABLE, false);
                }
            }
        }
    }

    fn cluster(&self, ctx: &mut VertexContext<'_, CoreMessage>, memory: &Memory, start: u32) {
        if relay(ctx, true) || !ctx.get_bool(CANDIDATE) {
            return;
        }
        let label = if memory.superstep() == start {
            Some(helpers::vertex_id(ctx))
        } else {
            let heard = helpers::max_label(ctx.messages().iter().filter_map(|m| match m {
                CoreMessage::Label(id, _) => Some(id),
                _ => None,
            }));
            let current = ctx.get_str(CLUSTER_LABEL);
            heard.filter(|h| current.is_none_or(|c| h.as_str() > c)).cloned()
        };
        if let Some(label) = label {
            ctx.set(CLUSTER_LABEL, label.clone());
            ctx.aggregate(CHANGED, true);
            ctx.send(PLAYER_TO_CASTINGS, CoreMessage::Label(label.clone(), Hop::Up));
            ctx.send(OWNERSHIP, CoreMessage::Label(label, Hop::Up));
        }
    }
}

impl VertexProgram for KCoreProgram {
    type Message = CoreMessage;

    fn name(&self) -> &'static str {
        "k-core"
    }

    fn setup(&self, memory: &mut Memory) {
        memory.register(STABLE, Operator::And, true);
        memory.register(EXIST, Operator::Or, false);
        memory.register(CLUSTER_START, Operator::Assign, 0i64);
        memory.register(CHANGED, Operator::Or, false);
        memory.register(QUIET, Operator::Assign, 0i64);
    }

    fn compute(&self, ctx: &mut VertexContext<'_, CoreMessage>, memory: &Memory) {
        match memory.get_int(CLUSTER_START).unwrap_or(0) {
            0 => self.prune(ctx, memory),
            start => self.cluster(ctx, memory, start as u32),
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        let ss = memory.superstep();
        if memory.get_int(CLUSTER_START).unwrap_or(0) > 0 {
            let quiet = if memory.get_bool(CHANGED) { 0 } else { memory.get_int(QUIET).unwrap_or(0) + 1 };
            memory.set(QUIET, quiet);
            memory.reset(CHANGED);
            return Ok(quiet >= ROUND as i64);
        }

        if is_thing_step(ss) {
            if !memory.get_bool(EXIST) {
                return Err(Error::NoResult(format!("no {}-core", self.k)));
            }
            if ss > FIRST_THING_STEP && memory.get_bool(STABLE) {
                tracing::debug!(k = self.k, superstep = ss, "pruning stable, clustering survivors");
                memory.set(CLUSTER_START, i64::from(ss + 1));
            }
        }
        memory.reset(STABLE);
        memory.reset(EXIST);
        Ok(false)
    }

    fn max_iterations(&self, vertices: usize) -> u32 {
        helpers::ceiling(MAX_ITERATIONS, ROUND + 2, vertices)
    }
}
