//! All shortest paths between two concepts by bidirectional BFS.
//!
//! Phase 1 (search): the source and destination flood the graph. Every
//! concept-to-concept hop takes two supersteps: a relation hop passes a
//! casting, an ownership hop is held one superstep at the receiving end. A
//! vertex first reached by a frontier records the superstep as its distance
//! and the **set** of neighbours that reached it. A vertex holding both
//! distances is a meeting point; `MIN_LENGTH` takes the smallest distance
//! sum. A shortest path whose middle hop is an ownership edge meets one
//! superstep after one whose middle hop passes a casting, so the search
//! runs one more superstep after the first meeting. If either frontier
//! stops growing before a meeting, there is no path.
//!
//! Phase 2 (collect): meeting points on a shortest path walk back to both
//! ends along the recorded neighbour sets. Castings are passed through, so
//! every recorded link joins two things. The run ends in the first
//! superstep that forwards nothing, leaving the shortest-path DAG in the
//! `LINKS` register as `from → [to]`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, Operator, VertexContext, VertexProgram};
use crate::model::{ConceptId, Value, VertexKind};
use crate::{Error, Result};
use super::helpers::{self, CASTING_SCOPES, OWNERSHIP, PLAYER_TO_CASTINGS, RELATION_TO_CASTINGS};

const SOURCE_DISTANCE: &str = "path.source_distance";
const DESTINATION_DISTANCE: &str = "path.destination_distance";
const TOWARD_SOURCE: &str = "path.toward_source";
const TOWARD_DESTINATION: &str = "path.toward_destination";

const FOUND: &str = "path.found";
const FOUND_AT: &str = "path.found_at";
const MIN_LENGTH: &str = "path.min_length";
const SOURCE_GROWING: &str = "path.source_growing";
const DESTINATION_GROWING: &str = "path.destination_growing";
const COLLECT_START: &str = "path.collect_start";
const SENT: &str = "path.sent";
/// Register holding the shortest-path DAG.
pub const LINKS: &str = "path.links";

/// Ceiling floor; larger graphs get four supersteps per vertex.
pub(crate) const MAX_ITERATIONS: u32 = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathMessage {
    FromSource(ConceptId),
    FromDestination(ConceptId),
    /// Source wave crossing an ownership edge, held one superstep.
    SourceOverOwnership(ConceptId),
    /// Destination wave crossing an ownership edge, held one superstep.
    DestinationOverOwnership(ConceptId),
    /// Walking toward the source; `child` is the nearest thing behind.
    TowardSource { child: ConceptId },
    /// Walking toward the destination; `parent` is the nearest thing behind.
    TowardDestination { parent: ConceptId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Source,
    Destination,
}

impl End {
    fn distance_key(self) -> &'static str {
        match self {
            End::Source => SOURCE_DISTANCE,
            End::Destination => DESTINATION_DISTANCE,
        }
    }

    fn toward_key(self) -> &'static str {
        match self {
            End::Source => TOWARD_SOURCE,
            End::Destination => TOWARD_DESTINATION,
        }
    }

    fn growing_key(self) -> &'static str {
        match self {
            End::Source => SOURCE_GROWING,
            End::Destination => DESTINATION_GROWING,
        }
    }

    fn wave(self, from: ConceptId) -> PathMessage {
        match self {
            End::Source => PathMessage::FromSource(from),
            End::Destination => PathMessage::FromDestination(from),
        }
    }

    fn held(self, from: ConceptId) -> PathMessage {
        match self {
            End::Source => PathMessage::SourceOverOwnership(from),
            End::Destination => PathMessage::DestinationOverOwnership(from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortestPathProgram {
    pub selected: BTreeSet<String>,
    pub source: ConceptId,
    pub destination: ConceptId,
}

fn ids(values: Option<&Value>) -> Vec<ConceptId> {
    values
        .and_then(Value::as_list)
        .map(|l| l.iter().filter_map(Value::as_str).map(ConceptId::from).collect())
        .unwrap_or_default()
}

fn link(ctx: &mut VertexContext<'_, PathMessage>, from: &ConceptId, to: &ConceptId) {
    let links = Value::map([(from.as_str(), Value::from(vec![to.as_str()]))]);
    ctx.aggregate(LINKS, links);
}

impl ShortestPathProgram {
    pub fn new(selected: BTreeSet<String>, source: ConceptId, destination: ConceptId) -> Self {
        Self { selected, source, destination }
    }

    fn eligible(&self, ctx: &VertexContext<'_, PathMessage>) -> bool {
        ctx.kind() == VertexKind::Casting || helpers::is_selected(ctx, &self.selected)
    }

    fn flood(ctx: &mut VertexContext<'_, PathMessage>, end: End) {
        let own = helpers::vertex_id(ctx);
        if ctx.kind() == VertexKind::Casting {
            for scope in CASTING_SCOPES {
                ctx.send(scope, end.wave(own.clone()));
            }
            return;
        }
        ctx.send(PLAYER_TO_CASTINGS, end.wave(own.clone()));
        ctx.send(RELATION_TO_CASTINGS, end.wave(own.clone()));
        ctx.send(OWNERSHIP, end.held(own));
    }

    /// Re-deliver an ownership wave to this vertex next superstep.
    fn hold(ctx: &mut VertexContext<'_, PathMessage>, end: End, from: &ConceptId) {
        if ctx.has(end.distance_key()) {
            return;
        }
        let own = helpers::vertex_id(ctx);
        ctx.send_to(&own, end.wave(from.clone()));
        ctx.aggregate(end.growing_key(), true);
    }

    /// Record a first visit by `end`'s frontier. Returns true if recorded.
    fn reach(ctx: &mut VertexContext<'_, PathMessage>, end: End, superstep: u32, from: Vec<ConceptId>) -> bool {
        if ctx.has(end.distance_key()) {
            return false;
        }
        if superstep > 0 && from.is_empty() {
            return false;
        }
        ctx.set(end.distance_key(), i64::from(superstep));
        let from: Vec<Value> = from.into_iter().map(Value::from).collect();
        ctx.set(end.toward_key(), Value::List(from));
        ctx.aggregate(end.growing_key(), true);
        Self::flood(ctx, end);
        true
    }

    fn search(&self, ctx: &mut VertexContext<'_, PathMessage>, memory: &Memory) {
        let ss = memory.superstep();
        let mut reached = false;
        if ss == 0 {
            if *ctx.id() == self.source {
                reached |= Self::reach(ctx, End::Source, 0, Vec::new());
            }
            if *ctx.id() == self.destination {
                reached |= Self::reach(ctx, End::Destination, 0, Vec::new());
            }
        } else if self.eligible(ctx) {
            let mut from_source = BTreeSet::new();
            let mut from_destination = BTreeSet::new();
            for m in ctx.messages() {
                match m {
                    PathMessage::FromSource(id) => { from_source.insert(id.clone()); }
                    PathMessage::FromDestination(id) => { from_destination.insert(id.clone()); }
                    PathMessage::SourceOverOwnership(id) => Self::hold(ctx, End::Source, id),
                    PathMessage::DestinationOverOwnership(id) => Self::hold(ctx, End::Destination, id),
                    _ => {}
                }
            }
            reached |= Self::reach(ctx, End::Source, ss, from_source.into_iter().collect());
            reached |= Self::reach(ctx, End::Destination, ss, from_destination.into_iter().collect());
        }

        if reached {
            if let (Some(s), Some(d)) = (ctx.get_int(SOURCE_DISTANCE), ctx.get_int(DESTINATION_DISTANCE)) {
                ctx.aggregate(FOUND, true);
                ctx.aggregate(MIN_LENGTH, s + d);
            }
        }
    }

    fn collect(&self, ctx: &mut VertexContext<'_, PathMessage>, memory: &Memory, start: u32) {
        let toward_source = ids(ctx.get(TOWARD_SOURCE));
        let toward_destination = ids(ctx.get(TOWARD_DESTINATION));
        let at_source = ctx.get_int(SOURCE_DISTANCE) == Some(0);
        let at_destination = ctx.get_int(DESTINATION_DISTANCE) == Some(0);
        let is_casting = ctx.kind() == VertexKind::Casting;
        let own = helpers::vertex_id(ctx);

        let mut children = BTreeSet::new();
        let mut parents = BTreeSet::new();
        for m in ctx.messages() {
            match m {
                PathMessage::TowardSource { child } => { children.insert(child.clone()); }
                PathMessage::TowardDestination { parent } => { parents.insert(parent.clone()); }
                _ => {}
            }
        }

        if memory.superstep() == start {
            let on_path = match (ctx.get_int(SOURCE_DISTANCE), ctx.get_int(DESTINATION_DISTANCE)) {
                (Some(s), Some(d)) => Some(s + d) == memory.get_int(MIN_LENGTH),
                _ => false,
            };
            if on_path {
                if is_casting {
                    children.extend(toward_destination.iter().cloned());
                    parents.extend(toward_source.iter().cloned());
                } else {
                    children.insert(own.clone());
                    parents.insert(own.clone());
                }
            }
        }

        let mut sent = false;
        if is_casting {
            for child in &children {
                for s in &toward_source {
                    ctx.send_to(s, PathMessage::TowardSource { child: child.clone() });
                    sent = true;
                }
            }
            for parent in &parents {
                for d in &toward_destination {
                    ctx.send_to(d, PathMessage::TowardDestination { parent: parent.clone() });
                    sent = true;
                }
            }
        } else {
            for child in children.iter().filter(|c| **c != own) {
                link(ctx, &own, child);
            }
            for parent in parents.iter().filter(|p| **p != own) {
                link(ctx, parent, &own);
            }
            if !children.is_empty() && !at_source {
                for s in &toward_source {
                    ctx.send_to(s, PathMessage::TowardSource { child: own.clone() });
                    sent = true;
                }
            }
            if !parents.is_empty() && !at_destination {
                for d in &toward_destination {
                    ctx.send_to(d, PathMessage::TowardDestination { parent: own.clone() });
                    sent = true;
                }
            }
        }
        if sent {
            ctx.aggregate(SENT, true);
        }
    }
}

impl VertexProgram for ShortestPathProgram {
    type Message = PathMessage;

    fn name(&self) -> &'static str {
        "shortest-path"
    }

    fn setup(&self, memory: &mut Memory) {
        memory.register(FOUND, Operator::Or, false);
        memory.register(FOUND_AT, Operator::Assign, Value::Null);
        memory.register(MIN_LENGTH, Operator::Min, Value::Null);
        memory.register(SOURCE_GROWING, Operator::Or, false);
        memory.register(DESTINATION_GROWING, Operator::Or, false);
        memory.register(COLLECT_START, Operator::Assign, 0i64);
        memory.register(SENT, Operator::Or, false);
        memory.register(LINKS, Operator::Union, Value::Map(Default::default()));
    }

    fn compute(&self, ctx: &mut VertexContext<'_, PathMessage>, memory: &Memory) {
        match memory.get_int(COLLECT_START).unwrap_or(0) {
            0 => self.search(ctx, memory),
            start => self.collect(ctx, memory, start as u32),
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        let ss = memory.superstep();
        if memory.get_int(COLLECT_START).unwrap_or(0) > 0 {
            let done = !memory.get_bool(SENT);
            memory.reset(SENT);
            return Ok(done);
        }
        if memory.get_bool(FOUND) {
            if memory.get_int(FOUND_AT).is_none() {
                memory.set(FOUND_AT, i64::from(ss));
                return Ok(false);
            }
            tracing::debug!(
                superstep = ss,
                length = memory.get_int(MIN_LENGTH).unwrap_or(0),
                "frontiers met, collecting paths"
            );
            memory.set(COLLECT_START, i64::from(ss + 1));
            return Ok(false);
        }
        let stalled = !memory.get_bool(SOURCE_GROWING) || !memory.get_bool(DESTINATION_GROWING);
        if stalled {
            return Err(Error::NoResult(format!("no path from {} to {}", self.source, self.destination)));
        }
        memory.reset(SOURCE_GROWING);
        memory.reset(DESTINATION_GROWING);
        Ok(false)
    }

    fn max_iterations(&self, vertices: usize) -> u32 {
        helpers::ceiling(MAX_ITERATIONS, 4, vertices)
    }
}
