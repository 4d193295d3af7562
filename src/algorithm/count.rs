//! Ownership counting.
//!
//! Counting instances needs no vertex program: `CountMapReduce` does it in
//! one pass. Counting ownerships does: an ownership edge is an implicit
//! relation instance, and an attribute only learns how many of its owners
//! are in scope by hearing from them.
//!
//! | Superstep | Vertex | Action |
//! |-----------|--------|--------|
//! | 0 | selected thing | token to each owned attribute |
//! | 1 | selected attribute | `OWNERSHIP_COUNT` = tokens received |

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, VertexContext, VertexProgram};
use crate::model::Direction;
use crate::Result;
use super::helpers::{self, OwnershipEnd};

/// Transient key: owners in scope of this attribute.
pub const OWNERSHIP_COUNT: &str = "count.ownerships";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountProgram {
    pub selected: BTreeSet<String>,
}

impl CountProgram {
    pub fn new(selected: BTreeSet<String>) -> Self {
        Self { selected }
    }
}

impl VertexProgram for CountProgram {
    type Message = ();

    fn name(&self) -> &'static str {
        "count"
    }

    fn setup(&self, _memory: &mut Memory) {}

    fn compute(&self, ctx: &mut VertexContext<'_, ()>, memory: &Memory) {
        if !helpers::is_selected(ctx, &self.selected) {
            return;
        }
        match memory.superstep() {
            0 => {
                if let Some(end) = helpers::ownership_end(ctx.kind(), Direction::Outgoing) {
                    debug_assert_eq!(end, OwnershipEnd::Owned);
                    ctx.send(helpers::ownership_scope(end), ());
                }
            }
            _ => {
                let owners = ctx.messages().len() as i64;
                if owners > 0 {
                    ctx.set(OWNERSHIP_COUNT, owners);
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
