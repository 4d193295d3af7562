//! Coreness: k-core pruning repeated for k = min_k, min_k + 1, ...
//!
//! Pruning runs exactly as in `KCoreProgram`. When a round at the current
//! k drops nobody, k is raised and the survivors keep announcing. A vertex
//! that drops out while k is above `min_k` survived the (k − 1)-core, so it
//! records `CORENESS = k − 1`. The run ends when no candidate is left.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, Operator, VertexContext, VertexProgram};
use crate::{Error, Result};
use super::helpers;
use super::kcore::{
    self, CoreMessage, CANDIDATE, EXIST, FIRST_THING_STEP, MAX_ITERATIONS, ROUND, STABLE,
};

/// Transient key holding a vertex's coreness.
pub const CORENESS: &str = "coreness";

const K: &str = "coreness.k";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorenessProgram {
    pub selected: BTreeSet<String>,
    pub min_k: i64,
}

impl CorenessProgram {
    pub fn new(selected: BTreeSet<String>, min_k: i64) -> Self {
        Self { selected, min_k }
    }
}

impl VertexProgram for CorenessProgram {
    type Message = CoreMessage;

    fn name(&self) -> &'static str {
        "coreness"
    }

    fn setup(&self, memory: &mut Memory) {
        memory.register(STABLE, Operator::And, true);
        memory.register(EXIST, Operator::Or, false);
        memory.register(K, Operator::Assign, self.min_k);
    }

    fn compute(&self, ctx: &mut VertexContext<'_, CoreMessage>, memory: &Memory) {
        let ss = memory.superstep();
        match ss {
            0 => kcore::bootstrap(ctx, &self.selected),
            1 => kcore::enroll(ctx, &self.selected),
            _ => {
                if kcore::relay(ctx, false) || !kcore::is_thing_step(ss) || !ctx.get_bool(CANDIDATE) {
                    return;
                }
                let k = memory.get_int(K).unwrap_or(self.min_k);
                if kcore::live_neighbours(ctx) >= k {
                    kcore::announce(ctx);
                } else {
                    ctx.set(CANDIDATE, false);
                    ctx.aggregate(STABLE, false);
                    if k > self.min_k {
                        ctx.set(CORENESS, k - 1);
                    }
                }
            }
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        let ss = memory.superstep();
        let k = memory.get_int(K).unwrap_or(self.min_k);
        if kcore::is_thing_step(ss) {
            if !memory.get_bool(EXIST) {
                if k == self.min_k {
                    return Err(Error::NoResult(format!("no {}-core", self.min_k)));
                }
                tracing::debug!(max_core = k - 1, superstep = ss, "coreness complete");
                return Ok(true);
            }
            if ss > FIRST_THING_STEP && memory.get_bool(STABLE) {
                memory.set(K, k + 1);
            }
        }
        memory.reset(STABLE);
        memory.reset(EXIST);
        Ok(false)
    }

    fn max_iterations(&self, vertices: usize) -> u32 {
        helpers::ceiling(MAX_ITERATIONS, 2 * ROUND + 2, vertices)
    }
}
