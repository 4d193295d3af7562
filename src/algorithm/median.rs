//! Weighted median by distributed quickselect.
//!
//! Superstep 0 and 1 are the degree-weighting pass: an attribute value's
//! weight is the number of in-scope owners referencing it. Every weighted
//! value is a candidate labelled `0`; the total weight and a first pivot
//! (highest hashed priority) are aggregated.
//!
//! Each later superstep `s` partitions the candidates still carrying the
//! selected label against the pivot:
//!
//! | Relation to pivot | New label | Register |
//! |-------------------|-----------|----------|
//! | less | `2s` | `NEGATIVE_COUNT`, `NEGATIVE_PIVOT` |
//! | greater | `2s + 1` | `POSITIVE_COUNT`, `POSITIVE_PIVOT` |
//! | equal | `-1` | none, the pivot's own weight |
//!
//! The coordinator tracks the weighted index range `[start, end]` of the
//! remaining candidates. If the target index `(total - 1) / 2` falls
//! strictly between the two partitions, the pivot is the median. Otherwise
//! the range narrows to the partition holding the index, and that
//! partition's picked pivot is next.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::compute::{Memory, Operator, VertexContext, VertexProgram};
use crate::model::Value;
use crate::{Error, Result};
use super::degree::{announce_ownership, is_weighted_target, DEGREE};
use super::helpers;

const LABEL: &str = "median.label";
const PIVOT_MARKER: i64 = -1;

const COUNT: &str = "median.count";
const PIVOT: &str = "median.pivot";
const NEGATIVE_COUNT: &str = "median.negative_count";
const POSITIVE_COUNT: &str = "median.positive_count";
const NEGATIVE_PIVOT: &str = "median.negative_pivot";
const POSITIVE_PIVOT: &str = "median.positive_pivot";
const START: &str = "median.start";
const END: &str = "median.end";
const INDEX: &str = "median.index";
const SELECTED_LABEL: &str = "median.selected_label";
/// Register holding the median once found.
pub const MEDIAN: &str = "median";

pub(crate) const MAX_ITERATIONS: u32 = 40;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedianProgram {
    /// Owner types in scope.
    pub owners: BTreeSet<String>,
    /// Attribute types whose values are ranked.
    pub targets: BTreeSet<String>,
}

impl MedianProgram {
    pub fn new(owners: BTreeSet<String>, targets: BTreeSet<String>) -> Self {
        Self { owners, targets }
    }
}

/// `[priority, value]`, the payload shape of a `Pick` register.
fn pick(ctx: &VertexContext<'_, ()>, superstep: u32, value: &Value) -> Value {
    Value::List(vec![Value::Int(helpers::priority(ctx.id(), superstep)), value.clone()])
}

fn picked(memory: &Memory, key: &str) -> Value {
    memory
        .get(key)
        .and_then(Value::as_list)
        .and_then(|l| l.get(1))
        .cloned()
        .unwrap_or(Value::Null)
}

fn rankable(value: &Value) -> bool {
    value.as_float().is_some_and(|f| !f.is_nan())
}

impl VertexProgram for MedianProgram {
    type Message = ();

    fn name(&self) -> &'static str {
        "median"
    }

    fn setup(&self, memory: &mut Memory) {
        memory.register(COUNT, Operator::Sum, 0i64);
        memory.register(PIVOT, Operator::Pick, Value::Null);
        memory.register(NEGATIVE_COUNT, Operator::Sum, 0i64);
        memory.register(POSITIVE_COUNT, Operator::Sum, 0i64);
        memory.register(NEGATIVE_PIVOT, Operator::Pick, Value::Null);
        memory.register(POSITIVE_PIVOT, Operator::Pick, Value::Null);
        memory.register(START, Operator::Assign, 0i64);
        memory.register(END, Operator::Assign, 0i64);
        memory.register(INDEX, Operator::Assign, 0i64);
        memory.register(SELECTED_LABEL, Operator::Assign, 0i64);
        memory.register(MEDIAN, Operator::Assign, Value::Null);
    }

    fn compute(&self, ctx: &mut VertexContext<'_, ()>, memory: &Memory) {
        let ss = memory.superstep();
        match ss {
            0 => announce_ownership(ctx, &self.owners, ()),
            1 => {
                if !is_weighted_target(ctx, &self.targets) {
                    return;
                }
                let weight = ctx.messages().len() as i64;
                let Some(value) = ctx.value().filter(|v| rankable(v)) else { return };
                if weight == 0 {
                    return;
                }
                ctx.set(DEGREE, weight);
                ctx.set(LABEL, 0i64);
                let candidate = pick(ctx, ss, value);
                ctx.aggregate(COUNT, weight);
                ctx.aggregate(PIVOT, candidate);
            }
            _ => {
                let selected = memory.get_int(SELECTED_LABEL).unwrap_or(0);
                if ctx.get_int(LABEL) != Some(selected) {
                    return;
                }
                let (Some(value), Some(weight)) = (ctx.value(), ctx.get_int(DEGREE)) else { return };
                let Some(pivot) = memory.get(PIVOT) else { return };
                let label = i64::from(ss) * 2;
                match value.compare(pivot) {
                    Some(Ordering::Less) => {
                        ctx.set(LABEL, label);
                        let candidate = pick(ctx, ss, value);
                        ctx.aggregate(NEGATIVE_COUNT, weight);
                        ctx.aggregate(NEGATIVE_PIVOT, candidate);
                    }
                    Some(Ordering::Greater) => {
                        ctx.set(LABEL, label + 1);
                        let candidate = pick(ctx, ss, value);
                        ctx.aggregate(POSITIVE_COUNT, weight);
                        ctx.aggregate(POSITIVE_PIVOT, candidate);
                    }
                    _ => ctx.set(LABEL, PIVOT_MARKER),
                }
            }
        }
    }

    fn terminate(&self, memory: &mut Memory) -> Result<bool> {
        let ss = memory.superstep();
        match ss {
            0 => Ok(false),
            1 => {
                let count = memory.get_int(COUNT).unwrap_or(0);
                if count == 0 {
                    return Err(Error::NoResult("no weighted values to rank".into()));
                }
                let pivot = picked(memory, PIVOT);
                memory.set(START, 0i64);
                memory.set(END, count - 1);
                memory.set(INDEX, (count - 1) / 2);
                memory.set(SELECTED_LABEL, 0i64);
                memory.set(PIVOT, pivot);
                Ok(false)
            }
            _ => {
                let start = memory.get_int(START).unwrap_or(0);
                let end = memory.get_int(END).unwrap_or(0);
                let index = memory.get_int(INDEX).unwrap_or(0);
                let negative = memory.get_int(NEGATIVE_COUNT).unwrap_or(0);
                let positive = memory.get_int(POSITIVE_COUNT).unwrap_or(0);
                let negative_end = start + negative - 1;
                let positive_start = end - positive + 1;

                if negative_end < index && index < positive_start {
                    let median = memory.get(PIVOT).cloned().unwrap_or(Value::Null);
                    tracing::debug!(superstep = ss, median = %median, "median found");
                    memory.set(MEDIAN, median);
                    return Ok(true);
                }

                let label = i64::from(ss) * 2;
                if index <= negative_end {
                    let pivot = picked(memory, NEGATIVE_PIVOT);
                    memory.set(END, negative_end);
                    memory.set(SELECTED_LABEL, label);
                    memory.set(PIVOT, pivot);
                } else {
                    let pivot = picked(memory, POSITIVE_PIVOT);
                    memory.set(START, positive_start);
                    memory.set(SELECTED_LABEL, label + 1);
                    memory.set(PIVOT, pivot);
                }
                memory.reset(NEGATIVE_COUNT);
                memory.reset(POSITIVE_COUNT);
                memory.reset(NEGATIVE_PIVOT);
                memory.reset(POSITIVE_PIVOT);
                Ok(false)
            }
        }
    }

    fn max_iterations(&self, _vertices: usize) -> u32 {
        MAX_ITERATIONS
    }
}
