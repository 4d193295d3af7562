//! Global aggregator registers.
//!
//! A register is a named `Value` with a declared merge operator. Vertex
//! computations never write a register directly: they contribute updates to
//! a worker-local `MemoryDelta`, which folds them with the register's
//! operator. At the superstep barrier the coordinator merges each worker's
//! delta, in worker order, into `Memory`. `setup` and `terminate` run on the
//! coordinator and may `set` registers outright.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::model::Value;

/// Merge operator of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// Logical AND. "Everything is quiet" flags.
    And,
    /// Logical OR. "Something happened" flags.
    Or,
    /// Last write wins.
    Assign,
    /// Numeric addition; integers stay integers until they overflow.
    Sum,
    Min,
    Max,
    /// Set union over lists, and per-key union over maps of lists.
    Union,
    /// Keep the `[priority, payload]` pair with the highest priority.
    Pick,
}

impl Operator {
    /// Fold `update` into `current`. `Null` is the identity of every operator.
    pub fn merge(self, current: &Value, update: Value) -> Value {
        if current.is_null() {
            return update;
        }
        if update.is_null() {
            return current.clone();
        }
        match self {
            Operator::And => Value::Bool(current.is_truthy() && update.is_truthy()),
            Operator::Or => Value::Bool(current.is_truthy() || update.is_truthy()),
            Operator::Assign => update,
            Operator::Sum => match (current, &update) {
                (Value::Int(a), Value::Int(b)) => {
                    a.checked_add(*b).map_or(Value::Float(*a as f64 + *b as f64), Value::Int)
                }
                (a, b) => match (a.as_float(), b.as_float()) {
                    (Some(a), Some(b)) => Value::Float(a + b),
                    _ => current.clone(),
                },
            },
            Operator::Min => match update.compare(current) {
                Some(std::cmp::Ordering::Less) => update,
                _ => current.clone(),
            },
            Operator::Max => match update.compare(current) {
                Some(std::cmp::Ordering::Greater) => update,
                _ => current.clone(),
            },
            Operator::Union => union(current, update),
            Operator::Pick => {
                if priority(&update) > priority(current) { update } else { current.clone() }
            }
        }
    }
}

fn priority(v: &Value) -> Option<i64> {
    v.as_list().and_then(|l| l.first()).and_then(Value::as_int)
}

fn union(current: &Value, update: Value) -> Value {
    match (current, update) {
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            for v in b {
                if !out.contains(&v) {
                    out.push(v);
                }
            }
            Value::List(out)
        }
        (Value::Map(a), Value::Map(b)) => {
            let mut out = a.clone();
            for (k, v) in b {
                let merged = match out.get(&k) {
                    Some(existing) => union(existing, v),
                    None => v,
                };
                out.insert(k, merged);
            }
            Value::Map(out)
        }
        (_, update) => update,
    }
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Clone)]
struct Register {
    op: Operator,
    initial: Value,
    value: Value,
}

/// The coordinator's view of all registers after the last barrier.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    registers: BTreeMap<String, Register>,
    superstep: u32,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a register. Redeclaring resets it.
    pub fn register(&mut self, key: &str, op: Operator, initial: impl Into<Value>) {
        let initial = initial.into();
        self.registers.insert(
            key.to_owned(),
            Register { op, value: initial.clone(), initial },
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.registers.get(key).map(|r| &r.value)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(Value::is_truthy)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn operator(&self, key: &str) -> Option<Operator> {
        self.registers.get(key).map(|r| r.op)
    }

    /// Overwrite a register. Unknown keys become `Assign` registers.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        match self.registers.get_mut(key) {
            Some(r) => r.value = value,
            None => self.register(key, Operator::Assign, value),
        }
    }

    /// Put a register back to its declared initial value.
    pub fn reset(&mut self, key: &str) {
        if let Some(r) = self.registers.get_mut(key) {
            r.value = r.initial.clone();
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.registers.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.registers.keys().map(String::as_str)
    }

    /// The superstep being computed, or the last one completed while
    /// `terminate` runs.
    pub fn superstep(&self) -> u32 {
        self.superstep
    }

    pub fn is_initial_superstep(&self) -> bool {
        self.superstep == 0
    }

    pub(crate) fn set_superstep(&mut self, superstep: u32) {
        self.superstep = superstep;
    }

    /// Barrier merge of one worker's delta.
    pub(crate) fn apply(&mut self, delta: MemoryDelta) {
        for (key, update) in delta.updates {
            if let Some(r) = self.registers.get_mut(&key) {
                r.value = r.op.merge(&r.value, update);
            }
        }
    }
}

// ============================================================================
// MemoryDelta
// ============================================================================

/// Register updates contributed by one worker during one superstep.
#[derive(Debug, Default)]
pub struct MemoryDelta {
    updates: HashMap<String, Value>,
}

impl MemoryDelta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold `value` into the pending update for `key` using the register's
    /// operator. Updates to undeclared registers are dropped.
    pub fn add(&mut self, memory: &Memory, key: &str, value: Value) {
        let Some(op) = memory.operator(key) else {
            tracing::warn!(register = key, "update to undeclared register dropped");
            return;
        };
        match self.updates.get_mut(key) {
            Some(current) => *current = op.merge(current, value),
            None => {
                self.updates.insert(key.to_owned(), value);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}
