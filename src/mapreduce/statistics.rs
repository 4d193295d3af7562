//! Degree-weighted statistics over attribute values.
//!
//! All extractors read the weight `DegreeStatisticsProgram` left under
//! `DEGREE`; values with no in-scope owner (weight 0) are ignored. Min and
//! max are unweighted: existence matters, not multiplicity.
//!
//! The per-key fold is plain componentwise addition (or min/max), so the
//! result does not depend on how vertices are partitioned across workers.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algorithm::DEGREE;
use crate::compute::mapreduce::VertexView;
use crate::compute::MapReduce;
use crate::model::{Value, VertexKind};

/// A weighted numeric value of one of the target attribute types.
fn weighted<'a>(vertex: &VertexView<'a>, targets: &BTreeSet<String>) -> Option<(&'a Value, i64)> {
    if vertex.kind() != VertexKind::Attribute || !targets.contains(vertex.type_label()) {
        return None;
    }
    let weight = vertex.get_int(DEGREE).filter(|w| *w > 0)?;
    let value = vertex.value().filter(|v| v.is_numeric())?;
    Some((value, weight))
}

/// Integer results that leave the `i64` range continue as doubles.
fn scale(value: &Value, weight: i64) -> Value {
    match value {
        Value::Int(v) => v.checked_mul(weight).map_or(Value::Float(*v as f64 * weight as f64), Value::Int),
        other => Value::Float(other.as_float().unwrap_or(0.0) * weight as f64),
    }
}

fn add(a: Value, b: Value) -> Value {
    match (&a, &b) {
        (Value::Int(x), Value::Int(y)) => x.checked_add(*y).map_or(Value::Float(*x as f64 + *y as f64), Value::Int),
        _ => Value::Float(a.as_float().unwrap_or(0.0) + b.as_float().unwrap_or(0.0)),
    }
}

fn pick(values: Vec<Value>, keep: Ordering) -> Value {
    values
        .into_iter()
        .reduce(|best, v| if v.compare(&best) == Some(keep) { v } else { best })
        .unwrap_or(Value::Null)
}

fn single(reduced: BTreeMap<(), Value>) -> Value {
    reduced.into_values().next().unwrap_or(Value::Null)
}

// ============================================================================
// Min / Max / Sum
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMapReduce {
    pub targets: BTreeSet<String>,
}

impl MapReduce for MinMapReduce {
    type Key = ();
    type Val = Value;

    fn name(&self) -> &'static str {
        "min"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<((), Value)> {
        weighted(vertex, &self.targets).map(|(v, _)| ((), v.clone()))
    }

    fn reduce(&self, _key: &(), values: Vec<Value>) -> Value {
        pick(values, Ordering::Less)
    }

    fn finalize(&self, reduced: BTreeMap<(), Value>) -> Value {
        single(reduced)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaxMapReduce {
    pub targets: BTreeSet<String>,
}

impl MapReduce for MaxMapReduce {
    type Key = ();
    type Val = Value;

    fn name(&self) -> &'static str {
        "max"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<((), Value)> {
        weighted(vertex, &self.targets).map(|(v, _)| ((), v.clone()))
    }

    fn reduce(&self, _key: &(), values: Vec<Value>) -> Value {
        pick(values, Ordering::Greater)
    }

    fn finalize(&self, reduced: BTreeMap<(), Value>) -> Value {
        single(reduced)
    }
}

/// Sum of value × weight. Integer attributes sum to an integer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SumMapReduce {
    pub targets: BTreeSet<String>,
}

impl MapReduce for SumMapReduce {
    type Key = ();
    type Val = Value;

    fn name(&self) -> &'static str {
        "sum"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<((), Value)> {
        weighted(vertex, &self.targets).map(|(v, w)| ((), scale(v, w)))
    }

    fn reduce(&self, _key: &(), values: Vec<Value>) -> Value {
        values.into_iter().reduce(add).unwrap_or(Value::Null)
    }

    fn finalize(&self, reduced: BTreeMap<(), Value>) -> Value {
        single(reduced)
    }
}

// ============================================================================
// Mean / Std
// ============================================================================

/// Accumulated weight, Σ value × weight and Σ value² × weight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Moments {
    pub count: i64,
    pub sum: f64,
    pub squares: f64,
}

impl Moments {
    fn of(value: &Value, weight: i64) -> Self {
        let x = value.as_float().unwrap_or(0.0);
        let w = weight as f64;
        Self { count: weight, sum: x * w, squares: x * x * w }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            count: self.count + other.count,
            sum: self.sum + other.sum,
            squares: self.squares + other.squares,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population standard deviation, `sqrt(E[x²] − E[x]²)`.
    pub fn std(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self.squares / self.count as f64 - mean * mean;
        Some(variance.max(0.0).sqrt())
    }
}

fn fold(values: Vec<Moments>) -> Moments {
    values.into_iter().fold(Moments::default(), Moments::merge)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanMapReduce {
    pub targets: BTreeSet<String>,
}

impl MapReduce for MeanMapReduce {
    type Key = ();
    type Val = Moments;

    fn name(&self) -> &'static str {
        "mean"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<((), Moments)> {
        weighted(vertex, &self.targets).map(|(v, w)| ((), Moments::of(v, w)))
    }

    fn reduce(&self, _key: &(), values: Vec<Moments>) -> Moments {
        fold(values)
    }

    fn finalize(&self, reduced: BTreeMap<(), Moments>) -> Value {
        reduced.values().next().and_then(Moments::mean).into()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StdMapReduce {
    pub targets: BTreeSet<String>,
}

impl MapReduce for StdMapReduce {
    type Key = ();
    type Val = Moments;

    fn name(&self) -> &'static str {
        "std"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<((), Moments)> {
        weighted(vertex, &self.targets).map(|(v, w)| ((), Moments::of(v, w)))
    }

    fn reduce(&self, _key: &(), values: Vec<Moments>) -> Moments {
        fold(values)
    }

    fn finalize(&self, reduced: BTreeMap<(), Moments>) -> Value {
        reduced.values().next().and_then(Moments::std).into()
    }
}
