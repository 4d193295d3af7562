//! Instance counts per type.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::algorithm::helpers;
use crate::algorithm::OWNERSHIP_COUNT;
use crate::compute::mapreduce::VertexView;
use crate::compute::MapReduce;
use crate::model::Value;

/// Counts selected things by direct type. With `count_ownerships`, each
/// attribute also contributes the in-scope ownerships `CountProgram` left
/// on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountMapReduce {
    pub selected: BTreeSet<String>,
    pub count_ownerships: bool,
}

impl CountMapReduce {
    pub fn new(selected: BTreeSet<String>) -> Self {
        Self { selected, count_ownerships: false }
    }

    pub fn with_ownerships(mut self) -> Self {
        self.count_ownerships = true;
        self
    }
}

impl MapReduce for CountMapReduce {
    type Key = String;
    type Val = i64;

    fn name(&self) -> &'static str {
        "count"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<(String, i64)> {
        if !helpers::view_is_selected(vertex, &self.selected) {
            return None;
        }
        let ownerships = if self.count_ownerships { vertex.get_int(OWNERSHIP_COUNT).unwrap_or(0) } else { 0 };
        Some((vertex.type_label().to_owned(), 1 + ownerships))
    }

    fn reduce(&self, _key: &String, values: Vec<i64>) -> i64 {
        values.into_iter().sum()
    }

    fn finalize(&self, reduced: BTreeMap<String, i64>) -> Value {
        Value::Map(reduced.into_iter().map(|(k, v)| (k, Value::Int(v))).collect())
    }
}
