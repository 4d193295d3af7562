//! Members grouped by an integer vertex property (degree or coreness).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::compute::mapreduce::VertexView;
use crate::compute::MapReduce;
use crate::model::Value;

/// `[[value, [member ids, sorted]], ...]` in ascending value order, over
/// things of the target types that carry `key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegreeDistributionMapReduce {
    pub targets: BTreeSet<String>,
    pub key: String,
}

impl DegreeDistributionMapReduce {
    pub fn new(targets: BTreeSet<String>, key: impl Into<String>) -> Self {
        Self { targets, key: key.into() }
    }
}

impl MapReduce for DegreeDistributionMapReduce {
    type Key = i64;
    type Val = Vec<String>;

    fn name(&self) -> &'static str {
        "degree-distribution"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<(i64, Vec<String>)> {
        if !vertex.kind().is_thing() || !self.targets.contains(vertex.type_label()) {
            return None;
        }
        let degree = vertex.get_int(&self.key)?;
        Some((degree, vec![vertex.id().as_str().to_owned()]))
    }

    fn reduce(&self, _key: &i64, values: Vec<Vec<String>>) -> Vec<String> {
        values.into_iter().flatten().collect()
    }

    fn finalize(&self, reduced: BTreeMap<i64, Vec<String>>) -> Value {
        let rows = reduced
            .into_iter()
            .map(|(degree, mut members)| {
                members.sort();
                Value::List(vec![Value::Int(degree), Value::from(members)])
            })
            .collect();
        Value::List(rows)
    }
}
