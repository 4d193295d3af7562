//! Cluster members and cluster sizes from `CLUSTER_LABEL`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::algorithm::CLUSTER_LABEL;
use crate::compute::mapreduce::VertexView;
use crate::compute::MapReduce;
use crate::model::Value;

fn label(vertex: &VertexView<'_>) -> Option<String> {
    if !vertex.kind().is_thing() {
        return None;
    }
    vertex.get(CLUSTER_LABEL).and_then(Value::as_str).map(str::to_owned)
}

/// `{label: [member ids, sorted]}`, optionally only clusters of exactly `size`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMemberMapReduce {
    pub size: Option<usize>,
}

impl MapReduce for ClusterMemberMapReduce {
    type Key = String;
    type Val = Vec<String>;

    fn name(&self) -> &'static str {
        "cluster-members"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<(String, Vec<String>)> {
        label(vertex).map(|l| (l, vec![vertex.id().as_str().to_owned()]))
    }

    fn reduce(&self, _key: &String, values: Vec<Vec<String>>) -> Vec<String> {
        values.into_iter().flatten().collect()
    }

    fn finalize(&self, reduced: BTreeMap<String, Vec<String>>) -> Value {
        let clusters = reduced
            .into_iter()
            .filter(|(_, members)| self.size.is_none_or(|s| members.len() == s))
            .map(|(label, mut members)| {
                members.sort();
                (label, Value::from(members))
            })
            .collect();
        Value::Map(clusters)
    }
}

/// `{label: member count}`, optionally only clusters of exactly `size`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSizeMapReduce {
    pub size: Option<usize>,
}

impl MapReduce for ClusterSizeMapReduce {
    type Key = String;
    type Val = i64;

    fn name(&self) -> &'static str {
        "cluster-sizes"
    }

    fn map(&self, vertex: &VertexView<'_>) -> Option<(String, i64)> {
        label(vertex).map(|l| (l, 1))
    }

    fn reduce(&self, _key: &String, values: Vec<i64>) -> i64 {
        values.into_iter().sum()
    }

    fn finalize(&self, reduced: BTreeMap<String, i64>) -> Value {
        let clusters = reduced
            .into_iter()
            .filter(|(_, n)| self.size.is_none_or(|s| *n as usize == s))
            .map(|(label, n)| (label, Value::Int(n)))
            .collect();
        Value::Map(clusters)
    }
}
